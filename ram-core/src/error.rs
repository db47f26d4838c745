use std::path::PathBuf;

use thiserror::Error;

use crate::fail::FailError;
use crate::ram::RamError;
use crate::vm::MAX_REGISTERS;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid clock speed {0} Hz: must be a positive number")]
    InvalidSpeed(f64),
    #[error(
        "invalid register count {0}: a machine has at most {max} general registers",
        max = MAX_REGISTERS
    )]
    InvalidRegisterCount(u32),
    #[error("assembly error: {0}")]
    Ram(#[from] RamError),
    #[error("{0}")]
    Fail(#[from] FailError),
}
