use thiserror::Error;

use crate::ram::ast::OpCode;
use crate::span::Span;

/// Failure of one of the RAM pipeline stages.
///
/// Every variant carries the span of the token it is about so hosts can
/// point at the offending source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RamError {
    #[error("unexpected character '{character}' at {span}")]
    UnexpectedCharacter { character: char, span: Span },
    #[error("missing number after '{sigil}' at {span}")]
    MissingNumber { sigil: char, span: Span },
    #[error("number does not fit in 32 bits at {span}")]
    NumberOutOfRange { span: Span },
    #[error("unexpected state at end of file")]
    UnexpectedEndOfFile { span: Span },
    #[error("unexpected token `{raw}` at {span}")]
    UnexpectedToken { raw: String, span: Span },
    #[error("opcode {opcode} is missing its argument at {span}")]
    MissingArgument { opcode: OpCode, span: Span },
    #[error("invalid argument `{argument}` for opcode {opcode} at {span}")]
    InvalidArgument {
        opcode: OpCode,
        argument: String,
        span: Span,
    },
    #[error("label '{name}' not found at {span}")]
    UnresolvedLabel { name: String, span: Span },
    #[error("register {register} out of bounds (bank has {register_count}) at {span}")]
    RegisterOutOfBounds {
        register: u32,
        register_count: u32,
        span: Span,
    },
}

impl RamError {
    pub fn span(&self) -> Span {
        match self {
            RamError::UnexpectedCharacter { span, .. }
            | RamError::MissingNumber { span, .. }
            | RamError::NumberOutOfRange { span }
            | RamError::UnexpectedEndOfFile { span }
            | RamError::UnexpectedToken { span, .. }
            | RamError::MissingArgument { span, .. }
            | RamError::InvalidArgument { span, .. }
            | RamError::UnresolvedLabel { span, .. }
            | RamError::RegisterOutOfBounds { span, .. } => *span,
        }
    }
}
