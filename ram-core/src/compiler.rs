//! Pipeline entry points.
//!
//! Hosts should go through these functions rather than chaining the
//! stages themselves.

use std::fs;
use std::path::Path;

use crate::error::CoreError;
use crate::fail::{self, Ast, Emission};
use crate::ram;
use crate::vm::register;

/// Which language a source file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Ram,
    Fail,
}

impl Language {
    /// `.fail` files are FAIL, anything else is assembly.
    pub fn from_path(path: impl AsRef<Path>) -> Language {
        match path.as_ref().extension() {
            Some(extension) if extension.eq_ignore_ascii_case("fail") => Language::Fail,
            _ => Language::Ram,
        }
    }
}

/// Output of the FAIL front end and emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation {
    pub ast: Ast,
    pub emission: Emission,
}

/// Tokenize, parse, resolve labels and bounds-check RAM assembly for a
/// machine with `general_registers` registers besides the accumulator.
pub fn assemble(source: &str, general_registers: u32) -> Result<ram::Scope, CoreError> {
    let general_registers = register::check_count(general_registers)?;
    let tokens = ram::tokenize(source)?;
    let scope = ram::parse(&tokens)?;
    let scope = ram::resolve_labels(scope)?;
    ram::check_bounds(&scope, general_registers + 1)?;
    Ok(scope)
}

/// Run the FAIL front end: tokenize, parse, resolve calls and infer types.
pub fn analyze(source: &str) -> Result<Ast, CoreError> {
    let tokens = fail::tokenize(source)?;
    let ast = fail::parse(&tokens)?;
    let ast = fail::resolve_functions(ast)?;
    let ast = fail::check_types(ast)?;
    Ok(ast)
}

/// Compile FAIL source to RAM assembly text.
pub fn compile(source: &str) -> Result<Compilation, CoreError> {
    let ast = analyze(source)?;
    let emission = fail::emit(&ast)?;
    Ok(Compilation { ast, emission })
}

/// Compile FAIL source and assemble the result, ready for
/// [`crate::vm::Interpreter::load_program`] with
/// `emission.register_count` registers.
pub fn build(source: &str) -> Result<(Compilation, ram::Scope), CoreError> {
    let compilation = compile(source)?;
    let program = assemble(
        &compilation.emission.assembly,
        compilation.emission.register_count,
    )?;
    Ok((compilation, program))
}

pub fn load_source(path: impl AsRef<Path>) -> Result<String, CoreError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })
}
