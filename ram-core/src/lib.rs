//! Core of the RAM toolchain: a register-machine assembler and interpreter
//! plus the FAIL language that compiles down to it.
//!
//! The pipeline is roughly:
//!
//!   source .fail
//!     -> fail::lexer / fail::parser   (tokens, scoped AST)
//!     -> fail::resolve / typecheck    (calls bound, types inferred)
//!     -> fail::emit                   (RAM assembly text)
//!   source .ram
//!     -> ram::lexer / ram::parser     (instructions + labels)
//!     -> ram::labels / ram::bounds    (jumps bound, registers checked)
//!     -> vm::Interpreter              (clocked or real-time execution)
//!
//! Hosts (the CLI, an editor, a visualiser) should depend on this crate
//! and go through [`compiler`] rather than chaining the stages themselves.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod error;
pub mod span;

// ---------------------------------------------------------------------
// RAM assembly: lexing, parsing, static checks
// ---------------------------------------------------------------------

pub mod ram;

// ---------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------

pub mod vm;

// ---------------------------------------------------------------------
// FAIL front end and emitter
// ---------------------------------------------------------------------

pub mod fail;

// ---------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------

pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{Compilation, Language, analyze, assemble, build, compile, load_source};
pub use error::CoreError;
pub use span::Span;
pub use vm::{CancellationToken, Event, Interpreter, MachineConfig, Pacing, StopReason};
