//! The RAM assembly language: tokens, parsed programs and the static
//! passes that run before a program reaches the interpreter.
//!
//!   source .ram
//!     -> lexer   (tokens)
//!     -> parser  (Scope: instructions + labels)
//!     -> labels  (label references bound to addresses)
//!     -> bounds  (register operands checked against the bank size)

pub mod ast;
pub mod bounds;
pub mod error;
pub mod labels;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Argument, ArgumentValue, Instruction, Label, OpCode, Scope};
pub use bounds::check_bounds;
pub use error::RamError;
pub use labels::resolve_labels;
pub use lexer::tokenize;
pub use parser::parse;
pub use token::{Token, TokenKind, TokenValue};
