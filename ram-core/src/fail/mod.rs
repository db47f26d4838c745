//! FAIL, a small imperative language compiled to RAM assembly.
//!
//!   source .fail
//!     -> lexer      (tokens)
//!     -> parser     (Ast: arena of scopes, declarations bound)
//!     -> resolve    (calls bound to function declarations)
//!     -> typecheck  (untyped declarations inferred)
//!     -> emit       (RAM assembly text, calls inlined)

pub mod ast;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod resolve;
pub mod token;
pub mod typecheck;
pub mod types;

pub use ast::{Ast, Expression, ScopeId, Statement};
pub use emit::{Emission, Symbol, emit};
pub use error::{ErrorCategory, ErrorCode, FailError};
pub use lexer::tokenize;
pub use parser::parse;
pub use resolve::resolve_functions;
pub use token::{Token, TokenKind};
pub use typecheck::check_types;
pub use types::ElementType;
