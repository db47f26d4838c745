//! Tokens of the RAM assembly language.

use std::fmt;

use crate::ram::ast::OpCode;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `NAME:`
    Label,
    OpCode,
    /// A bare name that is not a mnemonic.
    LabelReference,
    /// `n`
    Address,
    /// `#n`
    Immediate,
    /// `*n`
    AddressPointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Text(String),
    Number(u32),
    OpCode(OpCode),
}

/// A single token. Tokens are never modified once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,
    pub kind: TokenKind,
    pub span: Span,
    /// The lexeme exactly as written, sigils included.
    pub raw: String,
}

impl Token {
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self.value {
            TokenValue::Number(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} `{}` at {} ({})",
            self.kind, self.raw, self.span, self.span.length
        )
    }
}
