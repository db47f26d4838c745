use std::fmt;

use crate::fail::operators::{BinaryOperator, IncrementalOperator, Keyword, SelfAssignmentOperator};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    Number,

    // Operators
    Binary(BinaryOperator),
    SelfAssignment(SelfAssignmentOperator),
    Incremental(IncrementalOperator),
    Assign, // =
    Arrow,  // ->

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Semi,     // ;
    Comma,    // ,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    None,
    Text(String),
    Number(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,
    pub kind: TokenKind,
    pub span: Span,
    /// The lexeme as written.
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
            TokenValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
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
