//! Tokenizer for FAIL.

use crate::fail::error::{ErrorCode, FailError};
use crate::fail::operators::{BinaryOperator, IncrementalOperator, Keyword, SelfAssignmentOperator};
use crate::fail::token::{Token, TokenKind, TokenValue};
use crate::span::Cursor;

/// Two-character operators, tried before any single character.
const DOUBLE: [&str; 11] = [
    "->", "==", "!=", ">=", "<=", "+=", "-=", "*=", "/=", "++", "--",
];

/// Tokenize FAIL source, stopping at the first unknown character.
pub fn tokenize(source: &str) -> Result<Vec<Token>, FailError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lexer = Lexer {
        chars: &chars,
        index: 0,
        cursor: Cursor::new(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    tracing::debug!(tokens = lexer.tokens.len(), "tokenized FAIL source");
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    chars: &'src [char],
    index: usize,
    cursor: Cursor,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), FailError> {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.consume_char();
                continue;
            }
            if ch == '/' && self.peek_next() == Some('/') {
                self.skip_comment();
                continue;
            }

            if ch.is_ascii_digit() {
                self.lex_number()?;
            } else if ch.is_alphabetic() || ch == '_' {
                self.lex_word();
            } else if !self.lex_double() {
                self.lex_single(ch)?;
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.consume_char();
        }
    }

    fn lex_number(&mut self) -> Result<(), FailError> {
        let start = self.cursor;
        let raw = self.take_while(|ch| ch.is_ascii_digit());
        let span = start.span(raw.chars().count() as u32);
        let value = raw.parse::<u32>().map_err(|_| {
            FailError::new(
                ErrorCode::NumberOutOfRange,
                format!("number `{raw}` does not fit in a register"),
                span,
            )
        })?;
        self.tokens.push(Token {
            value: TokenValue::Number(value),
            kind: TokenKind::Number,
            span,
            raw,
        });
        Ok(())
    }

    fn lex_word(&mut self) {
        let start = self.cursor;
        let raw = self.take_while(|ch| ch.is_alphanumeric() || ch == '_');
        let span = start.span(raw.chars().count() as u32);
        let token = match Keyword::from_text(&raw) {
            Some(keyword) => Token {
                value: TokenValue::None,
                kind: TokenKind::Keyword(keyword),
                span,
                raw,
            },
            None => Token {
                value: TokenValue::Text(raw.clone()),
                kind: TokenKind::Identifier,
                span,
                raw,
            },
        };
        self.tokens.push(token);
    }

    fn lex_double(&mut self) -> bool {
        let (Some(first), Some(second)) = (self.peek_char(), self.peek_next()) else {
            return false;
        };
        let pair: String = [first, second].iter().collect();
        if !DOUBLE.contains(&pair.as_str()) {
            return false;
        }

        let kind = if pair == "->" {
            TokenKind::Arrow
        } else if let Some(op) = BinaryOperator::from_symbol(&pair) {
            TokenKind::Binary(op)
        } else if let Some(op) = SelfAssignmentOperator::from_symbol(&pair) {
            TokenKind::SelfAssignment(op)
        } else if let Some(op) = IncrementalOperator::from_symbol(&pair) {
            TokenKind::Incremental(op)
        } else {
            return false;
        };
        self.push_symbol(kind, 2);
        true
    }

    fn lex_single(&mut self, ch: char) -> Result<(), FailError> {
        let kind = match ch {
            '=' => TokenKind::Assign,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            _ => match BinaryOperator::from_symbol(ch.encode_utf8(&mut [0; 4])) {
                Some(op) => TokenKind::Binary(op),
                None => {
                    return Err(FailError::new(
                        ErrorCode::UnexpectedCharacter,
                        format!("unexpected character `{ch}`"),
                        self.cursor.span(1),
                    ));
                }
            },
        };
        self.push_symbol(kind, 1);
        Ok(())
    }

    fn push_symbol(&mut self, kind: TokenKind, length: usize) {
        let span = self.cursor.span(length as u32);
        let mut raw = String::with_capacity(length);
        for _ in 0..length {
            if let Some(ch) = self.peek_char() {
                raw.push(ch);
                self.consume_char();
            }
        }
        self.tokens.push(Token {
            value: TokenValue::None,
            kind,
            span,
            raw,
        });
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(ch) = self.peek_char() {
            if !keep(ch) {
                break;
            }
            out.push(ch);
            self.consume_char();
        }
        out
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if let Some(&ch) = self.chars.get(self.index) {
            self.cursor.advance(ch);
            self.index += 1;
        }
    }
}
