//! Tokenizer for RAM assembly.
//!
//! A character-driven state machine. Positions are tracked incrementally
//! with a [`Cursor`] so tokenizing stays linear in the input size.

use crate::ram::ast::OpCode;
use crate::ram::error::RamError;
use crate::ram::token::{Token, TokenKind, TokenValue};
use crate::span::{Cursor, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Text,
    Immediate,
    Address,
    AddressPointer,
    Comment,
}

/// Tokenize RAM assembly source.
///
/// Stops at the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, RamError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lexer = Lexer {
        chars: &chars,
        index: 0,
        cursor: Cursor::new(),
        state: State::Start,
        buffer: String::new(),
        raw: String::new(),
        start: Cursor::new(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    tracing::debug!(tokens = lexer.tokens.len(), "tokenized RAM source");
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    chars: &'src [char],
    index: usize,
    cursor: Cursor,
    state: State,
    /// Significant characters of the pending token (digits or name).
    buffer: String,
    /// The pending lexeme as written.
    raw: String,
    start: Cursor,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), RamError> {
        while let Some(&ch) = self.chars.get(self.index) {
            self.accept(ch)?;
            self.cursor.advance(ch);
            self.index += 1;
        }

        // End of input terminates whatever token is pending.
        if !matches!(self.state, State::Start | State::Comment) {
            self.flush()?;
        }
        match self.state {
            State::Start | State::Comment => Ok(()),
            _ => Err(RamError::UnexpectedEndOfFile {
                span: self.cursor.span(0),
            }),
        }
    }

    fn accept(&mut self, ch: char) -> Result<(), RamError> {
        if self.state == State::Comment {
            if ch == '\n' {
                self.state = State::Start;
            }
            return Ok(());
        }

        if ch == '/' && self.peek_next() == Some('/') {
            if self.state != State::Start {
                self.flush()?;
            }
            self.state = State::Comment;
            return Ok(());
        }

        match self.state {
            State::Start => self.accept_start(ch),
            State::Text => self.accept_text(ch),
            State::Immediate | State::Address | State::AddressPointer => self.accept_number(ch),
            State::Comment => Ok(()),
        }
    }

    fn accept_start(&mut self, ch: char) -> Result<(), RamError> {
        if ch.is_whitespace() {
            return Ok(());
        }
        let next = if ch.is_alphabetic() || ch == '_' {
            self.buffer.push(ch);
            State::Text
        } else if ch.is_ascii_digit() {
            self.buffer.push(ch);
            State::Address
        } else if ch == '#' {
            State::Immediate
        } else if ch == '*' {
            State::AddressPointer
        } else {
            return Err(self.unexpected(ch));
        };
        self.start = self.cursor;
        self.raw.push(ch);
        self.state = next;
        Ok(())
    }

    fn accept_text(&mut self, ch: char) -> Result<(), RamError> {
        if ch == ':' {
            self.raw.push(ch);
            let name = self.buffer.to_uppercase();
            self.push_token(TokenValue::Text(name), TokenKind::Label);
            return Ok(());
        }
        if ch.is_whitespace() {
            return self.flush();
        }
        if ch.is_alphanumeric() || ch == '_' {
            self.buffer.push(ch);
            self.raw.push(ch);
            return Ok(());
        }
        Err(self.unexpected(ch))
    }

    fn accept_number(&mut self, ch: char) -> Result<(), RamError> {
        if ch.is_ascii_digit() {
            self.buffer.push(ch);
            self.raw.push(ch);
            return Ok(());
        }
        if ch.is_whitespace() {
            return self.flush();
        }
        Err(self.unexpected(ch))
    }

    /// Emit the pending token as if it was terminated by whitespace.
    fn flush(&mut self) -> Result<(), RamError> {
        match self.state {
            State::Text => {
                match OpCode::from_mnemonic(&self.buffer) {
                    Some(opcode) => self.push_token(TokenValue::OpCode(opcode), TokenKind::OpCode),
                    None => {
                        let name = self.buffer.to_uppercase();
                        self.push_token(TokenValue::Text(name), TokenKind::LabelReference);
                    }
                }
                Ok(())
            }
            State::Immediate | State::Address | State::AddressPointer => {
                let kind = match self.state {
                    State::Immediate => TokenKind::Immediate,
                    State::AddressPointer => TokenKind::AddressPointer,
                    _ => TokenKind::Address,
                };
                if self.buffer.is_empty() {
                    let sigil = self.raw.chars().next().unwrap_or('#');
                    return Err(RamError::MissingNumber {
                        sigil,
                        span: self.start.span(1),
                    });
                }
                let value = self
                    .buffer
                    .parse::<u32>()
                    .map_err(|_| RamError::NumberOutOfRange {
                        span: self.start.span(self.raw_length()),
                    })?;
                self.push_token(TokenValue::Number(value), kind);
                Ok(())
            }
            State::Start | State::Comment => Ok(()),
        }
    }

    fn push_token(&mut self, value: TokenValue, kind: TokenKind) {
        let span = self.start.span(self.raw_length());
        self.tokens.push(Token {
            value,
            kind,
            span,
            raw: std::mem::take(&mut self.raw),
        });
        self.buffer.clear();
        self.state = State::Start;
    }

    fn raw_length(&self) -> u32 {
        self.raw.chars().count() as u32
    }

    fn unexpected(&self, character: char) -> RamError {
        RamError::UnexpectedCharacter {
            character,
            span: self.cursor.span(1),
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }
}

/// Rebuild the significant characters of `source` from token spans.
///
/// Used to check that spans cover lexemes exactly.
pub fn reconstruct(source: &str, tokens: &[Token]) -> String {
    let lines: Vec<Vec<char>> = source.lines().map(|line| line.chars().collect()).collect();
    let mut out = String::new();
    for token in tokens {
        out.push_str(&slice(&lines, token.span));
    }
    out
}

fn slice(lines: &[Vec<char>], span: Span) -> String {
    let Some(line) = lines.get(span.line as usize - 1) else {
        return String::new();
    };
    let start = span.column as usize - 1;
    let end = (start + span.length as usize).min(line.len());
    line.get(start..end).map(|chars| chars.iter().collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_every_operand_form() {
        let tokens = tokenize("start: LOAD #5\nSTORE 1\nADD *2\nGOTO start\nEND").expect("tokenize");
        let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Label,
                TokenKind::OpCode,
                TokenKind::Immediate,
                TokenKind::OpCode,
                TokenKind::Address,
                TokenKind::OpCode,
                TokenKind::AddressPointer,
                TokenKind::OpCode,
                TokenKind::LabelReference,
                TokenKind::OpCode,
            ]
        );
        assert_eq!(tokens[0].value, TokenValue::Text("START".into()));
        assert_eq!(tokens[2].value, TokenValue::Number(5));
        assert_eq!(tokens[8].value, TokenValue::Text("START".into()));
    }

    #[test]
    fn mnemonics_match_case_insensitively() {
        let tokens = tokenize("load #1 jNzErO loop").expect("tokenize");
        assert_eq!(tokens[0].value, TokenValue::OpCode(OpCode::Load));
        assert_eq!(tokens[2].value, TokenValue::OpCode(OpCode::JNotZero));
        assert_eq!(tokens[3].kind, TokenKind::LabelReference);
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// header\nLOAD #1 // trailing\n// LOAD #2\nEND"),
            vec![TokenKind::OpCode, TokenKind::Immediate, TokenKind::OpCode]
        );
    }

    #[test]
    fn comment_terminates_pending_token() {
        let tokens = tokenize("LOAD #12// note").expect("tokenize");
        assert_eq!(tokens[1].value, TokenValue::Number(12));
    }

    #[test]
    fn tracks_positions() {
        let tokens = tokenize("LOAD #5\n  STORE 12").expect("tokenize");
        assert_eq!(tokens[1].span, Span::new(1, 6, 2));
        assert_eq!(tokens[2].span, Span::new(2, 3, 5));
        assert_eq!(tokens[3].span, Span::new(2, 9, 2));
    }

    #[test]
    fn spans_reconstruct_significant_characters() {
        let source = "// counter\nLOOP:  LOAD  #1   \n\tADD *2 // bump\n  STORE 3\nJNZERO loop\nend";
        let tokens = tokenize(source).expect("tokenize");
        let expected: String = "LOOP:LOAD#1ADD*2STORE3JNZEROloopend".into();
        assert_eq!(reconstruct(source, &tokens), expected);
    }

    #[test]
    fn rejects_unexpected_character_at_its_column() {
        let err = tokenize("LOAD @").unwrap_err();
        assert_eq!(
            err,
            RamError::UnexpectedCharacter {
                character: '@',
                span: Span::new(1, 6, 1)
            }
        );
    }

    #[test]
    fn rejects_sigil_without_number() {
        let err = tokenize("LOAD #\nEND").unwrap_err();
        assert!(matches!(err, RamError::MissingNumber { sigil: '#', .. }));
        let err = tokenize("STORE *").unwrap_err();
        assert!(matches!(err, RamError::MissingNumber { sigil: '*', .. }));
    }

    #[test]
    fn rejects_numbers_wider_than_u32() {
        let err = tokenize("LOAD #4294967296").unwrap_err();
        assert!(matches!(err, RamError::NumberOutOfRange { .. }));
    }

    #[test]
    fn accepts_empty_and_comment_only_sources() {
        assert!(tokenize("").expect("empty").is_empty());
        assert!(tokenize("// nothing here").expect("comment").is_empty());
    }
}
