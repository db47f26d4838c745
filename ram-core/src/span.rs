//! Source positions shared by both languages.

use std::fmt;

/// Position of a lexeme in the source text.
///
/// `line` and `column` are 1-based and point at the first character;
/// `length` counts characters, sigils included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, length: u32) -> Self {
        Span {
            line,
            column,
            length,
        }
    }

    /// Zero-length span right after this one.
    pub fn end(&self) -> Span {
        Span::new(self.line, self.column + self.length, 0)
    }

    /// Span running from the start of `self` to the end of `other`.
    ///
    /// Only meaningful when both lie on the same line; otherwise `self`
    /// is returned unchanged.
    pub fn to(&self, other: Span) -> Span {
        if self.line != other.line || other.column < self.column {
            return *self;
        }
        Span::new(
            self.line,
            self.column,
            other.column + other.length - self.column,
        )
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Incremental line/column tracker used by both tokenizers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pub line: u32,
    pub column: u32,
}

impl Cursor {
    pub fn new() -> Self {
        Cursor { line: 1, column: 1 }
    }

    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    pub fn span(&self, length: u32) -> Span {
        Span::new(self.line, self.column, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_lines_and_columns() {
        let mut cursor = Cursor::new();
        for ch in "ab\ncd".chars() {
            cursor.advance(ch);
        }
        assert_eq!((cursor.line, cursor.column), (2, 3));
    }

    #[test]
    fn joins_spans_on_one_line() {
        let joined = Span::new(1, 3, 2).to(Span::new(1, 8, 1));
        assert_eq!(joined, Span::new(1, 3, 6));
        assert_eq!(Span::new(2, 1, 4).end(), Span::new(2, 5, 0));
    }
}
