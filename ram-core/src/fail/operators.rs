//! Keywords and operators of FAIL.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Var,
    Int,
    Bool,
    If,
    Else,
    While,
    Break,
    Continue,
    New,
    Fn,
    Return,
}

impl Keyword {
    pub fn from_text(text: &str) -> Option<Keyword> {
        Some(match text {
            "var" => Keyword::Var,
            "int" => Keyword::Int,
            "bool" => Keyword::Bool,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "new" => Keyword::New,
            "fn" => Keyword::Fn,
            "return" => Keyword::Return,
            _ => return None,
        })
    }

    /// Keywords that name a type in a declaration or signature.
    pub fn is_type(self) -> bool {
        matches!(self, Keyword::Int | Keyword::Bool)
    }
}

/// Precedence classes, loosest binding last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Term,
    /// `*` `/`
    Dot,
    /// `+` `-`
    Stroke,
    /// comparisons
    Test,
}

impl Precedence {
    /// The next tighter-binding class.
    pub fn above(self) -> Precedence {
        match self {
            Precedence::Test => Precedence::Stroke,
            Precedence::Stroke => Precedence::Dot,
            Precedence::Dot | Precedence::Term => Precedence::Term,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOperator> {
        Some(match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "==" => BinaryOperator::Equal,
            "!=" => BinaryOperator::NotEqual,
            ">" => BinaryOperator::GreaterThan,
            "<" => BinaryOperator::LessThan,
            ">=" => BinaryOperator::GreaterThanOrEqual,
            "<=" => BinaryOperator::LessThanOrEqual,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::LessThanOrEqual => "<=",
        }
    }

    pub fn precedence(self) -> Precedence {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide => Precedence::Dot,
            BinaryOperator::Add | BinaryOperator::Subtract => Precedence::Stroke,
            _ => Precedence::Test,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == Precedence::Test
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `+=` `-=` `*=` `/=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfAssignmentOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl SelfAssignmentOperator {
    pub fn from_symbol(symbol: &str) -> Option<SelfAssignmentOperator> {
        Some(match symbol {
            "+=" => SelfAssignmentOperator::Add,
            "-=" => SelfAssignmentOperator::Subtract,
            "*=" => SelfAssignmentOperator::Multiply,
            "/=" => SelfAssignmentOperator::Divide,
            _ => return None,
        })
    }

    pub fn binary(self) -> BinaryOperator {
        match self {
            SelfAssignmentOperator::Add => BinaryOperator::Add,
            SelfAssignmentOperator::Subtract => BinaryOperator::Subtract,
            SelfAssignmentOperator::Multiply => BinaryOperator::Multiply,
            SelfAssignmentOperator::Divide => BinaryOperator::Divide,
        }
    }
}

/// `++` `--`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalOperator {
    Increment,
    Decrement,
}

impl IncrementalOperator {
    pub fn from_symbol(symbol: &str) -> Option<IncrementalOperator> {
        match symbol {
            "++" => Some(IncrementalOperator::Increment),
            "--" => Some(IncrementalOperator::Decrement),
            _ => None,
        }
    }

    pub fn binary(self) -> BinaryOperator {
        match self {
            IncrementalOperator::Increment => BinaryOperator::Add,
            IncrementalOperator::Decrement => BinaryOperator::Subtract,
        }
    }
}
