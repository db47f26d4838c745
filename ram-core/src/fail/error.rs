use std::fmt;

use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Semantic,
    Type,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCategory::Syntax => "Syntax Error",
            ErrorCategory::Semantic => "Semantic Error",
            ErrorCategory::Type => "Type Error",
        })
    }
}

/// Stable error numbers, shown as `E1001` and up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnexpectedCharacter = 1001,
    UnexpectedEndOfCode,
    WrongStatementStart,
    WrongStatementEnd,
    WrongBlockEnd,
    WrongToken,
    DeclarationMissingIdentifier,
    DeclarationNeedingInitialization,
    AssignmentMissingOperator,
    ArrayAccessorMissingClosingBrace,
    ClosingParenthesisMissing,
    TypeNeededForInitialization,
    InvalidExpression,
    IfMissingOpeningParenthesis,
    WhileMissingOpeningParenthesis,
    ConditionMustReturnBoolean,
    BreakMustBeInsideLoop,
    ContinueMustBeInsideLoop,
    FunctionNeedingIdentifier,
    FunctionWithReturnNeedingReturnType,
    ReturnMustBeInsideFunction,
    FunctionNotFound,
    FunctionArgumentMismatch,
    UnknownIdentifier,
    DuplicateDeclaration,
    TypeMismatch,
    NumberOutOfRange,
    RecursiveCall,
}

impl ErrorCode {
    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            DeclarationMissingIdentifier
            | DeclarationNeedingInitialization
            | TypeNeededForInitialization
            | FunctionNeedingIdentifier
            | FunctionWithReturnNeedingReturnType
            | FunctionNotFound
            | FunctionArgumentMismatch
            | UnknownIdentifier
            | DuplicateDeclaration
            | RecursiveCall => ErrorCategory::Semantic,
            ConditionMustReturnBoolean | TypeMismatch => ErrorCategory::Type,
            _ => ErrorCategory::Syntax,
        }
    }
}

/// A FAIL compile error: what went wrong and where.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} (E{}): {message} at {span}", .code.category(), .code.number())]
pub struct FailError {
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
}

impl FailError {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        FailError {
            code,
            message: message.into(),
            span,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}
