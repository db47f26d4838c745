//! Precedence climbing over `Term → Dot → Stroke → Test`.

use super::Parser;
use crate::fail::ast::{BinaryOperation, Expression, FunctionCall, Identifier, ScopeId};
use crate::fail::error::{ErrorCode, FailError};
use crate::fail::operators::{BinaryOperator, Keyword, Precedence};
use crate::fail::token::{Token, TokenKind};

impl<'t> Parser<'t> {
    pub(super) fn parse_expression(&mut self, scope: ScopeId) -> Result<Expression, FailError> {
        self.parse_level(scope, Precedence::Test)
    }

    /// Left operand from the next tighter level, then fold operators of
    /// this level left to right.
    fn parse_level(&mut self, scope: ScopeId, level: Precedence) -> Result<Expression, FailError> {
        if level == Precedence::Term {
            return self.parse_term(scope);
        }
        let mut left = self.parse_level(scope, level.above())?;
        while let Some(operator) = self.peek_operator(level) {
            self.position += 1;
            let right = self.parse_level(scope, level.above())?;
            left = Expression::BinaryOperation(Box::new(BinaryOperation {
                operator,
                span: left.span().to(right.span()),
                left,
                right,
            }));
        }
        Ok(left)
    }

    fn peek_operator(&self, level: Precedence) -> Option<BinaryOperator> {
        match self.peek_kind()? {
            TokenKind::Binary(operator) if operator.precedence() == level => Some(operator),
            _ => None,
        }
    }

    fn parse_term(&mut self, scope: ScopeId) -> Result<Expression, FailError> {
        let token = self.next("expected an expression")?;
        match token.kind {
            TokenKind::Number => Ok(Expression::Number {
                value: token.number().unwrap_or_default(),
                span: token.span,
            }),
            TokenKind::Identifier => match self.peek_kind() {
                Some(TokenKind::LParen) => self.parse_call(scope, token),
                Some(TokenKind::LBracket) => {
                    let accessor = self.parse_accessor(scope, token)?;
                    Ok(Expression::ArrayAccessor(Box::new(accessor)))
                }
                _ => Ok(Expression::Identifier(self.scalar(scope, token)?)),
            },
            TokenKind::LParen => {
                let inner = self.parse_expression(scope)?;
                self.expect(
                    TokenKind::RParen,
                    ErrorCode::ClosingParenthesisMissing,
                    "expected `)`",
                )?;
                Ok(inner)
            }
            TokenKind::Keyword(Keyword::New) => Err(FailError::new(
                ErrorCode::InvalidExpression,
                "`new` is only allowed as the initial value of a declaration",
                token.span,
            )),
            _ => Err(FailError::new(
                ErrorCode::InvalidExpression,
                format!("expected an expression, found `{}`", token.raw),
                token.span,
            )),
        }
    }

    /// `<name>(<expr>, ...)`, with the cursor on `(`.
    pub(super) fn parse_call(
        &mut self,
        scope: ScopeId,
        name_token: &Token,
    ) -> Result<Expression, FailError> {
        self.expect(TokenKind::LParen, ErrorCode::WrongToken, "expected `(`")?;
        let mut arguments = Vec::new();
        let close = if self.peek_kind() == Some(TokenKind::RParen) {
            self.next("expected `)`")?
        } else {
            loop {
                arguments.push(self.parse_expression(scope)?);
                let separator = self.next("expected `,` or `)`")?;
                match separator.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break separator,
                    _ => {
                        return Err(FailError::new(
                            ErrorCode::ClosingParenthesisMissing,
                            format!("expected `,` or `)` in the call, found `{}`", separator.raw),
                            separator.span,
                        ));
                    }
                }
            }
        };
        Ok(Expression::FunctionCall(FunctionCall {
            identifier: Identifier::new(name_token.raw.clone(), name_token.span),
            arguments,
            resolved: None,
            span: name_token.span.to(close.span),
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::fail::ast::{Expression, ScopeId, Statement};
    use crate::fail::lexer::tokenize;
    use crate::fail::operators::BinaryOperator;
    use crate::fail::parser::parse;
    use crate::span::Span;

    fn initializer(source: &str) -> Expression {
        let ast = parse(&tokenize(source).expect("tokenize")).expect("parse");
        match ast.scope(ScopeId::ROOT).statements.last() {
            Some(Statement::Assignment { expression, .. }) => expression.clone(),
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn comparison_is_the_loosest_level() {
        let Expression::BinaryOperation(operation) = initializer("int a = 1; int b = a * 2 >= a + 3;")
        else {
            panic!("expected an operation");
        };
        assert_eq!(operation.operator, BinaryOperator::GreaterThanOrEqual);
        assert_eq!(operation.left.to_string(), "(a * 2)");
        assert_eq!(operation.right.to_string(), "(a + 3)");
    }

    #[test]
    fn operation_spans_cover_both_operands() {
        let expression = initializer("int b = 12 + 3;");
        assert_eq!(expression.span(), Span::new(1, 9, 6));
    }

    #[test]
    fn calls_take_nested_arguments() {
        let expression = initializer("int a = 2; int b = f(a + 1, (a), g());");
        let Expression::FunctionCall(call) = expression else {
            panic!("expected a call");
        };
        assert_eq!(call.identifier.name, "f");
        assert_eq!(call.arguments.len(), 3);
        assert!(call.resolved.is_none());
        assert_eq!(call.arguments[1].to_string(), "a");
    }

    #[test]
    fn missing_parenthesis_is_reported() {
        let err = parse(&tokenize("int a = (1 + 2;").expect("tokenize")).unwrap_err();
        assert_eq!(err.code, crate::fail::error::ErrorCode::ClosingParenthesisMissing);
        assert_eq!(err.span, Span::new(1, 15, 1));
    }
}
