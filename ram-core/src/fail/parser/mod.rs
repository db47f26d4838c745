//! Recursive-descent parser for FAIL statements.
//!
//! Statements are pushed into their scope as soon as they are parsed, so a
//! name resolves only against declarations that precede it. Expressions
//! live in [`expr`].

mod expr;

use crate::fail::ast::{
    ArrayAccessor, Ast, BinaryOperation, Expression, Identifier, ScopeId, Statement, Target,
};
use crate::fail::error::{ErrorCode, FailError};
use crate::fail::operators::{BinaryOperator, Keyword};
use crate::fail::token::{Token, TokenKind};
use crate::fail::types::ElementType;
use crate::span::Span;
use crate::vm::MAX_REGISTERS;

/// Parse a token stream into an [`Ast`].
///
/// Variable uses are bound to their declarations here; function calls are
/// left for [`crate::fail::resolve`].
pub fn parse(tokens: &[Token]) -> Result<Ast, FailError> {
    let mut parser = Parser {
        tokens,
        position: 0,
        ast: Ast::new(),
        saw_return: false,
    };
    parser.parse_statements(ScopeId::ROOT, Context::default(), false)?;
    tracing::debug!(
        scopes = parser.ast.scopes.len(),
        statements = parser.ast.scope(ScopeId::ROOT).statements.len(),
        "parsed FAIL program"
    );
    Ok(parser.ast)
}

/// Flags threaded through nested statements.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_loop: bool,
    in_function: bool,
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
    ast: Ast,
    /// Set when a `return` is parsed inside the current function body.
    saw_return: bool,
}

impl<'t> Parser<'t> {
    /// Parse statements into `scope` until `}` (when `braced`) or end of input.
    fn parse_statements(
        &mut self,
        scope: ScopeId,
        context: Context,
        braced: bool,
    ) -> Result<(), FailError> {
        loop {
            match self.peek() {
                None if braced => {
                    return Err(self.end_of_code("expected `}` to close the block"));
                }
                None => return Ok(()),
                Some(token) if token.kind == TokenKind::RBrace => {
                    if braced {
                        self.position += 1;
                        return Ok(());
                    }
                    return Err(FailError::new(
                        ErrorCode::WrongBlockEnd,
                        "unmatched `}`",
                        token.span,
                    ));
                }
                Some(_) => self.parse_statement(scope, context)?,
            }
        }
    }

    fn parse_statement(&mut self, scope: ScopeId, context: Context) -> Result<(), FailError> {
        let token = self.next("expected a statement")?;
        let statement = match token.kind {
            TokenKind::Keyword(Keyword::Var | Keyword::Int | Keyword::Bool) => {
                self.parse_declaration(scope, token)?
            }
            TokenKind::Identifier => self.parse_identifier_statement(scope, token)?,
            TokenKind::Keyword(Keyword::If) => self.parse_if(scope, context, token)?,
            TokenKind::Keyword(Keyword::While) => self.parse_while(scope, context, token)?,
            TokenKind::Keyword(Keyword::Break) => {
                if !context.in_loop {
                    return Err(FailError::new(
                        ErrorCode::BreakMustBeInsideLoop,
                        "`break` outside of a loop",
                        token.span,
                    ));
                }
                self.expect_semi()?;
                Statement::Break(token.span)
            }
            TokenKind::Keyword(Keyword::Continue) => {
                if !context.in_loop {
                    return Err(FailError::new(
                        ErrorCode::ContinueMustBeInsideLoop,
                        "`continue` outside of a loop",
                        token.span,
                    ));
                }
                self.expect_semi()?;
                Statement::Continue(token.span)
            }
            TokenKind::Keyword(Keyword::Fn) => self.parse_function(scope, token)?,
            TokenKind::Keyword(Keyword::Return) => {
                if !context.in_function {
                    return Err(FailError::new(
                        ErrorCode::ReturnMustBeInsideFunction,
                        "`return` outside of a function",
                        token.span,
                    ));
                }
                let expression = self.parse_expression(scope)?;
                self.expect_semi()?;
                self.saw_return = true;
                Statement::Return {
                    span: token.span.to(expression.span()),
                    expression,
                }
            }
            TokenKind::LBrace => {
                let block = self.ast.add_scope(vec![scope]);
                self.parse_statements(block, context, true)?;
                Statement::Body(block)
            }
            _ => {
                return Err(FailError::new(
                    ErrorCode::WrongStatementStart,
                    format!("a statement cannot start with `{}`", token.raw),
                    token.span,
                ));
            }
        };
        self.ast.scope_mut(scope).statements.push(statement);
        Ok(())
    }

    /// `<type> <identifier> = <expr>;`
    fn parse_declaration(&mut self, scope: ScopeId, type_token: &Token) -> Result<Statement, FailError> {
        let declared = match type_token.kind {
            TokenKind::Keyword(keyword) => ElementType::from_keyword(keyword),
            _ => None,
        };
        let name_token = self.expect_identifier(
            ErrorCode::DeclarationMissingIdentifier,
            "expected a name after the type",
        )?;
        let name = name_token.raw.as_str();
        self.check_duplicate(scope, name, name_token.span)?;
        self.expect(
            TokenKind::Assign,
            ErrorCode::DeclarationNeedingInitialization,
            "declarations need an initial value",
        )?;

        let (ty, expression) = if self.peek().is_some_and(|token| token.is_keyword(Keyword::New)) {
            let (ty, span) = self.parse_initialization()?;
            if let Some(declared) = &declared {
                if declared != ty.element() {
                    return Err(FailError::new(
                        ErrorCode::TypeMismatch,
                        format!("cannot initialize `{declared}` variable with `{ty}`"),
                        span,
                    ));
                }
            }
            (Some(ty.clone()), Expression::TypeInitialization { ty, span })
        } else {
            (declared, self.parse_expression(scope)?)
        };
        let semi = self.expect_semi()?;

        let identifier = Identifier {
            name: name.to_string(),
            ty,
            binding: Some(scope),
            span: name_token.span,
        };
        Ok(Statement::Assignment {
            target: Target::Identifier(identifier),
            expression,
            is_initial: true,
            span: type_token.span.to(semi.span),
        })
    }

    /// `new <type>[<size>]`
    fn parse_initialization(&mut self) -> Result<(ElementType, Span), FailError> {
        let new = self.next("expected `new`")?;
        let token = self.next("expected a type after `new`")?;
        let element = match token.kind {
            TokenKind::Keyword(Keyword::Int) => ElementType::Int,
            TokenKind::Keyword(Keyword::Bool) => ElementType::Bool,
            _ => {
                return Err(FailError::new(
                    ErrorCode::TypeNeededForInitialization,
                    format!("expected `int` or `bool` after `new`, found `{}`", token.raw),
                    token.span,
                ));
            }
        };
        self.expect(TokenKind::LBracket, ErrorCode::WrongToken, "expected `[` and an array size")?;
        let size_token = self.next("expected an array size")?;
        let size = match size_token.number() {
            Some(size) if size > MAX_REGISTERS => {
                return Err(FailError::new(
                    ErrorCode::NumberOutOfRange,
                    format!("array size {size} exceeds the {MAX_REGISTERS} registers of a machine"),
                    size_token.span,
                ));
            }
            Some(size) if size > 0 => size,
            _ => {
                return Err(FailError::new(
                    ErrorCode::InvalidExpression,
                    "array size must be a positive number",
                    size_token.span,
                ));
            }
        };
        let close = self.expect(
            TokenKind::RBracket,
            ErrorCode::ArrayAccessorMissingClosingBrace,
            "expected `]`",
        )?;
        Ok((ElementType::array(element, size), new.span.to(close.span)))
    }

    /// Statements starting with a name: assignments, calls and element writes.
    fn parse_identifier_statement(
        &mut self,
        scope: ScopeId,
        name_token: &Token,
    ) -> Result<Statement, FailError> {
        let Some(next) = self.peek() else {
            return Err(self.end_of_code("expected an assignment or call"));
        };
        match next.kind {
            TokenKind::LParen => {
                let call = self.parse_call(scope, name_token)?;
                self.expect_semi()?;
                Ok(Statement::Expression(call))
            }
            TokenKind::LBracket => {
                let accessor = self.parse_accessor(scope, name_token)?;
                self.expect(
                    TokenKind::Assign,
                    ErrorCode::AssignmentMissingOperator,
                    "expected `=` after the array element",
                )?;
                let expression = self.parse_expression(scope)?;
                let semi = self.expect_semi()?;
                Ok(Statement::Assignment {
                    target: Target::ArrayAccessor(accessor),
                    expression,
                    is_initial: false,
                    span: name_token.span.to(semi.span),
                })
            }
            TokenKind::Assign => {
                self.position += 1;
                let target = self.scalar(scope, name_token)?;
                let expression = self.parse_expression(scope)?;
                let semi = self.expect_semi()?;
                Ok(Statement::Assignment {
                    target: Target::Identifier(target),
                    expression,
                    is_initial: false,
                    span: name_token.span.to(semi.span),
                })
            }
            TokenKind::SelfAssignment(operator) => {
                self.position += 1;
                let target = self.scalar(scope, name_token)?;
                let right = self.parse_expression(scope)?;
                let semi = self.expect_semi()?;
                Ok(desugar(target, operator.binary(), right, name_token.span.to(semi.span)))
            }
            TokenKind::Incremental(operator) => {
                let operator_span = next.span;
                self.position += 1;
                let target = self.scalar(scope, name_token)?;
                let semi = self.expect_semi()?;
                let one = Expression::Number {
                    value: 1,
                    span: operator_span,
                };
                Ok(desugar(target, operator.binary(), one, name_token.span.to(semi.span)))
            }
            _ => Err(FailError::new(
                ErrorCode::AssignmentMissingOperator,
                format!("expected an assignment operator, found `{}`", next.raw),
                next.span,
            )),
        }
    }

    fn parse_if(
        &mut self,
        scope: ScopeId,
        context: Context,
        keyword: &Token,
    ) -> Result<Statement, FailError> {
        let condition = self.parse_condition(
            scope,
            ErrorCode::IfMissingOpeningParenthesis,
            "expected `(` after `if`",
        )?;
        let body = self.parse_body(scope, context)?;
        let else_body = if self.peek().is_some_and(|token| token.is_keyword(Keyword::Else)) {
            self.position += 1;
            Some(self.parse_body(scope, context)?)
        } else {
            None
        };
        Ok(Statement::If {
            span: keyword.span.to(condition.span()),
            condition,
            body,
            else_body,
        })
    }

    fn parse_while(
        &mut self,
        scope: ScopeId,
        context: Context,
        keyword: &Token,
    ) -> Result<Statement, FailError> {
        let condition = self.parse_condition(
            scope,
            ErrorCode::WhileMissingOpeningParenthesis,
            "expected `(` after `while`",
        )?;
        let body = self.parse_body(
            scope,
            Context {
                in_loop: true,
                ..context
            },
        )?;
        Ok(Statement::While {
            span: keyword.span.to(condition.span()),
            condition,
            body,
        })
    }

    /// `( <comparison> )`
    fn parse_condition(
        &mut self,
        scope: ScopeId,
        missing_open: ErrorCode,
        message: &str,
    ) -> Result<Expression, FailError> {
        self.expect(TokenKind::LParen, missing_open, message)?;
        let condition = self.parse_expression(scope)?;
        self.expect(
            TokenKind::RParen,
            ErrorCode::ClosingParenthesisMissing,
            "expected `)` after the condition",
        )?;
        match &condition {
            Expression::BinaryOperation(operation) if operation.operator.is_comparison() => {
                Ok(condition)
            }
            _ => Err(FailError::new(
                ErrorCode::ConditionMustReturnBoolean,
                format!("condition `{condition}` is not a comparison"),
                condition.span(),
            )),
        }
    }

    /// A braced block or a single statement, always in a fresh child scope.
    fn parse_body(&mut self, scope: ScopeId, context: Context) -> Result<ScopeId, FailError> {
        let body = self.ast.add_scope(vec![scope]);
        if self.peek_kind() == Some(TokenKind::LBrace) {
            self.position += 1;
            self.parse_statements(body, context, true)?;
        } else {
            self.parse_statement(body, context)?;
        }
        Ok(body)
    }

    /// `fn <name>(<type> <arg>, ...) [-> <type>] { ... }`
    fn parse_function(&mut self, scope: ScopeId, keyword: &Token) -> Result<Statement, FailError> {
        let name_token = self.expect_identifier(
            ErrorCode::FunctionNeedingIdentifier,
            "expected a function name after `fn`",
        )?;
        let duplicate = self.ast.scope(scope).statements.iter().any(|statement| {
            matches!(statement, Statement::FunctionDeclaration { identifier, .. } if identifier.name == name_token.raw)
        });
        if duplicate {
            return Err(FailError::new(
                ErrorCode::DuplicateDeclaration,
                format!("function `{}` is already declared in this scope", name_token.raw),
                name_token.span,
            ));
        }

        self.expect(TokenKind::LParen, ErrorCode::WrongToken, "expected `(` after the function name")?;
        let arguments = self.ast.add_scope(vec![scope]);
        self.parse_arguments(arguments)?;

        let return_type = if self.peek_kind() == Some(TokenKind::Arrow) {
            self.position += 1;
            let token = self.next("expected a return type after `->`")?;
            match token.kind {
                TokenKind::Keyword(keyword) if keyword.is_type() => ElementType::from_keyword(keyword),
                _ => {
                    return Err(FailError::new(
                        ErrorCode::WrongToken,
                        format!("expected `int` or `bool` after `->`, found `{}`", token.raw),
                        token.span,
                    ));
                }
            }
        } else {
            None
        };

        self.expect(TokenKind::LBrace, ErrorCode::WrongToken, "expected `{` to open the function body")?;
        let body = self.ast.add_scope(vec![arguments]);
        let enclosing_return = std::mem::replace(&mut self.saw_return, false);
        self.parse_statements(
            body,
            Context {
                in_loop: false,
                in_function: true,
            },
            true,
        )?;
        let returns = std::mem::replace(&mut self.saw_return, enclosing_return);
        if returns && return_type.is_none() {
            return Err(FailError::new(
                ErrorCode::FunctionWithReturnNeedingReturnType,
                format!("function `{}` returns a value but declares no return type", name_token.raw),
                name_token.span,
            ));
        }

        Ok(Statement::FunctionDeclaration {
            identifier: Identifier {
                name: name_token.raw.clone(),
                ty: return_type.clone(),
                binding: Some(scope),
                span: name_token.span,
            },
            arguments,
            body,
            return_type,
            span: keyword.span.to(name_token.span),
        })
    }

    /// Argument list after `(`, through the closing `)`.
    fn parse_arguments(&mut self, arguments: ScopeId) -> Result<(), FailError> {
        if self.peek_kind() == Some(TokenKind::RParen) {
            self.position += 1;
            return Ok(());
        }
        loop {
            let type_token = self.next("expected an argument type")?;
            let ty = match type_token.kind {
                TokenKind::Keyword(Keyword::Var) => None,
                TokenKind::Keyword(keyword) if keyword.is_type() => ElementType::from_keyword(keyword),
                _ => {
                    return Err(FailError::new(
                        ErrorCode::WrongToken,
                        format!("expected an argument type, found `{}`", type_token.raw),
                        type_token.span,
                    ));
                }
            };
            let name_token = self.expect_identifier(
                ErrorCode::DeclarationMissingIdentifier,
                "expected an argument name",
            )?;
            self.check_duplicate(arguments, &name_token.raw, name_token.span)?;
            self.ast
                .scope_mut(arguments)
                .statements
                .push(Statement::ArgumentDefinition {
                    identifier: Identifier {
                        name: name_token.raw.clone(),
                        ty,
                        binding: Some(arguments),
                        span: name_token.span,
                    },
                });

            let separator = self.next("expected `,` or `)`")?;
            match separator.kind {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(()),
                _ => {
                    return Err(FailError::new(
                        ErrorCode::ClosingParenthesisMissing,
                        format!("expected `,` or `)`, found `{}`", separator.raw),
                        separator.span,
                    ));
                }
            }
        }
    }

    /// Resolve a use of `name_token` against the visible declarations.
    fn variable(&self, scope: ScopeId, name_token: &Token) -> Result<Identifier, FailError> {
        let name = name_token.raw.as_str();
        let (binding, declaration) = self.ast.declaration(scope, name).ok_or_else(|| {
            FailError::new(
                ErrorCode::UnknownIdentifier,
                format!("unknown identifier `{name}`"),
                name_token.span,
            )
        })?;
        Ok(Identifier {
            name: name.to_string(),
            ty: declaration.ty.clone(),
            binding: Some(binding),
            span: name_token.span,
        })
    }

    /// A variable that must be used as a scalar.
    fn scalar(&self, scope: ScopeId, name_token: &Token) -> Result<Identifier, FailError> {
        let identifier = self.variable(scope, name_token)?;
        if identifier.ty.as_ref().is_some_and(ElementType::is_array) {
            return Err(FailError::new(
                ErrorCode::TypeMismatch,
                format!("array `{}` must be indexed", identifier.name),
                identifier.span,
            ));
        }
        Ok(identifier)
    }

    /// `<name>[<index>]`, with the cursor on `[`.
    fn parse_accessor(&mut self, scope: ScopeId, name_token: &Token) -> Result<ArrayAccessor, FailError> {
        let identifier = self.variable(scope, name_token)?;
        if !identifier.ty.as_ref().is_some_and(ElementType::is_array) {
            return Err(FailError::new(
                ErrorCode::TypeMismatch,
                format!("`{}` is not an array", identifier.name),
                identifier.span,
            ));
        }
        self.expect(TokenKind::LBracket, ErrorCode::WrongToken, "expected `[`")?;
        let index = self.parse_expression(scope)?;
        let close = self.expect(
            TokenKind::RBracket,
            ErrorCode::ArrayAccessorMissingClosingBrace,
            "expected `]` after the index",
        )?;
        Ok(ArrayAccessor {
            span: identifier.span.to(close.span),
            identifier,
            index,
        })
    }

    fn check_duplicate(&self, scope: ScopeId, name: &str, span: Span) -> Result<(), FailError> {
        let exists = self
            .ast
            .scope(scope)
            .statements
            .iter()
            .filter_map(Statement::declared)
            .any(|identifier| identifier.name == name);
        if exists {
            return Err(FailError::new(
                ErrorCode::DuplicateDeclaration,
                format!("`{name}` is already declared in this scope"),
                span,
            ));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn next(&mut self, expected: &str) -> Result<&'t Token, FailError> {
        let token = self.peek().ok_or_else(|| self.end_of_code(expected))?;
        self.position += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, code: ErrorCode, message: &str) -> Result<&'t Token, FailError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(FailError::new(
                code,
                format!("{message}, found `{}`", token.raw),
                token.span,
            )),
            None => Err(self.end_of_code(message)),
        }
    }

    fn expect_identifier(&mut self, code: ErrorCode, message: &str) -> Result<&'t Token, FailError> {
        self.expect(TokenKind::Identifier, code, message)
    }

    fn expect_semi(&mut self) -> Result<&'t Token, FailError> {
        self.expect(
            TokenKind::Semi,
            ErrorCode::WrongStatementEnd,
            "expected `;` at the end of the statement",
        )
    }

    fn end_of_code(&self, message: &str) -> FailError {
        let span = self
            .tokens
            .last()
            .map(|token| token.span.end())
            .unwrap_or_else(|| Span::new(1, 1, 0));
        FailError::new(
            ErrorCode::UnexpectedEndOfCode,
            format!("{message}, found end of code"),
            span,
        )
    }
}

/// `x op= e` becomes `x = x op e`.
fn desugar(target: Identifier, operator: BinaryOperator, right: Expression, span: Span) -> Statement {
    let left = Expression::Identifier(target.clone());
    Statement::Assignment {
        expression: Expression::BinaryOperation(Box::new(BinaryOperation {
            operator,
            span: left.span().to(right.span()),
            left,
            right,
        })),
        target: Target::Identifier(target),
        is_initial: false,
        span,
    }
}
