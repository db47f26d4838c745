//! Binds every function call to the declaration it invokes.

use crate::fail::ast::{Ast, Expression, FunctionCall, FunctionRef, ScopeId, Statement, Target};
use crate::fail::error::{ErrorCode, FailError};

/// Attach a [`FunctionRef`] to every call in the tree.
///
/// A call sees the functions declared anywhere along the scope chain of the
/// scope it appears in, including ones declared after it.
pub fn resolve_functions(mut ast: Ast) -> Result<Ast, FailError> {
    let mut resolved = Vec::new();
    for (index, scope) in ast.scopes.iter().enumerate() {
        let id = ScopeId(index);
        for statement in &scope.statements {
            let mut calls = Vec::new();
            collect_calls(statement, &mut calls);
            for call in calls {
                resolved.push(lookup(&ast, id, call)?);
            }
        }
    }

    let count = resolved.len();
    let mut resolved = resolved.into_iter();
    for scope in &mut ast.scopes {
        for statement in &mut scope.statements {
            for_each_call_mut(statement, &mut |call: &mut FunctionCall| {
                call.resolved = resolved.next();
            });
        }
    }
    tracing::debug!(calls = count, "resolved function calls");
    Ok(ast)
}

fn lookup(ast: &Ast, scope: ScopeId, call: &FunctionCall) -> Result<FunctionRef, FailError> {
    let name = &call.identifier.name;
    let reference = ast.function(scope, name).ok_or_else(|| {
        FailError::new(
            ErrorCode::FunctionNotFound,
            format!("function `{name}` not found"),
            call.identifier.span,
        )
    })?;
    let expected = match ast.statement(reference) {
        Some(Statement::FunctionDeclaration { arguments, .. }) => {
            ast.scope(*arguments).statements.len()
        }
        _ => 0,
    };
    if expected != call.arguments.len() {
        return Err(FailError::new(
            ErrorCode::FunctionArgumentMismatch,
            format!(
                "function `{name}` takes {expected} argument(s) but {} were given",
                call.arguments.len()
            ),
            call.span,
        ));
    }
    Ok(reference)
}

/// Calls in the expressions owned by `statement`, arguments before the
/// call they belong to. Child scopes are not entered.
fn collect_calls<'a>(statement: &'a Statement, out: &mut Vec<&'a FunctionCall>) {
    fn visit<'a>(expression: &'a Expression, out: &mut Vec<&'a FunctionCall>) {
        match expression {
            Expression::FunctionCall(call) => {
                for argument in &call.arguments {
                    visit(argument, out);
                }
                out.push(call);
            }
            Expression::BinaryOperation(operation) => {
                visit(&operation.left, out);
                visit(&operation.right, out);
            }
            Expression::ArrayAccessor(accessor) => visit(&accessor.index, out),
            _ => {}
        }
    }

    match statement {
        Statement::Assignment {
            target, expression, ..
        } => {
            if let Target::ArrayAccessor(accessor) = target {
                visit(&accessor.index, out);
            }
            visit(expression, out);
        }
        Statement::If { condition, .. } | Statement::While { condition, .. } => {
            visit(condition, out)
        }
        Statement::Return { expression, .. } | Statement::Expression(expression) => {
            visit(expression, out)
        }
        _ => {}
    }
}

/// Same traversal order as [`collect_calls`].
fn for_each_call_mut(statement: &mut Statement, f: &mut impl FnMut(&mut FunctionCall)) {
    fn visit(expression: &mut Expression, f: &mut impl FnMut(&mut FunctionCall)) {
        match expression {
            Expression::FunctionCall(call) => {
                for argument in &mut call.arguments {
                    visit(argument, f);
                }
                f(call);
            }
            Expression::BinaryOperation(operation) => {
                visit(&mut operation.left, f);
                visit(&mut operation.right, f);
            }
            Expression::ArrayAccessor(accessor) => visit(&mut accessor.index, f),
            _ => {}
        }
    }

    match statement {
        Statement::Assignment {
            target, expression, ..
        } => {
            if let Target::ArrayAccessor(accessor) = target {
                visit(&mut accessor.index, f);
            }
            visit(expression, f);
        }
        Statement::If { condition, .. } | Statement::While { condition, .. } => {
            visit(condition, f)
        }
        Statement::Return { expression, .. } | Statement::Expression(expression) => {
            visit(expression, f)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fail::lexer::tokenize;
    use crate::fail::parser::parse;
    use crate::span::Span;

    fn resolve(source: &str) -> Result<Ast, FailError> {
        resolve_functions(parse(&tokenize(source).expect("tokenize")).expect("parse"))
    }

    fn all_calls(ast: &Ast) -> Vec<FunctionCall> {
        let mut out = Vec::new();
        for scope in &ast.scopes {
            for statement in &scope.statements {
                let mut calls = Vec::new();
                collect_calls(statement, &mut calls);
                out.extend(calls.into_iter().cloned());
            }
        }
        out
    }

    #[test]
    fn binds_calls_to_their_declarations() {
        let ast = resolve(
            "fn one() -> int { return 1; }\n\
             fn inc(int a) -> int { return a + one(); }\n\
             int x = inc(one());\n\
             inc(x);",
        )
        .expect("resolve");
        let calls = all_calls(&ast);
        assert_eq!(calls.len(), 4);
        for call in &calls {
            let reference = call.resolved.expect("resolved");
            let Some(Statement::FunctionDeclaration { identifier, .. }) = ast.statement(reference)
            else {
                panic!("call bound to a non-function");
            };
            assert_eq!(identifier.name, call.identifier.name);
        }
    }

    #[test]
    fn calls_see_functions_declared_later() {
        let ast = resolve("int x = f();\nfn f() -> int { return 2; }").expect("resolve");
        let calls = all_calls(&ast);
        assert_eq!(
            calls[0].resolved,
            Some(FunctionRef {
                scope: ScopeId::ROOT,
                index: 1
            })
        );
    }

    #[test]
    fn inner_functions_shadow_outer_ones() {
        let ast = resolve(
            "fn f() -> int { return 1; }\n\
             { fn f() -> int { return 2; } int y = f(); }",
        )
        .expect("resolve");
        let calls = all_calls(&ast);
        assert_ne!(calls[0].resolved.expect("resolved").scope, ScopeId::ROOT);
    }

    #[test]
    fn reports_missing_functions() {
        let err = resolve("int x = 1;\nint y = g(x);").unwrap_err();
        assert_eq!(err.code, ErrorCode::FunctionNotFound);
        assert_eq!(err.span, Span::new(2, 9, 1));
    }

    #[test]
    fn reports_argument_count_mismatch() {
        let err = resolve("fn f(int a, int b) { a = b; }\nf(1);").unwrap_err();
        assert_eq!(err.code, ErrorCode::FunctionArgumentMismatch);
        assert_eq!(err.span.line, 2);
    }

    #[test]
    fn block_functions_are_invisible_outside() {
        let err = resolve("{ fn f() { } }\nf();").unwrap_err();
        assert_eq!(err.code, ErrorCode::FunctionNotFound);
    }
}
