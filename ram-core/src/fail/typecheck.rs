//! Back-fills the types of untyped declarations.
//!
//! Inference is shallow: a declaration takes the type of its initializer and
//! nothing is unified or rejected here. Conditions are already checked by the
//! parser.

use crate::fail::ast::{Ast, Expression, Identifier, ScopeId, Statement, Target};
use crate::fail::error::FailError;
use crate::fail::types::ElementType;

pub fn check_types(mut ast: Ast) -> Result<Ast, FailError> {
    let mut inferred = 0usize;
    for index in 0..ast.scopes.len() {
        let scope = ScopeId(index);
        for position in 0..ast.scope(scope).statements.len() {
            let ty = match &ast.scope(scope).statements[position] {
                Statement::Assignment {
                    target: Target::Identifier(identifier),
                    expression,
                    is_initial: true,
                    ..
                } if identifier.ty.is_none() => infer(&ast, expression),
                Statement::Return {
                    expression: Expression::Identifier(identifier),
                    ..
                } if identifier.ty.is_none() => infer_identifier(&ast, identifier),
                _ => None,
            };
            let Some(ty) = ty else { continue };

            tracing::trace!(scope = index, position, %ty, "inferred type");
            inferred += 1;
            match &mut ast.scope_mut(scope).statements[position] {
                Statement::Assignment {
                    target: Target::Identifier(identifier),
                    ..
                }
                | Statement::Return {
                    expression: Expression::Identifier(identifier),
                    ..
                } => identifier.ty = Some(ty),
                _ => {}
            }
        }
    }
    tracing::debug!(inferred, "checked types");
    Ok(ast)
}

fn infer(ast: &Ast, expression: &Expression) -> Option<ElementType> {
    match expression {
        Expression::Number { .. } => Some(ElementType::Int),
        Expression::Identifier(identifier) => infer_identifier(ast, identifier),
        Expression::BinaryOperation(operation) => {
            Some(ElementType::of_operation(operation.operator))
        }
        Expression::ArrayAccessor(accessor) => infer_identifier(ast, &accessor.identifier)
            .map(|ty| ty.element().clone()),
        Expression::TypeInitialization { ty, .. } => Some(ty.clone()),
        Expression::FunctionCall(call) => match call.resolved.and_then(|r| ast.statement(r)) {
            Some(Statement::FunctionDeclaration { return_type, .. }) => return_type.clone(),
            _ => None,
        },
    }
}

/// The type currently recorded on the declaration `identifier` refers to.
fn infer_identifier(ast: &Ast, identifier: &Identifier) -> Option<ElementType> {
    if identifier.ty.is_some() {
        return identifier.ty.clone();
    }
    let binding = identifier.binding?;
    ast.declaration(binding, &identifier.name)
        .and_then(|(_, declaration)| declaration.ty.clone())
}
