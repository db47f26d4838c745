//! Syntax tree for FAIL.
//!
//! Scopes live in an arena owned by [`Ast`] and are addressed by
//! [`ScopeId`]. A scope holds its own statements plus the scopes it may
//! search but never mutate (`shared`): a block shares its enclosing scope,
//! a function body shares its argument scope, which in turn shares the
//! scope the function was declared in.

use std::fmt;

use crate::fail::operators::BinaryOperator;
use crate::fail::types::ElementType;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a statement: the scope and its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub scope: ScopeId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub ty: Option<ElementType>,
    /// Scope holding the declaration this name refers to.
    pub binding: Option<ScopeId>,
    pub span: Span,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Identifier {
            name: name.into(),
            ty: None,
            binding: None,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryOperation {
    pub operator: BinaryOperator,
    pub left: Expression,
    pub right: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAccessor {
    pub identifier: Identifier,
    pub index: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub identifier: Identifier,
    pub arguments: Vec<Expression>,
    /// Filled in by [`crate::fail::resolve`].
    pub resolved: Option<FunctionRef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Identifier(Identifier),
    Number { value: u32, span: Span },
    BinaryOperation(Box<BinaryOperation>),
    ArrayAccessor(Box<ArrayAccessor>),
    /// `new int[5]`
    TypeInitialization { ty: ElementType, span: Span },
    FunctionCall(FunctionCall),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Identifier(identifier) => identifier.span,
            Expression::Number { span, .. } | Expression::TypeInitialization { span, .. } => *span,
            Expression::BinaryOperation(operation) => operation.span,
            Expression::ArrayAccessor(accessor) => accessor.span,
            Expression::FunctionCall(call) => call.span,
        }
    }

    /// True when evaluating this expression emits a function body.
    pub fn contains_call(&self) -> bool {
        match self {
            Expression::FunctionCall(_) => true,
            Expression::BinaryOperation(operation) => {
                operation.left.contains_call() || operation.right.contains_call()
            }
            Expression::ArrayAccessor(accessor) => accessor.index.contains_call(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Identifier(Identifier),
    ArrayAccessor(ArrayAccessor),
}

impl Target {
    pub fn identifier(&self) -> &Identifier {
        match self {
            Target::Identifier(identifier) => identifier,
            Target::ArrayAccessor(accessor) => &accessor.identifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Assignment {
        target: Target,
        expression: Expression,
        /// Declarations are the initial assignment of their identifier.
        is_initial: bool,
        span: Span,
    },
    If {
        condition: Expression,
        body: ScopeId,
        else_body: Option<ScopeId>,
        span: Span,
    },
    While {
        condition: Expression,
        body: ScopeId,
        span: Span,
    },
    Body(ScopeId),
    Break(Span),
    Continue(Span),
    FunctionDeclaration {
        identifier: Identifier,
        arguments: ScopeId,
        body: ScopeId,
        return_type: Option<ElementType>,
        span: Span,
    },
    ArgumentDefinition {
        identifier: Identifier,
    },
    Return {
        expression: Expression,
        span: Span,
    },
    /// A call evaluated for its effects.
    Expression(Expression),
}

impl Statement {
    /// The identifier this statement declares in its scope, if any.
    pub fn declared(&self) -> Option<&Identifier> {
        match self {
            Statement::Assignment {
                target: Target::Identifier(identifier),
                is_initial: true,
                ..
            }
            | Statement::ArgumentDefinition { identifier } => Some(identifier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub statements: Vec<Statement>,
    pub shared: Vec<ScopeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    pub scopes: Vec<Scope>,
}

impl Default for Ast {
    fn default() -> Self {
        Ast::new()
    }
}

impl Ast {
    /// An AST holding only the empty root scope.
    pub fn new() -> Self {
        Ast {
            scopes: vec![Scope::default()],
        }
    }

    pub fn add_scope(&mut self, shared: Vec<ScopeId>) -> ScopeId {
        self.scopes.push(Scope {
            statements: Vec::new(),
            shared,
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Panics on an id not produced by this AST.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn statement(&self, reference: FunctionRef) -> Option<&Statement> {
        self.scopes
            .get(reference.scope.0)
            .and_then(|scope| scope.statements.get(reference.index))
    }

    /// First statement for which `predicate` yields a value.
    ///
    /// Local statements are checked in order before the shared scopes,
    /// which are searched depth-first, so inner declarations shadow outer
    /// ones.
    pub fn search<'a, T>(
        &'a self,
        scope: ScopeId,
        mut predicate: impl FnMut(usize, &'a Statement) -> Option<T>,
    ) -> Option<(ScopeId, T)> {
        self.search_with(scope, &mut predicate)
    }

    fn search_with<'a, T, F>(&'a self, scope: ScopeId, predicate: &mut F) -> Option<(ScopeId, T)>
    where
        F: FnMut(usize, &'a Statement) -> Option<T>,
    {
        let current = self.scopes.get(scope.0)?;
        for (index, statement) in current.statements.iter().enumerate() {
            if let Some(found) = predicate(index, statement) {
                return Some((scope, found));
            }
        }
        for &shared in &current.shared {
            if let Some(found) = self.search_with(shared, predicate) {
                return Some(found);
            }
        }
        None
    }

    /// The visible declaration of `name`, with the scope declaring it.
    pub fn declaration(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Identifier)> {
        self.search(scope, |_, statement| {
            statement.declared().filter(|identifier| identifier.name == name)
        })
    }

    /// The visible function declaration named `name`.
    pub fn function(&self, scope: ScopeId, name: &str) -> Option<FunctionRef> {
        self.search(scope, |index, statement| match statement {
            Statement::FunctionDeclaration { identifier, .. } if identifier.name == name => {
                Some(index)
            }
            _ => None,
        })
        .map(|(scope, index)| FunctionRef { scope, index })
    }

    fn write_scope(&self, f: &mut fmt::Formatter<'_>, id: ScopeId, depth: usize) -> fmt::Result {
        for statement in &self.scope(id).statements {
            self.write_statement(f, statement, depth)?;
        }
        Ok(())
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, id: ScopeId, depth: usize) -> fmt::Result {
        writeln!(f, "{{")?;
        self.write_scope(f, id, depth + 1)?;
        write!(f, "{:indent$}}}", "", indent = depth * 4)
    }

    fn write_statement(
        &self,
        f: &mut fmt::Formatter<'_>,
        statement: &Statement,
        depth: usize,
    ) -> fmt::Result {
        write!(f, "{:indent$}", "", indent = depth * 4)?;
        match statement {
            Statement::Assignment {
                target,
                expression,
                is_initial,
                ..
            } => {
                if *is_initial {
                    match &target.identifier().ty {
                        Some(ElementType::Array { element, .. }) => write!(f, "{element} ")?,
                        Some(ty) => write!(f, "{ty} ")?,
                        None => f.write_str("var ")?,
                    }
                }
                match target {
                    Target::Identifier(identifier) => write!(f, "{}", identifier.name)?,
                    Target::ArrayAccessor(accessor) => write_accessor(f, accessor)?,
                }
                writeln!(f, " = {expression};")
            }
            Statement::If {
                condition,
                body,
                else_body,
                ..
            } => {
                write!(f, "if {condition} ")?;
                self.write_block(f, *body, depth)?;
                if let Some(else_body) = else_body {
                    f.write_str(" else ")?;
                    self.write_block(f, *else_body, depth)?;
                }
                writeln!(f)
            }
            Statement::While {
                condition, body, ..
            } => {
                write!(f, "while {condition} ")?;
                self.write_block(f, *body, depth)?;
                writeln!(f)
            }
            Statement::Body(scope) => {
                self.write_block(f, *scope, depth)?;
                writeln!(f)
            }
            Statement::Break(_) => writeln!(f, "break;"),
            Statement::Continue(_) => writeln!(f, "continue;"),
            Statement::FunctionDeclaration {
                identifier,
                arguments,
                body,
                return_type,
                ..
            } => {
                write!(f, "fn {}(", identifier.name)?;
                for (i, argument) in self.scope(*arguments).statements.iter().enumerate() {
                    if let Some(parameter) = argument.declared() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        match &parameter.ty {
                            Some(ty) => write!(f, "{ty} {}", parameter.name)?,
                            None => write!(f, "var {}", parameter.name)?,
                        }
                    }
                }
                f.write_str(") ")?;
                if let Some(ty) = return_type {
                    write!(f, "-> {ty} ")?;
                }
                self.write_block(f, *body, depth)?;
                writeln!(f)
            }
            Statement::ArgumentDefinition { identifier } => {
                writeln!(f, "// argument {}", identifier.name)
            }
            Statement::Return { expression, .. } => writeln!(f, "return {expression};"),
            Statement::Expression(expression) => writeln!(f, "{expression};"),
        }
    }
}

fn write_accessor(f: &mut fmt::Formatter<'_>, accessor: &ArrayAccessor) -> fmt::Result {
    write!(f, "{}[{}]", accessor.identifier.name, accessor.index)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(identifier) => f.write_str(&identifier.name),
            Expression::Number { value, .. } => write!(f, "{value}"),
            Expression::BinaryOperation(operation) => write!(
                f,
                "({} {} {})",
                operation.left, operation.operator, operation.right
            ),
            Expression::ArrayAccessor(accessor) => write_accessor(f, accessor),
            Expression::TypeInitialization { ty, .. } => match ty {
                ElementType::Array { element, size } => write!(f, "new {element}[{size}]"),
                scalar => write!(f, "new {scalar}"),
            },
            Expression::FunctionCall(call) => {
                write!(f, "{}(", call.identifier.name)?;
                for (i, argument) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Pretty-prints the tree as normalised FAIL source.
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_scope(f, ScopeId::ROOT, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(name: &str, value: u32) -> Statement {
        Statement::Assignment {
            target: Target::Identifier(Identifier::new(name, Span::default())),
            expression: Expression::Number {
                value,
                span: Span::default(),
            },
            is_initial: true,
            span: Span::default(),
        }
    }

    #[test]
    fn search_prefers_local_declarations() {
        let mut ast = Ast::new();
        ast.scope_mut(ScopeId::ROOT)
            .statements
            .push(declaration("x", 1));
        let inner = ast.add_scope(vec![ScopeId::ROOT]);
        ast.scope_mut(inner).statements.push(declaration("x", 2));

        let (found, _) = ast.declaration(inner, "x").expect("inner x");
        assert_eq!(found, inner);
        let (found, _) = ast.declaration(ScopeId::ROOT, "x").expect("outer x");
        assert_eq!(found, ScopeId::ROOT);
    }

    #[test]
    fn search_walks_shared_scopes_depth_first() {
        let mut ast = Ast::new();
        ast.scope_mut(ScopeId::ROOT)
            .statements
            .push(declaration("outer", 1));
        let middle = ast.add_scope(vec![ScopeId::ROOT]);
        let inner = ast.add_scope(vec![middle]);

        let (found, identifier) = ast.declaration(inner, "outer").expect("visible");
        assert_eq!(found, ScopeId::ROOT);
        assert_eq!(identifier.name, "outer");
        assert!(ast.declaration(ScopeId::ROOT, "missing").is_none());
    }

    #[test]
    fn outer_scopes_cannot_see_inner_declarations() {
        let mut ast = Ast::new();
        let inner = ast.add_scope(vec![ScopeId::ROOT]);
        ast.scope_mut(inner).statements.push(declaration("hidden", 1));
        assert!(ast.declaration(ScopeId::ROOT, "hidden").is_none());
    }
}
