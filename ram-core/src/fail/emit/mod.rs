//! Lowers a FAIL tree to RAM assembly text.
//!
//! Every expression leaves its value in the accumulator. Comparisons have
//! no opcode of their own and are built from `SUB` and the zero tests,
//! producing 1 or 0. Function calls are inlined at the call site.

mod registers;

use std::fmt;

use crate::fail::ast::{
    ArrayAccessor, Ast, BinaryOperation, Expression, FunctionCall, FunctionRef, ScopeId,
    Statement, Target,
};
use crate::fail::error::{ErrorCode, FailError};
use crate::fail::operators::BinaryOperator;
use crate::fail::types::ElementType;
use crate::ram::ast::OpCode;

pub use registers::Symbol;
use registers::Registers;

/// Result of [`emit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub assembly: String,
    pub symbols: Vec<Symbol>,
    /// Highest general register the program touches.
    pub register_count: u32,
}

impl Emission {
    /// Register of the first binding named `name`.
    pub fn register_of(&self, name: &str) -> Option<u32> {
        self.symbols
            .iter()
            .find(|symbol| symbol.name == name)
            .map(|symbol| symbol.register)
    }
}

/// Emit RAM assembly for a resolved and type-checked tree.
pub fn emit(ast: &Ast) -> Result<Emission, FailError> {
    let mut emitter = Emitter {
        ast,
        lines: Vec::new(),
        registers: Registers::default(),
        next_label: 0,
        inlining: Vec::new(),
    };
    emitter.emit_scope(ScopeId::ROOT, &Context::default(), true)?;

    let mut assembly = emitter.lines.join("\n");
    assembly.push('\n');
    let register_count = emitter.registers.highest();
    tracing::debug!(
        lines = emitter.lines.len(),
        registers = register_count,
        labels = emitter.next_label,
        "emitted RAM assembly"
    );
    Ok(Emission {
        assembly,
        symbols: emitter.registers.into_symbols(),
        register_count,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Immediate(u32),
    Register(u32),
    Pointer(u32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(value) => write!(f, "#{value}"),
            Operand::Register(register) => write!(f, "{register}"),
            Operand::Pointer(register) => write!(f, "*{register}"),
        }
    }
}

/// Jump targets visible to the statement being emitted.
#[derive(Debug, Clone, Default)]
struct Context {
    /// `(start, end)` of the innermost loop.
    loop_labels: Option<(String, String)>,
    /// Where `return` jumps inside an inlined body.
    return_label: Option<String>,
}

struct Emitter<'a> {
    ast: &'a Ast,
    lines: Vec<String>,
    registers: Registers,
    next_label: usize,
    /// Functions currently being inlined, outermost first.
    inlining: Vec<FunctionRef>,
}

impl<'a> Emitter<'a> {
    fn emit_scope(&mut self, scope: ScopeId, context: &Context, top_level: bool) -> Result<(), FailError> {
        let ast = self.ast;
        let statements = &ast.scope(scope).statements;
        for statement in statements {
            if matches!(
                statement,
                Statement::FunctionDeclaration { .. } | Statement::ArgumentDefinition { .. }
            ) {
                continue;
            }
            self.comment(&describe(statement));
            self.emit_statement(scope, statement, context)?;
        }
        if top_level {
            self.lines.push(OpCode::End.mnemonic().to_string());
        }

        for identifier in statements.iter().filter_map(Statement::declared) {
            match &identifier.ty {
                Some(ElementType::Array { size, .. }) => {
                    self.registers.release_array(&identifier.name, scope, *size)
                }
                _ => self.registers.release(&identifier.name, scope),
            }
        }
        Ok(())
    }

    fn emit_statement(
        &mut self,
        scope: ScopeId,
        statement: &Statement,
        context: &Context,
    ) -> Result<(), FailError> {
        match statement {
            Statement::Assignment {
                target: Target::Identifier(identifier),
                expression: Expression::TypeInitialization { ty, .. },
                is_initial: true,
                ..
            } => {
                let base = self
                    .registers
                    .reserve_array(&identifier.name, scope, ty.width())
                    .ok_or_else(|| {
                        FailError::new(
                            ErrorCode::NumberOutOfRange,
                            format!(
                                "array `{}` of {} elements does not fit in the registers left",
                                identifier.name,
                                ty.width()
                            ),
                            identifier.span,
                        )
                    })?;
                self.op(OpCode::Load, Operand::Immediate(0));
                for offset in 0..ty.width() {
                    self.op(OpCode::Store, Operand::Register(base + offset));
                }
            }
            Statement::Assignment {
                target: Target::Identifier(identifier),
                expression,
                ..
            } => {
                self.emit_expression(expression, context)?;
                let binding = identifier.binding.unwrap_or(scope);
                let register = self.registers.get_or_reserve(&identifier.name, binding);
                self.op(OpCode::Store, Operand::Register(register));
            }
            Statement::Assignment {
                target: Target::ArrayAccessor(accessor),
                expression,
                ..
            } => {
                let address = self.element_address(accessor, context)?;
                self.emit_expression(expression, context)?;
                self.op(OpCode::Store, Operand::Pointer(address));
                self.registers.free_temporary(address);
            }
            Statement::If {
                condition,
                body,
                else_body,
                ..
            } => {
                self.emit_expression(condition, context)?;
                let end = self.fresh_label("IF_END");
                match else_body {
                    Some(else_body) => {
                        let otherwise = self.fresh_label("IF_ELSE");
                        self.jump(OpCode::JZero, &otherwise);
                        self.emit_scope(*body, context, false)?;
                        self.jump(OpCode::Goto, &end);
                        self.label(&otherwise);
                        self.emit_scope(*else_body, context, false)?;
                    }
                    None => {
                        self.jump(OpCode::JZero, &end);
                        self.emit_scope(*body, context, false)?;
                    }
                }
                self.label(&end);
            }
            Statement::While {
                condition, body, ..
            } => {
                let start = self.fresh_label("WHILE_START");
                let end = self.fresh_label("WHILE_END");
                self.label(&start);
                self.emit_expression(condition, context)?;
                self.jump(OpCode::JZero, &end);
                let inner = Context {
                    loop_labels: Some((start.clone(), end.clone())),
                    ..context.clone()
                };
                self.emit_scope(*body, &inner, false)?;
                self.jump(OpCode::Goto, &start);
                self.label(&end);
            }
            Statement::Body(body) => self.emit_scope(*body, context, false)?,
            Statement::Break(_) => {
                if let Some((_, end)) = &context.loop_labels {
                    self.jump(OpCode::Goto, end);
                }
            }
            Statement::Continue(_) => {
                if let Some((start, _)) = &context.loop_labels {
                    self.jump(OpCode::Goto, start);
                }
            }
            Statement::Return { expression, .. } => {
                self.emit_expression(expression, context)?;
                if let Some(label) = &context.return_label {
                    self.jump(OpCode::Goto, label);
                }
            }
            Statement::Expression(expression) => self.emit_expression(expression, context)?,
            Statement::FunctionDeclaration { .. } | Statement::ArgumentDefinition { .. } => {}
        }
        Ok(())
    }

    /// Evaluate `expression` into the accumulator.
    fn emit_expression(&mut self, expression: &Expression, context: &Context) -> Result<(), FailError> {
        match expression {
            Expression::Number { value, .. } => self.op(OpCode::Load, Operand::Immediate(*value)),
            Expression::Identifier(identifier) => {
                let register = self.variable(&identifier.name, identifier.binding);
                self.op(OpCode::Load, Operand::Register(register));
            }
            Expression::ArrayAccessor(accessor) => {
                let address = self.element_address(accessor, context)?;
                self.op(OpCode::Load, Operand::Pointer(address));
                self.registers.free_temporary(address);
            }
            Expression::BinaryOperation(operation) => self.emit_operation(operation, context)?,
            Expression::FunctionCall(call) => self.emit_call(call, context)?,
            Expression::TypeInitialization { span, .. } => {
                return Err(FailError::new(
                    ErrorCode::InvalidExpression,
                    "array initialization outside of a declaration",
                    *span,
                ));
            }
        }
        Ok(())
    }

    /// Leave the register number of an array element in a temporary and
    /// return that temporary. The caller frees it.
    fn element_address(&mut self, accessor: &ArrayAccessor, context: &Context) -> Result<u32, FailError> {
        let identifier = &accessor.identifier;
        let base = identifier
            .binding
            .and_then(|binding| self.registers.array_base(&identifier.name, binding))
            .ok_or_else(|| {
                FailError::new(
                    ErrorCode::UnknownIdentifier,
                    format!("array `{}` has no registers at this point", identifier.name),
                    identifier.span,
                )
            })?;
        self.emit_expression(&accessor.index, context)?;
        self.op(OpCode::Add, Operand::Immediate(base));
        let address = self.registers.temporary();
        self.op(OpCode::Store, Operand::Register(address));
        Ok(address)
    }

    /// Operand form of an expression that needs no code of its own.
    fn simple(&mut self, expression: &Expression) -> Option<Operand> {
        match expression {
            Expression::Number { value, .. } => Some(Operand::Immediate(*value)),
            Expression::Identifier(identifier) => Some(Operand::Register(
                self.variable(&identifier.name, identifier.binding),
            )),
            _ => None,
        }
    }

    fn emit_operation(&mut self, operation: &BinaryOperation, context: &Context) -> Result<(), FailError> {
        if let Some(right) = self.simple(&operation.right) {
            let (left, spilled) = match self.simple(&operation.left) {
                Some(left) => {
                    self.op(OpCode::Load, left);
                    (left, None)
                }
                None => {
                    self.emit_expression(&operation.left, context)?;
                    let spill = self.registers.temporary();
                    self.op(OpCode::Store, Operand::Register(spill));
                    (Operand::Register(spill), Some(spill))
                }
            };
            self.apply(operation.operator, left, right);
            if let Some(spill) = spilled {
                self.registers.free_temporary(spill);
            }
            return Ok(());
        }

        self.emit_expression(&operation.left, context)?;
        let left = self.registers.temporary();
        self.op(OpCode::Store, Operand::Register(left));
        self.emit_expression(&operation.right, context)?;
        let right = self.registers.temporary();
        self.op(OpCode::Store, Operand::Register(right));
        self.op(OpCode::Load, Operand::Register(left));
        self.apply(
            operation.operator,
            Operand::Register(left),
            Operand::Register(right),
        );
        self.registers.free_temporary(right);
        self.registers.free_temporary(left);
        Ok(())
    }

    /// Apply `operator` with the accumulator holding `left`.
    fn apply(&mut self, operator: BinaryOperator, left: Operand, right: Operand) {
        match operator {
            BinaryOperator::Add => self.op(OpCode::Add, right),
            BinaryOperator::Subtract => self.op(OpCode::Sub, right),
            BinaryOperator::Multiply => self.op(OpCode::Mul, right),
            BinaryOperator::Divide => self.op(OpCode::Div, right),
            BinaryOperator::Equal => self.equal(left, right),
            BinaryOperator::NotEqual => {
                self.equal(left, right);
                self.negate();
            }
            BinaryOperator::GreaterThan => self.greater_than(right),
            BinaryOperator::LessThan => self.less_than(left, right),
            BinaryOperator::GreaterThanOrEqual => {
                self.less_than(left, right);
                self.negate();
            }
            BinaryOperator::LessThanOrEqual => {
                self.greater_than(right);
                self.negate();
            }
        }
    }

    /// `L - R` is non-zero exactly when `L > R`, since `SUB` clamps at zero.
    fn greater_than(&mut self, right: Operand) {
        let end = self.fresh_label("GT_END");
        self.op(OpCode::Sub, right);
        self.jump(OpCode::JZero, &end);
        self.op(OpCode::Load, Operand::Immediate(1));
        self.label(&end);
    }

    /// Both `L - R` and `R - L` must be zero.
    fn equal(&mut self, left: Operand, right: Operand) {
        let failed = self.fresh_label("EQ_FAILED");
        let end = self.fresh_label("EQ_END");
        self.op(OpCode::Sub, right);
        self.jump(OpCode::JNotZero, &failed);
        self.op(OpCode::Load, right);
        self.op(OpCode::Sub, left);
        self.jump(OpCode::JNotZero, &failed);
        self.op(OpCode::Load, Operand::Immediate(1));
        self.jump(OpCode::Goto, &end);
        self.label(&failed);
        self.op(OpCode::Load, Operand::Immediate(0));
        self.label(&end);
    }

    /// `R > L` and not `L == R`.
    fn less_than(&mut self, left: Operand, right: Operand) {
        let failed = self.fresh_label("LT_FAILED");
        let end = self.fresh_label("LT_END");
        self.op(OpCode::Load, right);
        self.op(OpCode::Sub, left);
        self.jump(OpCode::JZero, &failed);
        self.op(OpCode::Load, left);
        self.equal(left, right);
        self.jump(OpCode::JNotZero, &failed);
        self.op(OpCode::Load, Operand::Immediate(1));
        self.jump(OpCode::Goto, &end);
        self.label(&failed);
        self.op(OpCode::Load, Operand::Immediate(0));
        self.label(&end);
    }

    /// Turn a 0/1 accumulator into 1/0.
    fn negate(&mut self) {
        let truthy = self.fresh_label("NOT_TRUE");
        let end = self.fresh_label("NOT_END");
        self.jump(OpCode::JNotZero, &truthy);
        self.op(OpCode::Load, Operand::Immediate(1));
        self.jump(OpCode::Goto, &end);
        self.label(&truthy);
        self.op(OpCode::Load, Operand::Immediate(0));
        self.label(&end);
    }

    /// Inline the callee: arguments go to its parameter registers, then its
    /// body runs up to a return label placed after it.
    fn emit_call(&mut self, call: &FunctionCall, context: &Context) -> Result<(), FailError> {
        let ast = self.ast;
        let name = &call.identifier.name;
        let reference = call.resolved.ok_or_else(|| {
            FailError::new(
                ErrorCode::FunctionNotFound,
                format!("call to `{name}` was never resolved"),
                call.identifier.span,
            )
        })?;
        if self.inlining.contains(&reference) {
            return Err(FailError::new(
                ErrorCode::RecursiveCall,
                format!("`{name}` calls itself and cannot be inlined"),
                call.span,
            ));
        }
        let Some(Statement::FunctionDeclaration {
            arguments, body, ..
        }) = ast.statement(reference)
        else {
            return Err(FailError::new(
                ErrorCode::FunctionNotFound,
                format!("`{name}` is not a function"),
                call.identifier.span,
            ));
        };
        let (arguments, body) = (*arguments, *body);
        let parameters: Vec<&str> = ast
            .scope(arguments)
            .statements
            .iter()
            .filter_map(Statement::declared)
            .map(|identifier| identifier.name.as_str())
            .collect();

        if call.arguments.iter().any(Expression::contains_call) {
            // A nested call could reuse the parameter registers, so every
            // value is staged first.
            let mut staged = Vec::with_capacity(call.arguments.len());
            for argument in &call.arguments {
                self.emit_expression(argument, context)?;
                let temporary = self.registers.temporary();
                self.op(OpCode::Store, Operand::Register(temporary));
                staged.push(temporary);
            }
            for (parameter, temporary) in parameters.iter().zip(&staged) {
                let register = self.registers.get_or_reserve(parameter, arguments);
                self.op(OpCode::Load, Operand::Register(*temporary));
                self.op(OpCode::Store, Operand::Register(register));
            }
            for temporary in staged.into_iter().rev() {
                self.registers.free_temporary(temporary);
            }
        } else {
            for (parameter, argument) in parameters.iter().zip(&call.arguments) {
                self.emit_expression(argument, context)?;
                let register = self.registers.get_or_reserve(parameter, arguments);
                self.op(OpCode::Store, Operand::Register(register));
            }
        }

        let return_label = self.fresh_label("RETURN");
        let inner = Context {
            loop_labels: None,
            return_label: Some(return_label.clone()),
        };
        self.comment(&format!("inline {name}"));
        self.inlining.push(reference);
        self.emit_scope(body, &inner, false)?;
        self.inlining.pop();
        self.label(&return_label);

        for parameter in parameters {
            self.registers.release(parameter, arguments);
        }
        Ok(())
    }

    fn variable(&mut self, name: &str, binding: Option<ScopeId>) -> u32 {
        self.registers
            .get_or_reserve(name, binding.unwrap_or(ScopeId::ROOT))
    }

    fn fresh_label(&mut self, purpose: &str) -> String {
        let label = format!("{purpose}_{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn op(&mut self, opcode: OpCode, operand: Operand) {
        self.lines.push(format!("{} {operand}", opcode.mnemonic()));
    }

    fn jump(&mut self, opcode: OpCode, label: &str) {
        self.lines.push(format!("{} {label}", opcode.mnemonic()));
    }

    fn label(&mut self, label: &str) {
        self.lines.push(format!("{label}:"));
    }

    fn comment(&mut self, text: &str) {
        self.lines.push(format!("// {text}"));
    }
}

/// One-line summary of a statement for the `//` comment above its code.
fn describe(statement: &Statement) -> String {
    match statement {
        Statement::Assignment {
            target,
            expression,
            is_initial,
            ..
        } => {
            let target = match target {
                Target::Identifier(identifier) => identifier.name.clone(),
                Target::ArrayAccessor(accessor) => {
                    format!("{}[{}]", accessor.identifier.name, accessor.index)
                }
            };
            if *is_initial {
                format!("declare {target} = {expression}")
            } else {
                format!("{target} = {expression}")
            }
        }
        Statement::If { condition, .. } => format!("if {condition}"),
        Statement::While { condition, .. } => format!("while {condition}"),
        Statement::Body(_) => "block".to_string(),
        Statement::Break(_) => "break".to_string(),
        Statement::Continue(_) => "continue".to_string(),
        Statement::Return { expression, .. } => format!("return {expression}"),
        Statement::Expression(expression) => format!("{expression}"),
        Statement::FunctionDeclaration { identifier, .. } => format!("fn {}", identifier.name),
        Statement::ArgumentDefinition { identifier } => format!("argument {}", identifier.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;

    fn emitted(source: &str) -> Emission {
        compiler::compile(source).expect("compile").emission
    }

    #[test]
    fn emits_declarations_with_comments() {
        let emission = emitted("int x = 5;\nint y = x;");
        assert_eq!(
            emission.assembly,
            "// declare x = 5\nLOAD #5\nSTORE 1\n// declare y = x\nLOAD 1\nSTORE 2\nEND\n"
        );
        assert_eq!(emission.register_count, 2);
        assert_eq!(emission.register_of("y"), Some(2));
    }

    #[test]
    fn loops_jump_back_to_their_condition() {
        let emission = emitted("int x = 3; while (x > 0) { x--; }");
        let lines: Vec<&str> = emission.assembly.lines().collect();
        assert!(lines.contains(&"WHILE_START_0:"));
        assert!(lines.contains(&"JZERO WHILE_END_1"));
        assert!(lines.contains(&"GOTO WHILE_START_0"));
        assert_eq!(lines.last(), Some(&"END"));
    }

    #[test]
    fn emission_is_deterministic() {
        let source = "int a = 2; fn sq(int v) -> int { return v * v; }\n\
                      int b = sq(a) + sq(3);\n\
                      if (b >= 13) { b = 1; } else { b = 0; }";
        let ast = compiler::analyze(source).expect("analyze");
        let first = emit(&ast).expect("emit");
        let second = emit(&ast).expect("emit");
        assert_eq!(first, second);
    }

    #[test]
    fn arrays_zero_fill_contiguous_registers() {
        let emission = emitted("int k = 7; int a = new int[3];");
        assert!(
            emission
                .assembly
                .contains("LOAD #0\nSTORE 2\nSTORE 3\nSTORE 4\n")
        );
        let array = emission
            .symbols
            .iter()
            .find(|symbol| symbol.name == "a")
            .expect("array symbol");
        assert_eq!((array.register, array.width), (2, 3));
    }

    #[test]
    fn block_registers_are_released_at_block_end() {
        let emission = emitted("int x = 1; { int t = 2; } int z = 3;");
        assert_eq!(emission.register_of("t"), Some(2));
        assert_eq!(emission.register_of("z"), Some(2));
        assert_eq!(emission.register_count, 2);
    }

    #[test]
    fn temporaries_hold_nested_operands() {
        let emission = emitted("int a = 1; int b = 2; int c = (a + b) * (a - b);");
        assert!(emission.assembly.contains("STORE 3\n"));
        assert!(emission.assembly.contains("STORE 4\n"));
        assert!(emission.assembly.contains("LOAD 3\nMUL 4\n"));
    }

    #[test]
    fn recursion_is_rejected() {
        let ast = compiler::analyze("fn f(int n) -> int { return f(n); }\nint x = f(1);")
            .expect("analyze");
        let err = emit(&ast).unwrap_err();
        assert_eq!(err.code, ErrorCode::RecursiveCall);
        assert_eq!(err.span.line, 1);
    }

    #[test]
    fn uncalled_functions_emit_nothing() {
        let emission = emitted("fn f(int a) -> int { return a; }");
        assert_eq!(emission.assembly, "END\n");
        assert_eq!(emission.register_count, 0);
    }
}
