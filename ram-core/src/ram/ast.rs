//! Parsed RAM programs.

use std::fmt;

use crate::span::Span;

/// The ten mnemonics understood by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Load,
    Store,
    Add,
    Sub,
    Mul,
    Div,
    Goto,
    JZero,
    JNotZero,
    End,
}

impl OpCode {
    pub const ALL: [OpCode; 10] = [
        OpCode::Load,
        OpCode::Store,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Goto,
        OpCode::JZero,
        OpCode::JNotZero,
        OpCode::End,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Goto => "GOTO",
            OpCode::JZero => "JZERO",
            OpCode::JNotZero => "JNZERO",
            OpCode::End => "END",
        }
    }

    /// Case-insensitive lookup of a mnemonic.
    pub fn from_mnemonic(text: &str) -> Option<OpCode> {
        OpCode::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
    }

    pub fn is_jump(self) -> bool {
        matches!(self, OpCode::Goto | OpCode::JZero | OpCode::JNotZero)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A label declaration: `NAME:` marks the instruction that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub instruction_address: u32,
    pub span: Span,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.name, self.instruction_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    /// `#n`
    Immediate(u32),
    /// `n`
    Address(u32),
    /// `*n`
    AddressPointer(u32),
    /// A jump target; `label` is filled in by the label resolver.
    LabelReference { name: String, label: Option<Label> },
}

impl ArgumentValue {
    /// Register index named directly by this operand, if any.
    pub fn register(&self) -> Option<u32> {
        match self {
            ArgumentValue::Address(index) | ArgumentValue::AddressPointer(index) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Immediate(value) => write!(f, "#{value}"),
            ArgumentValue::Address(index) => write!(f, "{index}"),
            ArgumentValue::AddressPointer(index) => write!(f, "*{index}"),
            ArgumentValue::LabelReference { name, .. } => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub value: ArgumentValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub argument: Option<Argument>,
    pub span: Span,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(argument) => write!(f, "{} {}", self.opcode, argument.value),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// A parsed program: instructions in memory order plus the label table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub instructions: Vec<Instruction>,
    pub labels: Vec<Label>,
}

impl Scope {
    /// First label declared under `name`.
    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.name == name)
    }
}
