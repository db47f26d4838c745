use std::fmt;

use crate::error::CoreError;

/// Largest number of general registers a bank may have.
pub const MAX_REGISTERS: u32 = 65_536;

/// One cell of the register bank. Index 0 is the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    pub name: String,
    pub value: u32,
}

impl Register {
    pub fn new(name: impl Into<String>, value: u32) -> Self {
        Register {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Reject general register counts above [`MAX_REGISTERS`].
pub fn check_count(general: u32) -> Result<u32, CoreError> {
    if general > MAX_REGISTERS {
        return Err(CoreError::InvalidRegisterCount(general));
    }
    Ok(general)
}

/// A fresh bank: the accumulator plus `general` zeroed registers.
pub(crate) fn bank(general: u32) -> Vec<Register> {
    std::iter::once(Register::new("Acc", 0))
        .chain((1..=general).map(|index| Register::new(format!("R{index}"), 0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_has_accumulator_and_general_registers() {
        let registers = bank(3);
        let names: Vec<_> = registers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Acc", "R1", "R2", "R3"]);
        assert!(registers.iter().all(|r| r.value == 0));
    }

    #[test]
    fn register_counts_are_capped() {
        assert_eq!(check_count(MAX_REGISTERS).ok(), Some(MAX_REGISTERS));
        assert!(matches!(
            check_count(u32::MAX),
            Err(CoreError::InvalidRegisterCount(u32::MAX))
        ));
    }
}
