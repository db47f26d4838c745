use crate::ram::ast::Scope;
use crate::ram::error::RamError;

/// Validate that every register operand addresses the bank.
///
/// `register_count` is the size of the bank including the accumulator.
/// Only the operand itself is checked; where an `AddressPointer` points at
/// runtime is the interpreter's business.
pub fn check_bounds(scope: &Scope, register_count: u32) -> Result<(), RamError> {
    for argument in scope
        .instructions
        .iter()
        .filter_map(|instruction| instruction.argument.as_ref())
    {
        if let Some(register) = argument.value.register() {
            if register >= register_count {
                return Err(RamError::RegisterOutOfBounds {
                    register,
                    register_count,
                    span: argument.span,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::{parse, tokenize};

    fn scope(source: &str) -> Scope {
        parse(&tokenize(source).expect("tokenize")).expect("parse")
    }

    #[test]
    fn accepts_registers_inside_the_bank() {
        for count in 1..8u32 {
            let source: String = (0..count).map(|r| format!("LOAD {r}\nSTORE *{r}\n")).collect();
            assert!(check_bounds(&scope(&source), count).is_ok(), "count {count}");
        }
    }

    #[test]
    fn rejects_first_register_past_the_bank() {
        for count in 1..8u32 {
            let direct = scope(&format!("LOAD {count}"));
            let pointer = scope(&format!("STORE *{count}"));
            assert!(check_bounds(&direct, count).is_err(), "direct {count}");
            assert!(check_bounds(&pointer, count).is_err(), "pointer {count}");
        }
    }

    #[test]
    fn ignores_immediates_and_labels() {
        let program = scope("LOAD #900\nloop: GOTO loop");
        assert!(check_bounds(&program, 1).is_ok());
    }

    #[test]
    fn names_the_offending_register() {
        let err = check_bounds(&scope("LOAD 1\nADD 9"), 6).unwrap_err();
        match err {
            RamError::RegisterOutOfBounds { register, span, .. } => {
                assert_eq!(register, 9);
                assert_eq!((span.line, span.column), (2, 5));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
