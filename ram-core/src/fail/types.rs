//! Types of FAIL values.
//!
//! The type system is shallow: scalars are plain registers, arrays are
//! runs of contiguous registers. Types are tracked so the emitter knows how
//! many registers a declaration needs and so conditions can be checked.

use std::fmt;

use crate::fail::operators::{BinaryOperator, Keyword};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Int,
    Bool,
    /// Fixed-size array of `size` elements.
    Array {
        element: Box<ElementType>,
        size: u32,
    },
}

impl ElementType {
    /// Scalar type named by a keyword, `None` for `var` and non-type keywords.
    pub fn from_keyword(keyword: Keyword) -> Option<ElementType> {
        match keyword {
            Keyword::Int => Some(ElementType::Int),
            Keyword::Bool => Some(ElementType::Bool),
            _ => None,
        }
    }

    pub fn array(element: ElementType, size: u32) -> ElementType {
        ElementType::Array {
            element: Box::new(element),
            size,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ElementType::Array { .. })
    }

    /// Number of registers a value of this type occupies.
    pub fn width(&self) -> u32 {
        match self {
            ElementType::Array { size, .. } => *size,
            _ => 1,
        }
    }

    /// Element type for arrays, the type itself for scalars.
    pub fn element(&self) -> &ElementType {
        match self {
            ElementType::Array { element, .. } => element,
            scalar => scalar,
        }
    }

    /// Result type of a binary operation.
    pub fn of_operation(operator: BinaryOperator) -> ElementType {
        if operator.is_comparison() {
            ElementType::Bool
        } else {
            ElementType::Int
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int => f.write_str("int"),
            ElementType::Bool => f.write_str("bool"),
            ElementType::Array { element, size } => write!(f, "{element}[{size}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_are_as_wide_as_their_size() {
        let ty = ElementType::array(ElementType::Int, 4);
        assert_eq!(ty.width(), 4);
        assert_eq!(ty.element(), &ElementType::Int);
        assert_eq!(ty.to_string(), "int[4]");
        assert_eq!(ElementType::Bool.width(), 1);
    }

    #[test]
    fn comparisons_produce_bool() {
        assert_eq!(
            ElementType::of_operation(BinaryOperator::LessThan),
            ElementType::Bool
        );
        assert_eq!(
            ElementType::of_operation(BinaryOperator::Multiply),
            ElementType::Int
        );
    }
}
