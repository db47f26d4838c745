//! Register reservations for the emitter.
//!
//! Variables are keyed by their binding (`name@scope`), array elements by
//! `name@scope[i]`. A fresh register is always one above the highest one in
//! use, so array slots stay contiguous and allocation only depends on the
//! order of reservations.

use std::collections::BTreeMap;

use crate::fail::ast::ScopeId;
use crate::vm::MAX_REGISTERS;

/// A binding made while emitting, kept for hosts that show variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: ScopeId,
    /// First register of the binding.
    pub register: u32,
    /// Registers occupied: 1 for scalars, the size for arrays.
    pub width: u32,
}

#[derive(Debug, Default)]
pub(crate) struct Registers {
    reserved: BTreeMap<String, u32>,
    temporaries: Vec<u32>,
    symbols: Vec<Symbol>,
    highest: u32,
}

impl Registers {
    pub fn get(&self, name: &str, scope: ScopeId) -> Option<u32> {
        self.reserved.get(&key(name, scope)).copied()
    }

    pub fn get_or_reserve(&mut self, name: &str, scope: ScopeId) -> u32 {
        if let Some(register) = self.get(name, scope) {
            return register;
        }
        let register = self.next_free();
        self.claim(key(name, scope), register);
        self.symbols.push(Symbol {
            name: name.to_string(),
            scope,
            register,
            width: 1,
        });
        register
    }

    /// Reserve `size` contiguous registers and return the first, or `None`
    /// when they would run past [`MAX_REGISTERS`].
    pub fn reserve_array(&mut self, name: &str, scope: ScopeId, size: u32) -> Option<u32> {
        let base = self.next_free();
        let last = base.checked_add(size)?.checked_sub(1)?;
        if size == 0 || last > MAX_REGISTERS {
            return None;
        }
        for i in 0..size {
            self.claim(element_key(name, scope, i), base + i);
        }
        self.symbols.push(Symbol {
            name: name.to_string(),
            scope,
            register: base,
            width: size,
        });
        Some(base)
    }

    pub fn array_base(&self, name: &str, scope: ScopeId) -> Option<u32> {
        self.reserved.get(&element_key(name, scope, 0)).copied()
    }

    pub fn release(&mut self, name: &str, scope: ScopeId) {
        self.reserved.remove(&key(name, scope));
    }

    pub fn release_array(&mut self, name: &str, scope: ScopeId, size: u32) {
        for i in 0..size {
            self.reserved.remove(&element_key(name, scope, i));
        }
    }

    /// Scratch register for an intermediate result.
    pub fn temporary(&mut self) -> u32 {
        let register = self.next_free();
        self.temporaries.push(register);
        self.highest = self.highest.max(register);
        register
    }

    pub fn free_temporary(&mut self, register: u32) {
        if let Some(position) = self.temporaries.iter().rposition(|&r| r == register) {
            self.temporaries.remove(position);
        }
    }

    /// Highest general register ever handed out.
    pub fn highest(&self) -> u32 {
        self.highest
    }

    pub fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }

    fn next_free(&self) -> u32 {
        self.reserved
            .values()
            .chain(&self.temporaries)
            .max()
            .map_or(1, |register| register + 1)
    }

    fn claim(&mut self, key: String, register: u32) {
        self.reserved.insert(key, register);
        self.highest = self.highest.max(register);
    }
}

fn key(name: &str, scope: ScopeId) -> String {
    format!("{name}@{scope}")
}

fn element_key(name: &str, scope: ScopeId, index: u32) -> String {
    format!("{name}@{scope}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_from_one_upwards() {
        let mut registers = Registers::default();
        assert_eq!(registers.get_or_reserve("x", ScopeId::ROOT), 1);
        assert_eq!(registers.get_or_reserve("y", ScopeId::ROOT), 2);
        assert_eq!(registers.get_or_reserve("x", ScopeId::ROOT), 1);
        assert_eq!(registers.highest(), 2);
    }

    #[test]
    fn same_name_in_other_scope_is_another_binding() {
        let mut registers = Registers::default();
        let outer = registers.get_or_reserve("x", ScopeId::ROOT);
        let inner = registers.get_or_reserve("x", ScopeId(3));
        assert_ne!(outer, inner);
    }

    #[test]
    fn released_registers_are_reused() {
        let mut registers = Registers::default();
        registers.get_or_reserve("x", ScopeId::ROOT);
        registers.get_or_reserve("t", ScopeId(1));
        registers.release("t", ScopeId(1));
        assert_eq!(registers.get_or_reserve("u", ScopeId(2)), 2);
        assert_eq!(registers.highest(), 2);
    }

    #[test]
    fn arrays_are_contiguous_above_live_registers() {
        let mut registers = Registers::default();
        registers.get_or_reserve("x", ScopeId::ROOT);
        let base = registers.reserve_array("a", ScopeId::ROOT, 3).expect("fits");
        assert_eq!(base, 2);
        assert_eq!(registers.array_base("a", ScopeId::ROOT), Some(2));
        assert_eq!(registers.get_or_reserve("y", ScopeId::ROOT), 5);
        registers.release_array("a", ScopeId::ROOT, 3);
        assert_eq!(registers.array_base("a", ScopeId::ROOT), None);
    }

    #[test]
    fn arrays_past_the_last_register_are_refused() {
        let mut registers = Registers::default();
        registers.get_or_reserve("k", ScopeId::ROOT);
        assert_eq!(registers.reserve_array("a", ScopeId::ROOT, u32::MAX), None);
        assert_eq!(registers.reserve_array("b", ScopeId::ROOT, MAX_REGISTERS), None);
        assert_eq!(registers.array_base("b", ScopeId::ROOT), None);
        assert_eq!(
            registers.reserve_array("c", ScopeId::ROOT, MAX_REGISTERS - 1),
            Some(2)
        );
    }

    #[test]
    fn temporaries_never_overlap_live_values() {
        let mut registers = Registers::default();
        registers.get_or_reserve("x", ScopeId::ROOT);
        let first = registers.temporary();
        let second = registers.temporary();
        assert_eq!((first, second), (2, 3));
        assert_eq!(registers.get_or_reserve("p", ScopeId(1)), 4);
        registers.free_temporary(second);
        registers.free_temporary(first);
        registers.release("p", ScopeId(1));
        assert_eq!(registers.temporary(), 2);
        assert_eq!(registers.highest(), 4);
    }

    #[test]
    fn symbols_record_every_binding() {
        let mut registers = Registers::default();
        registers.get_or_reserve("x", ScopeId::ROOT);
        registers.reserve_array("a", ScopeId(2), 4).expect("fits");
        registers.release("x", ScopeId::ROOT);
        let symbols = registers.into_symbols();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].width, 4);
        assert_eq!(symbols[1].register, 2);
    }
}
