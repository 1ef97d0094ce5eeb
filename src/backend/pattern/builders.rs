//! Constructors for pattern syntax
//!
//! Host code and tests build patterns as plain expressions; these helpers
//! save spelling out the kernel symbols each time.

use crate::backend::kernel::SystemSymbols;
use crate::backend::models::Object;
use crate::backend::symbol::Symbol;

impl SystemSymbols {
    /// `_`
    pub fn blank(&self) -> Object {
        Object::call(&self.blank, vec![])
    }

    /// `_h`
    pub fn blank_of(&self, head: &Symbol) -> Object {
        Object::call(&self.blank, vec![Object::from(head)])
    }

    /// `__`
    pub fn blank_sequence(&self) -> Object {
        Object::call(&self.blank_sequence, vec![])
    }

    /// `__h`
    pub fn blank_sequence_of(&self, head: &Symbol) -> Object {
        Object::call(&self.blank_sequence, vec![Object::from(head)])
    }

    /// `___`
    pub fn blank_null_sequence(&self) -> Object {
        Object::call(&self.blank_null_sequence, vec![])
    }

    /// `___h`
    pub fn blank_null_sequence_of(&self, head: &Symbol) -> Object {
        Object::call(&self.blank_null_sequence, vec![Object::from(head)])
    }

    /// `Pattern(name, p)`
    pub fn pattern(&self, name: &Symbol, p: Object) -> Object {
        Object::call(&self.pattern, vec![Object::from(name), p])
    }

    /// `x_`
    pub fn named_blank(&self, name: &Symbol) -> Object {
        self.pattern(name, self.blank())
    }

    /// `x_h`
    pub fn named_blank_of(&self, name: &Symbol, head: &Symbol) -> Object {
        self.pattern(name, self.blank_of(head))
    }

    /// `x__`
    pub fn named_blank_sequence(&self, name: &Symbol) -> Object {
        self.pattern(name, self.blank_sequence())
    }

    /// `x___`
    pub fn named_blank_null_sequence(&self, name: &Symbol) -> Object {
        self.pattern(name, self.blank_null_sequence())
    }

    pub fn condition(&self, p: Object, test: Object) -> Object {
        Object::call(&self.condition, vec![p, test])
    }

    pub fn pattern_test(&self, p: Object, f: Object) -> Object {
        Object::call(&self.pattern_test, vec![p, f])
    }

    pub fn alternatives(&self, alts: Vec<Object>) -> Object {
        Object::call(&self.alternatives, alts)
    }

    pub fn optional(&self, p: Object) -> Object {
        Object::call(&self.optional, vec![p])
    }

    pub fn optional_with(&self, p: Object, default: Object) -> Object {
        Object::call(&self.optional, vec![p, default])
    }

    pub fn repeated(&self, p: Object) -> Object {
        Object::call(&self.repeated, vec![p])
    }

    /// `Repeated(p, {min, max})`; `None` for an unbounded maximum
    pub fn repeated_range(&self, p: Object, min: i64, max: Option<i64>) -> Object {
        let max = max.map_or_else(|| Object::from(&self.infinity), Object::Integer);
        let range = self.list(vec![Object::Integer(min), max]);
        Object::call(&self.repeated, vec![p, range])
    }

    pub fn pattern_sequence(&self, items: Vec<Object>) -> Object {
        Object::call(&self.pattern_sequence, items)
    }

    /// `Except(no)`
    pub fn except(&self, no: Object) -> Object {
        Object::call(&self.except, vec![no])
    }

    /// `Except(no, p)`
    pub fn except_then(&self, no: Object, p: Object) -> Object {
        Object::call(&self.except, vec![no, p])
    }

    pub fn hold_pattern(&self, p: Object) -> Object {
        Object::call(&self.hold_pattern, vec![p])
    }

    pub fn literal(&self, x: Object) -> Object {
        Object::call(&self.literal, vec![x])
    }

    pub fn longest(&self, p: Object) -> Object {
        Object::call(&self.longest, vec![p])
    }

    pub fn shortest(&self, p: Object) -> Object {
        Object::call(&self.shortest, vec![p])
    }

    pub fn list(&self, items: Vec<Object>) -> Object {
        Object::call(&self.list, items)
    }

    pub fn sequence(&self, items: Vec<Object>) -> Object {
        Object::call(&self.sequence, items)
    }

    pub fn hold(&self, x: Object) -> Object {
        Object::call(&self.hold, vec![x])
    }

    /// `lhs -> rhs`
    pub fn rule(&self, lhs: Object, rhs: Object) -> Object {
        Object::call(&self.rule, vec![lhs, rhs])
    }

    /// `lhs :> rhs`
    pub fn rule_delayed(&self, lhs: Object, rhs: Object) -> Object {
        Object::call(&self.rule_delayed, vec![lhs, rhs])
    }
}
