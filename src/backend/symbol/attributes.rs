//! Symbol attributes

use bitflags::bitflags;

bitflags! {
    /// Evaluation-affecting properties of a symbol
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        /// Do not evaluate the first argument
        const HOLD_FIRST        = 1 << 0;
        /// Do not evaluate arguments after the first
        const HOLD_REST         = 1 << 1;
        const HOLD_ALL          = Self::HOLD_FIRST.bits() | Self::HOLD_REST.bits();
        /// Hold arguments, ignore `Evaluate`, keep `Sequence` and skip up-rules
        const HOLD_ALL_COMPLETE = 1 << 2;
        /// Associative: nested calls are flattened
        const FLAT              = 1 << 3;
        /// Commutative: arguments are sorted
        const ORDERLESS         = 1 << 4;
        const ONE_IDENTITY      = 1 << 5;
        /// Thread over `List` arguments
        const LISTABLE          = 1 << 6;
        /// Definitions and attributes may not be changed
        const PROTECTED         = 1 << 7;
        const TEMPORARY         = 1 << 8;
        /// Values live in the evaluating thread context, not the symbol
        const THREAD_LOCAL      = 1 << 9;
        const NUMERIC_FUNCTION  = 1 << 10;
        /// `Sequence(...)` arguments are not spliced
        const SEQUENCE_HOLD     = 1 << 11;
    }
}

impl Attributes {
    /// Whether the argument at 1-based `position` is held
    #[inline]
    pub fn holds(self, position: usize) -> bool {
        if self.contains(Attributes::HOLD_ALL_COMPLETE) {
            return true;
        }
        if position == 1 {
            self.contains(Attributes::HOLD_FIRST)
        } else {
            self.contains(Attributes::HOLD_REST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_positions() {
        assert!(Attributes::HOLD_FIRST.holds(1));
        assert!(!Attributes::HOLD_FIRST.holds(2));
        assert!(Attributes::HOLD_REST.holds(3));
        assert!(!Attributes::HOLD_REST.holds(1));
        assert!(Attributes::HOLD_ALL.holds(1) && Attributes::HOLD_ALL.holds(2));
        assert!(Attributes::HOLD_ALL_COMPLETE.holds(7));
        assert!(!Attributes::empty().holds(1));
    }
}
