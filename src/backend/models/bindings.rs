//! Pattern-variable bindings
//!
//! The matcher binds and unbinds variables while it backtracks, so bindings
//! form a stack: new bindings are pushed, and a failed branch truncates back
//! to the length it saw on entry. Most rules bind one or two variables, so the
//! structure adapts to size:
//! - Empty: no allocation
//! - Single: inline for 1 binding
//! - Small: SmallVec for 2-8 bindings, spilling to the heap beyond that

use smallvec::SmallVec;

use super::Object;
use crate::backend::symbol::Symbol;

/// Hybrid bindings structure optimized for common cases
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Bindings {
    /// No bindings (zero-cost)
    #[default]
    Empty,
    /// Single binding (inline, no allocation)
    Single((Symbol, Object)),
    /// 2-8 bindings on the stack, more on the heap
    Small(Box<SmallVec<[(Symbol, Object); 8]>>),
}

impl Bindings {
    #[inline]
    pub fn new() -> Self {
        Bindings::Empty
    }

    /// Value bound to `name`, if any
    #[inline]
    pub fn get(&self, name: &Symbol) -> Option<&Object> {
        match self {
            Bindings::Empty => None,
            Bindings::Single((n, v)) => (n == name).then_some(v),
            Bindings::Small(vec) => vec.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        }
    }

    /// Push a binding
    ///
    /// Transitions:
    /// - Empty → Single
    /// - Single → Small (with 2 elements)
    /// - Small → Small (push)
    #[inline]
    pub fn push(&mut self, name: Symbol, value: Object) {
        match self {
            Bindings::Empty => {
                *self = Bindings::Single((name, value));
            }
            Bindings::Single(_) => {
                let Bindings::Single(existing) = std::mem::take(self) else {
                    return;
                };
                let mut vec = SmallVec::new();
                vec.push(existing);
                vec.push((name, value));
                *self = Bindings::Small(Box::new(vec));
            }
            Bindings::Small(vec) => vec.push((name, value)),
        }
    }

    /// Drop bindings pushed after the stack had `len` entries.
    pub fn truncate(&mut self, len: usize) {
        match self {
            Bindings::Empty => {}
            Bindings::Single(_) => {
                if len == 0 {
                    *self = Bindings::Empty;
                }
            }
            Bindings::Small(vec) => {
                vec.truncate(len);
                if vec.is_empty() {
                    *self = Bindings::Empty;
                }
            }
        }
    }

    /// Iterate over all bindings in binding order
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Object)> {
        let slice: &[(Symbol, Object)] = match self {
            Bindings::Empty => &[],
            Bindings::Single(pair) => std::slice::from_ref(pair),
            Bindings::Small(vec) => vec.as_slice(),
        };
        slice.iter().map(|(n, v)| (n, v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Bindings::Empty => 0,
            Bindings::Single(_) => 1,
            Bindings::Small(vec) => vec.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
