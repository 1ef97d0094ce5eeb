//! Data model: objects, strings, expressions and pattern bindings

pub mod bindings;
pub mod expr;
pub mod object;
pub mod ordering;
pub mod string;
pub mod write;

use std::fmt;

pub use bindings::Bindings;
pub use expr::Expr;
pub use object::{same_type, CustomObject, Magic, Object, ObjectType, TypeMask};
pub use string::PString;

/// A constructor could not reserve memory for `requested` items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    pub requested: usize,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation of {} items failed", self.requested)
    }
}

impl std::error::Error for AllocError {}
