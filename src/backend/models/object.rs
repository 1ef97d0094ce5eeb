//! Tagged object representation
//!
//! Every value the evaluator touches is an [`Object`]. Small values (integers,
//! machine floats and the magic sentinels) are stored inline; everything else
//! is a handle to an atomically reference-counted heap record.
//!
//! # Ownership
//!
//! Ownership follows ordinary Rust move semantics:
//! - functions that consume an object take it by value,
//! - functions that only inspect it take `&Object`,
//! - [`Object::retain`] is a cheap handle copy (atomic increment for heap
//!   records, a bit copy for immediates) and [`Object::release`] drops one.
//!
//! A heap record is destroyed exactly when its last handle is dropped; the
//! destructor, comparator, hasher and writer are selected by the variant tag.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

use super::expr::Expr;
use super::string::PString;
use crate::backend::symbol::Symbol;

/// Sentinel values that need no allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Magic {
    /// The empty result
    Null,
    /// "No value"; used for removed items and missing definitions
    Undefined,
    /// Head of the sequence marker produced by sequence patterns
    PatternSequence,
}

/// Heap objects supplied by collaborators outside the core.
///
/// The evaluator treats custom objects as opaque atoms: they are compared,
/// hashed and written through this trait and never rewritten.
pub trait CustomObject: Send + Sync + fmt::Debug {
    /// Name used when writing and ordering objects of different custom types
    fn type_name(&self) -> &str;

    /// Structural equality with another custom object
    fn equals(&self, other: &dyn CustomObject) -> bool;

    fn hash_code(&self) -> u64;

    fn write(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<{}>>", self.type_name())
    }

    fn as_any(&self) -> &dyn Any;
}

/// A value in the term-rewriting universe
#[derive(Clone)]
pub enum Object {
    Magic(Magic),
    Integer(i64),
    Float(f64),
    String(PString),
    Symbol(Symbol),
    Expr(Expr),
    Custom(Arc<dyn CustomObject>),
}

/// Shared `Null` for borrowing accessors that need a fallback reference
pub(crate) static NULL_OBJECT: Object = Object::NULL;

/// Type tag of an [`Object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Magic,
    Integer,
    Float,
    String,
    Symbol,
    Expr,
    Custom,
}

bitflags! {
    /// Sets of object types, used by [`same_type`] and [`Object::is_type`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeMask: u32 {
        const MAGIC   = 1 << 0;
        const INTEGER = 1 << 1;
        const FLOAT   = 1 << 2;
        const STRING  = 1 << 3;
        const SYMBOL  = 1 << 4;
        const EXPR    = 1 << 5;
        const CUSTOM  = 1 << 6;

        const NUMBER    = Self::INTEGER.bits() | Self::FLOAT.bits();
        const IMMEDIATE = Self::MAGIC.bits() | Self::NUMBER.bits();
        const ATOM      = Self::NUMBER.bits() | Self::STRING.bits() | Self::SYMBOL.bits() | Self::CUSTOM.bits();
    }
}

impl ObjectType {
    pub fn mask(self) -> TypeMask {
        match self {
            ObjectType::Magic => TypeMask::MAGIC,
            ObjectType::Integer => TypeMask::INTEGER,
            ObjectType::Float => TypeMask::FLOAT,
            ObjectType::String => TypeMask::STRING,
            ObjectType::Symbol => TypeMask::SYMBOL,
            ObjectType::Expr => TypeMask::EXPR,
            ObjectType::Custom => TypeMask::CUSTOM,
        }
    }

    /// Variant rank used by the global object order
    pub(crate) fn rank(self) -> u8 {
        match self {
            ObjectType::Magic => 0,
            ObjectType::Integer | ObjectType::Float => 1,
            ObjectType::String => 2,
            ObjectType::Symbol => 3,
            ObjectType::Custom => 4,
            ObjectType::Expr => 5,
        }
    }
}

/// True when `a` and `b` carry the same type tag and that tag is in `mask`.
pub fn same_type(a: &Object, b: &Object, mask: TypeMask) -> bool {
    let ty = a.type_of();
    ty == b.type_of() && mask.contains(ty.mask())
}

impl Object {
    pub const NULL: Object = Object::Magic(Magic::Null);
    pub const UNDEFINED: Object = Object::Magic(Magic::Undefined);

    pub fn type_of(&self) -> ObjectType {
        match self {
            Object::Magic(_) => ObjectType::Magic,
            Object::Integer(_) => ObjectType::Integer,
            Object::Float(_) => ObjectType::Float,
            Object::String(_) => ObjectType::String,
            Object::Symbol(_) => ObjectType::Symbol,
            Object::Expr(_) => ObjectType::Expr,
            Object::Custom(_) => ObjectType::Custom,
        }
    }

    #[inline]
    pub fn is_type(&self, mask: TypeMask) -> bool {
        mask.contains(self.type_of().mask())
    }

    /// Take an additional handle to the same object.
    #[inline]
    pub fn retain(&self) -> Object {
        self.clone()
    }

    /// Give up this handle; the record is destroyed if it was the last one.
    #[inline]
    pub fn release(self) {
        drop(self)
    }

    /// Number of live handles to the heap record, `None` for immediates.
    pub fn refcount(&self) -> Option<usize> {
        match self {
            Object::Magic(_) | Object::Integer(_) | Object::Float(_) => None,
            Object::String(s) => Some(s.refcount()),
            Object::Symbol(s) => Some(s.refcount()),
            Object::Expr(e) => Some(e.refcount()),
            Object::Custom(c) => Some(Arc::strong_count(c)),
        }
    }

    /// Identity comparison: same heap record, or bit-identical immediate.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Magic(a), Object::Magic(b)) => a == b,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a.to_bits() == b.to_bits(),
            (Object::String(a), Object::String(b)) => a.ptr_eq(b),
            (Object::Symbol(a), Object::Symbol(b)) => a == b,
            (Object::Expr(a), Object::Expr(b)) => Expr::ptr_eq(a, b),
            (Object::Custom(a), Object::Custom(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Magic(Magic::Null))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Object::Magic(Magic::Undefined))
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Object::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Object::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// True if this is the symbol `sym`
    #[inline]
    pub fn is_symbol(&self, sym: &Symbol) -> bool {
        matches!(self, Object::Symbol(s) if s == sym)
    }

    /// True if this is an expression whose head is the symbol `sym`
    #[inline]
    pub fn has_head(&self, sym: &Symbol) -> bool {
        matches!(self, Object::Expr(e) if e.head().is_symbol(sym))
    }

    /// True if this is an expression headed by the pattern-sequence marker
    #[inline]
    pub fn is_sequence_marker(&self) -> bool {
        matches!(self, Object::Expr(e) if matches!(e.head(), Object::Magic(Magic::PatternSequence)))
    }

    /// Expression arguments, or an empty slice for atoms
    pub fn args(&self) -> &[Object] {
        match self {
            Object::Expr(e) => e.args(),
            _ => &[],
        }
    }

    /// Build `head(args...)`
    pub fn call(head: impl Into<Object>, args: impl IntoIterator<Item = Object>) -> Object {
        Object::Expr(Expr::call(head, args))
    }

    /// Build the sequence marker `PatternSequence(items...)`
    pub fn sequence_marker(items: impl IntoIterator<Item = Object>) -> Object {
        Object::call(Object::Magic(Magic::PatternSequence), items)
    }

    /// Leftmost symbol reached by walking heads, e.g. `f` for `f(1)(2)`.
    pub fn topmost_symbol(&self) -> Option<&Symbol> {
        let mut current = self;
        loop {
            match current {
                Object::Symbol(s) => return Some(s),
                Object::Expr(e) => current = e.head(),
                _ => return None,
            }
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Magic(a), Object::Magic(b)) => a == b,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a.to_bits() == b.to_bits(),
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Symbol(a), Object::Symbol(b)) => a == b,
            (Object::Expr(a), Object::Expr(b)) => a == b,
            (Object::Custom(a), Object::Custom(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.type_of().rank());
        match self {
            Object::Magic(m) => m.hash(state),
            Object::Integer(i) => state.write_i64(*i),
            Object::Float(f) => state.write_u64(f.to_bits()),
            Object::String(s) => s.hash(state),
            Object::Symbol(s) => s.hash(state),
            Object::Expr(e) => state.write_u64(e.structural_hash()),
            Object::Custom(c) => state.write_u64(c.hash_code()),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Float(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::String(PString::from_str(value))
    }
}

impl From<PString> for Object {
    fn from(value: PString) -> Self {
        Object::String(value)
    }
}

impl From<Symbol> for Object {
    fn from(value: Symbol) -> Self {
        Object::Symbol(value)
    }
}

impl From<&Symbol> for Object {
    fn from(value: &Symbol) -> Self {
        Object::Symbol(value.clone())
    }
}

impl From<Expr> for Object {
    fn from(value: Expr) -> Self {
        Object::Expr(value)
    }
}
