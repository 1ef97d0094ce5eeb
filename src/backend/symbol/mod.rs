//! Symbols and the symbol registry
//!
//! A [`Symbol`] is a handle to a unique, named record. Besides its name it
//! owns mutable state that is shared by every evaluation thread:
//! - an attribute set (atomic),
//! - an optional global value,
//! - a lazily allocated [`RuleStore`],
//! - the native code slots bound through `Kernel::register`.
//!
//! Each of these sits behind its own lock, so evaluating `f(x)` only
//! contends with other users of `f`. The registry that maps names to
//! symbols ([`SymbolTable`]) has a separate, sharded lock.
//!
//! Every mutation of a value, attribute set or rule list bumps a process-wide
//! definition generation. Expressions remember the generation at which they
//! were last fully evaluated and are not re-evaluated while it is current.

pub mod attributes;
pub mod rules;
pub mod table;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

pub use attributes::Attributes;
pub use rules::{AccessMode, RuleCacheKind, RuleStore, RuleStoreRef};
pub use table::SymbolTable;

use crate::backend::dispatch::RuleList;
use crate::backend::eval::native::NativeSlots;
use crate::backend::models::Object;

static DEFINITION_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Current definition generation
#[inline]
pub fn current_generation() -> u64 {
    DEFINITION_GENERATION.load(Ordering::Acquire)
}

/// Invalidate every "already evaluated" stamp.
#[inline]
pub(crate) fn bump_generation() {
    DEFINITION_GENERATION.fetch_add(1, Ordering::AcqRel);
}

static STRUCTURE_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Bumped whenever some symbol gains or loses Flat or Orderless. Which
/// left-hand sides count as constants depends on these attributes.
#[inline]
pub fn structure_epoch() -> u64 {
    STRUCTURE_EPOCH.load(Ordering::Acquire)
}

/// Errors from symbol mutation entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// The symbol carries the Protected attribute
    Protected(String),
    /// The symbol was removed from the registry
    Removed(String),
    /// A write was attempted through a read-only rule store handle
    ReadOnly,
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolError::Protected(name) => write!(f, "Symbol {} is Protected", name),
            SymbolError::Removed(name) => write!(f, "Symbol {} has been removed", name),
            SymbolError::ReadOnly => write!(f, "rule store was opened for reading"),
        }
    }
}

impl std::error::Error for SymbolError {}

pub(crate) struct SymbolData {
    name: Arc<str>,
    id: u64,
    attributes: AtomicU32,
    removed: AtomicBool,
    value: RwLock<Option<Object>>,
    rules: RwLock<Option<Box<RuleStore>>>,
    code: RwLock<NativeSlots>,
}

/// Handle to a registered symbol; equality is identity.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    pub(crate) fn new(name: Arc<str>, id: u64) -> Symbol {
        Symbol(Arc::new(SymbolData {
            name,
            id,
            attributes: AtomicU32::new(0),
            removed: AtomicBool::new(false),
            value: RwLock::new(None),
            rules: RwLock::new(None),
            code: RwLock::new(NativeSlots::default()),
        }))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Creation order, unique per process
    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    #[inline]
    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.0.attributes.load(Ordering::Acquire))
    }

    #[inline]
    pub fn has_attribute(&self, attr: Attributes) -> bool {
        self.attributes().intersects(attr)
    }

    /// Replace the attribute set.
    ///
    /// Refused on Protected symbols unless the new set drops Protected.
    pub fn set_attributes(&self, attrs: Attributes) -> Result<(), SymbolError> {
        self.check_live()?;
        if self.attributes().contains(Attributes::PROTECTED) && attrs.contains(Attributes::PROTECTED) {
            return Err(SymbolError::Protected(self.name().to_string()));
        }
        self.store_attributes(attrs);
        Ok(())
    }

    /// Set attributes without the Protected check (kernel setup).
    pub(crate) fn store_attributes(&self, attrs: Attributes) {
        trace!(target: "pmath_core::symbol", symbol = %self.name(), ?attrs, "set attributes");
        let old = Attributes::from_bits_truncate(self.0.attributes.swap(attrs.bits(), Ordering::AcqRel));
        if (old ^ attrs).intersects(Attributes::FLAT | Attributes::ORDERLESS) {
            STRUCTURE_EPOCH.fetch_add(1, Ordering::AcqRel);
        }
        bump_generation();
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.0.removed.load(Ordering::Acquire)
    }

    fn check_live(&self) -> Result<(), SymbolError> {
        if self.is_removed() {
            Err(SymbolError::Removed(self.name().to_string()))
        } else {
            Ok(())
        }
    }

    /// The global value, read under the symbol's lock.
    pub fn value(&self) -> Option<Object> {
        self.0.value.read().clone()
    }

    /// Replace the global value; `None` clears it.
    pub fn set_value(&self, value: Option<Object>) -> Result<(), SymbolError> {
        self.check_live()?;
        if self.has_attribute(Attributes::PROTECTED) {
            return Err(SymbolError::Protected(self.name().to_string()));
        }
        *self.0.value.write() = value;
        bump_generation();
        Ok(())
    }

    /// Open the rule store.
    ///
    /// `Read` never allocates and yields `None` when the symbol has no rules.
    /// `Write` and `WriteOptions` allocate the store on first use; `Write` is
    /// refused for Protected symbols.
    pub fn get_rules(&self, mode: AccessMode) -> Result<Option<RuleStoreRef<'_>>, SymbolError> {
        match mode {
            AccessMode::Read => {
                let guard = self.0.rules.read();
                Ok(RwLockReadGuard::try_map(guard, |store| store.as_deref())
                    .ok()
                    .map(RuleStoreRef::Shared))
            }
            AccessMode::Write | AccessMode::WriteOptions => {
                self.check_live()?;
                if mode == AccessMode::Write && self.has_attribute(Attributes::PROTECTED) {
                    return Err(SymbolError::Protected(self.name().to_string()));
                }
                let guard = self.0.rules.write();
                let guard = RwLockWriteGuard::map(guard, |store| &mut **store.get_or_insert_with(Box::default));
                Ok(Some(RuleStoreRef::Exclusive {
                    guard,
                    mode,
                    name: Arc::clone(&self.0.name),
                }))
            }
        }
    }

    /// Snapshot of one rule list; `None` when the list is missing or empty.
    pub fn rules_snapshot(&self, kind: RuleCacheKind) -> Option<Arc<RuleList>> {
        let guard = self.0.rules.read();
        let list = guard.as_ref()?.cache(kind);
        if list.is_empty() {
            None
        } else {
            Some(Arc::clone(list))
        }
    }

    pub(crate) fn native_code(&self) -> RwLockReadGuard<'_, NativeSlots> {
        self.0.code.read()
    }

    pub(crate) fn native_code_mut(&self) -> RwLockWriteGuard<'_, NativeSlots> {
        self.0.code.write()
    }

    /// Turn the symbol into a zombie: drop its definitions and skip it during
    /// evaluation. Live handles keep working as inert atoms.
    pub(crate) fn mark_removed(&self) {
        self.0.removed.store(true, Ordering::Release);
        self.0.attributes.store(0, Ordering::Release);
        *self.0.value.write() = None;
        *self.0.rules.write() = None;
        *self.0.code.write() = NativeSlots::default();
        bump_generation();
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.id)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dispatch::{Rule, RuleKind};
    use crate::backend::kernel::Kernel;

    #[test]
    fn test_read_does_not_allocate() {
        let table = SymbolTable::new();
        let f = table.find_or_create("f");
        assert!(f.get_rules(AccessMode::Read).unwrap().is_none());
        assert!(f.get_rules(AccessMode::Read).unwrap().is_none(), "still unallocated");
    }

    #[test]
    fn test_write_allocates() {
        let k = Kernel::new_default();
        let f = k.symbol("f");
        {
            let mut store = f.get_rules(AccessMode::Write).unwrap().unwrap();
            store
                .cache_mut(RuleCacheKind::Own)
                .unwrap()
                .insert(Rule::new(Object::Symbol(f.clone()), Object::Integer(1), RuleKind::Delayed, k.system()));
        }
        let store = f.get_rules(AccessMode::Read).unwrap().unwrap();
        assert_eq!(store.cache(RuleCacheKind::Own).len(), 1);
    }

    #[test]
    fn test_protected_refuses_write_but_allows_options() {
        let table = SymbolTable::new();
        let f = table.find_or_create("f");
        f.store_attributes(Attributes::PROTECTED);

        assert!(matches!(
            f.get_rules(AccessMode::Write),
            Err(SymbolError::Protected(_))
        ));

        let mut store = f.get_rules(AccessMode::WriteOptions).unwrap().unwrap();
        assert!(store.cache_mut(RuleCacheKind::Default).is_ok());
        assert!(matches!(
            store.cache_mut(RuleCacheKind::Down),
            Err(SymbolError::Protected(_))
        ));
    }

    #[test]
    fn test_protected_value() {
        let table = SymbolTable::new();
        let x = table.find_or_create("x");
        x.set_value(Some(Object::Integer(1))).unwrap();
        x.store_attributes(Attributes::PROTECTED);
        assert!(x.set_value(Some(Object::Integer(2))).is_err());
        assert_eq!(x.value(), Some(Object::Integer(1)));

        assert!(x.set_attributes(Attributes::PROTECTED | Attributes::FLAT).is_err());
        x.set_attributes(Attributes::FLAT).unwrap();
        assert_eq!(x.attributes(), Attributes::FLAT);
    }

    #[test]
    fn test_generation_moves_on_mutation() {
        let table = SymbolTable::new();
        let x = table.find_or_create("x");
        let before = current_generation();
        x.set_value(Some(Object::Integer(1))).unwrap();
        assert!(current_generation() > before);
    }
}
