//! Per-symbol rule store
//!
//! A symbol's store holds six independent rule lists plus the default-value
//! list. Each list sits behind an `Arc` so readers clone a snapshot and
//! release the symbol lock before matching; writers get the list through
//! `Arc::make_mut`, which copies it only while some reader still holds the
//! old snapshot.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use super::SymbolError;
use crate::backend::dispatch::RuleList;

/// How a caller intends to use a symbol's rule store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Look only; never allocates
    Read,
    /// Change any rule list; refused for Protected symbols
    Write,
    /// Change only the default-value list; allowed on Protected symbols
    WriteOptions,
}

/// The rule lists a symbol owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCacheKind {
    /// Rules for the symbol itself (`x :> ...`)
    Own,
    /// Rules for `f(...)`
    Down,
    /// Rules triggered when the symbol appears as an argument
    Up,
    /// Rules for `f(...)(...)`
    Sub,
    /// Numeric approximation rules
    Approx,
    /// Display rules
    Format,
    /// `Default(f, ...)` values used by `Optional` patterns
    Default,
}

impl RuleCacheKind {
    pub const ALL: [RuleCacheKind; 7] = [
        RuleCacheKind::Own,
        RuleCacheKind::Down,
        RuleCacheKind::Up,
        RuleCacheKind::Sub,
        RuleCacheKind::Approx,
        RuleCacheKind::Format,
        RuleCacheKind::Default,
    ];
}

#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    own: Arc<RuleList>,
    down: Arc<RuleList>,
    up: Arc<RuleList>,
    sub: Arc<RuleList>,
    approx: Arc<RuleList>,
    format: Arc<RuleList>,
    defaults: Arc<RuleList>,
}

impl RuleStore {
    pub fn cache(&self, kind: RuleCacheKind) -> &Arc<RuleList> {
        match kind {
            RuleCacheKind::Own => &self.own,
            RuleCacheKind::Down => &self.down,
            RuleCacheKind::Up => &self.up,
            RuleCacheKind::Sub => &self.sub,
            RuleCacheKind::Approx => &self.approx,
            RuleCacheKind::Format => &self.format,
            RuleCacheKind::Default => &self.defaults,
        }
    }

    fn cache_slot_mut(&mut self, kind: RuleCacheKind) -> &mut Arc<RuleList> {
        match kind {
            RuleCacheKind::Own => &mut self.own,
            RuleCacheKind::Down => &mut self.down,
            RuleCacheKind::Up => &mut self.up,
            RuleCacheKind::Sub => &mut self.sub,
            RuleCacheKind::Approx => &mut self.approx,
            RuleCacheKind::Format => &mut self.format,
            RuleCacheKind::Default => &mut self.defaults,
        }
    }

    pub fn is_empty(&self) -> bool {
        RuleCacheKind::ALL.iter().all(|k| self.cache(*k).is_empty())
    }
}

/// Locked access to a symbol's rule store
pub enum RuleStoreRef<'a> {
    Shared(MappedRwLockReadGuard<'a, RuleStore>),
    Exclusive {
        guard: MappedRwLockWriteGuard<'a, RuleStore>,
        mode: AccessMode,
        name: Arc<str>,
    },
}

impl RuleStoreRef<'_> {
    /// Mutable access to one list, subject to the access mode the store was
    /// opened with.
    pub fn cache_mut(&mut self, kind: RuleCacheKind) -> Result<&mut RuleList, SymbolError> {
        match self {
            RuleStoreRef::Shared(_) => Err(SymbolError::ReadOnly),
            RuleStoreRef::Exclusive { guard, mode, name } => {
                if *mode == AccessMode::WriteOptions && kind != RuleCacheKind::Default {
                    return Err(SymbolError::Protected(name.to_string()));
                }
                super::bump_generation();
                Ok(Arc::make_mut(guard.cache_slot_mut(kind)))
            }
        }
    }
}

impl Deref for RuleStoreRef<'_> {
    type Target = RuleStore;

    fn deref(&self) -> &RuleStore {
        match self {
            RuleStoreRef::Shared(guard) => guard,
            RuleStoreRef::Exclusive { guard, .. } => guard,
        }
    }
}
