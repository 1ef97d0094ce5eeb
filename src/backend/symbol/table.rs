//! Name → symbol registry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use itertools::Itertools;
use tracing::debug;

use super::Symbol;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// Concurrent registry of symbols by name.
///
/// Lookups take a shard read lock only; per-symbol state is locked
/// separately inside each [`Symbol`].
#[derive(Default)]
pub struct SymbolTable {
    by_name: DashMap<Arc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            by_name: DashMap::new(),
        }
    }

    /// The symbol called `name`, creating it on first use.
    pub fn find_or_create(&self, name: &str) -> Symbol {
        if let Some(sym) = self.by_name.get(name) {
            return sym.clone();
        }
        self.by_name
            .entry(Arc::from(name))
            .or_insert_with(|| {
                let id = NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed);
                debug!(target: "pmath_core::symbol", name, id, "new symbol");
                Symbol::new(Arc::from(name), id)
            })
            .clone()
    }

    /// The symbol called `name`, if it exists.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.by_name.get(name).map(|s| s.clone())
    }

    /// Unregister `sym` and turn it into a zombie.
    ///
    /// A later `find_or_create` with the same name yields a fresh symbol.
    pub fn remove(&self, sym: &Symbol) -> bool {
        let removed = self.by_name.remove_if(sym.name(), |_, v| v == sym).is_some();
        if removed {
            debug!(target: "pmath_core::symbol", name = sym.name(), "removed symbol");
            sym.mark_removed();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.by_name.iter().map(|e| e.key().to_string()).sorted().collect()
    }
}
