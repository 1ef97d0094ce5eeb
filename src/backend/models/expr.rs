//! Expression nodes: a head plus a fixed-length argument array
//!
//! Item 0 is the head, items `1..=len` are the arguments. Expressions are
//! immutable from the outside: [`Expr::set_item`] and friends consume the
//! handle and return one. When the handle is the only owner the node is
//! updated in place and the same allocation comes back; a shared node is
//! cloned first (copy-on-write), leaving every other handle untouched.
//!
//! Each node also caches its structural hash and an "evaluated at
//! generation" stamp. Both live in atomics so shared nodes can fill them in
//! lazily; both are reset whenever the node is mutated or cloned.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::object::{Object, NULL_OBJECT};
use super::AllocError;

const NO_HASH: u64 = 0;
const NOT_EVALUATED: u64 = 0;

pub(crate) struct ExprData {
    items: Vec<Object>,
    hash: AtomicU64,
    evaluated: AtomicU64,
}

impl ExprData {
    fn new(items: Vec<Object>) -> Self {
        ExprData {
            items,
            hash: AtomicU64::new(NO_HASH),
            evaluated: AtomicU64::new(NOT_EVALUATED),
        }
    }

    #[inline]
    fn touch(&mut self) {
        *self.hash.get_mut() = NO_HASH;
        *self.evaluated.get_mut() = NOT_EVALUATED;
    }
}

impl Clone for ExprData {
    fn clone(&self) -> Self {
        ExprData::new(self.items.clone())
    }
}

/// Handle to a reference-counted expression node
#[derive(Clone)]
pub struct Expr(Arc<ExprData>);

impl Expr {
    /// `head(Null, ..., Null)` with `arity` arguments
    pub fn new(head: Object, arity: usize) -> Expr {
        let mut items = Vec::with_capacity(arity + 1);
        items.push(head);
        items.resize(arity + 1, Object::NULL);
        Expr(Arc::new(ExprData::new(items)))
    }

    /// Like [`Expr::new`] but reports allocation failure
    pub fn try_new(head: Object, arity: usize) -> Result<Expr, AllocError> {
        let mut items = Vec::new();
        items
            .try_reserve_exact(arity.saturating_add(1))
            .map_err(|_| AllocError { requested: arity })?;
        items.push(head);
        items.resize(arity + 1, Object::NULL);
        Ok(Expr(Arc::new(ExprData::new(items))))
    }

    /// `head(args...)`
    pub fn call(head: impl Into<Object>, args: impl IntoIterator<Item = Object>) -> Expr {
        let args = args.into_iter();
        let mut items = Vec::with_capacity(args.size_hint().0 + 1);
        items.push(head.into());
        items.extend(args);
        Expr(Arc::new(ExprData::new(items)))
    }

    /// Build from a head-first item vector; an empty vector yields `Null()`.
    pub fn from_items(mut items: Vec<Object>) -> Expr {
        if items.is_empty() {
            items.push(Object::NULL);
        }
        Expr(Arc::new(ExprData::new(items)))
    }

    #[inline]
    pub fn head(&self) -> &Object {
        &self.0.items[0]
    }

    /// Number of arguments (the head is not counted)
    #[inline]
    pub fn length(&self) -> usize {
        self.0.items.len() - 1
    }

    /// Borrow item `i` (0 = head). Out-of-range indices yield `Null`.
    #[inline]
    pub fn get_item(&self, i: usize) -> &Object {
        self.0.items.get(i).unwrap_or(&NULL_OBJECT)
    }

    #[inline]
    pub fn args(&self) -> &[Object] {
        &self.0.items[1..]
    }

    /// Head followed by arguments
    #[inline]
    pub fn items(&self) -> &[Object] {
        &self.0.items
    }

    /// Same head with arguments `start..start+len` (1-based, clamped)
    pub fn items_range(&self, start: usize, len: usize) -> Expr {
        let args = self.args();
        let from = start.saturating_sub(1).min(args.len());
        let to = from.saturating_add(len).min(args.len());
        Expr::call(self.head().clone(), args[from..to].iter().cloned())
    }

    /// Replace item `i`, in place when this handle is the only owner.
    ///
    /// An out-of-range index drops `value` and returns the expression unchanged.
    pub fn set_item(mut self, i: usize, value: Object) -> Expr {
        if i >= self.0.items.len() {
            return self;
        }
        let data = Arc::make_mut(&mut self.0);
        data.items[i] = value;
        data.touch();
        self
    }

    /// Change the number of arguments, padding with `Null`.
    pub fn resize(mut self, arity: usize) -> Expr {
        if arity == self.length() {
            return self;
        }
        let data = Arc::make_mut(&mut self.0);
        data.items.resize(arity + 1, Object::NULL);
        data.touch();
        self
    }

    /// Append arguments at the end.
    pub fn append(mut self, args: impl IntoIterator<Item = Object>) -> Expr {
        let data = Arc::make_mut(&mut self.0);
        data.items.extend(args);
        data.touch();
        self
    }

    /// Run `f` on the uniquely owned item vector (head at index 0).
    pub fn with_items_mut(mut self, f: impl FnOnce(&mut Vec<Object>)) -> Expr {
        let data = Arc::make_mut(&mut self.0);
        f(&mut data.items);
        if data.items.is_empty() {
            data.items.push(Object::NULL);
        }
        data.touch();
        self
    }

    /// Consume the handle, returning the items without copying when unique.
    pub fn into_items(self) -> Vec<Object> {
        match Arc::try_unwrap(self.0) {
            Ok(data) => data.items,
            Err(shared) => shared.items.clone(),
        }
    }

    #[inline]
    pub fn ptr_eq(a: &Expr, b: &Expr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Address of the node, for identity checks
    pub fn as_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Structural hash, computed once per node
    pub fn structural_hash(&self) -> u64 {
        let cached = self.0.hash.load(Ordering::Relaxed);
        if cached != NO_HASH {
            return cached;
        }
        let mut hasher = DefaultHasher::new();
        for item in &self.0.items {
            item.hash(&mut hasher);
        }
        let h = hasher.finish().max(1);
        self.0.hash.store(h, Ordering::Relaxed);
        h
    }

    /// True if this node was fully evaluated at definition generation `generation`.
    #[inline]
    pub fn is_evaluated(&self, generation: u64) -> bool {
        self.0.evaluated.load(Ordering::Acquire) == generation
    }

    #[inline]
    pub fn mark_evaluated(&self, generation: u64) {
        self.0.evaluated.store(generation, Ordering::Release);
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if Expr::ptr_eq(self, other) {
            return true;
        }
        self.0.items.len() == other.0.items.len()
            && self.structural_hash() == other.structural_hash()
            && self.0.items == other.0.items
    }
}

impl Eq for Expr {}
