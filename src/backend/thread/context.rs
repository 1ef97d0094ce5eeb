//! Per-thread evaluation state
//!
//! A [`ThreadContext`] is what every evaluation function receives. It holds
//! the kernel handle and a frame with this thread's private state:
//! - local values and local rule overrides,
//! - the recursion depth and the recursion-limit guard,
//! - the exception slot,
//! - the gather stack,
//! - the time-constraint deadline.
//!
//! Lookups that miss in the own frame continue with the parent frame, never
//! with siblings. Only the owning thread writes a frame's locals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::abort::{TimeConstrainedOutcome, NO_DEADLINE};
use super::gather::GatherFrame;
use crate::backend::dispatch::{Rule, RuleList};
use crate::backend::eval::errors::{EvalError, EvalResult};
use crate::backend::eval::evaluation;
use crate::backend::kernel::Kernel;
use crate::backend::models::Object;
use crate::backend::symbol::{bump_generation, current_generation, Symbol};
use crate::backend::thread_pool::TaskHandle;

pub(crate) struct ContextFrame {
    parent: Option<Arc<ContextFrame>>,
    locals: RwLock<HashMap<Symbol, Object>>,
    local_rules: RwLock<HashMap<Symbol, Arc<RuleList>>>,
    depth: AtomicUsize,
    reclim_guard: AtomicBool,
    exception: Mutex<Option<Object>>,
    pub(super) gather: Mutex<Vec<GatherFrame>>,
    deadline_nanos: AtomicU64,
}

impl ContextFrame {
    fn new(parent: Option<Arc<ContextFrame>>) -> ContextFrame {
        let depth = parent.as_ref().map_or(0, |p| p.depth.load(Ordering::Relaxed));
        ContextFrame {
            parent,
            locals: RwLock::new(HashMap::new()),
            local_rules: RwLock::new(HashMap::new()),
            depth: AtomicUsize::new(depth),
            reclim_guard: AtomicBool::new(false),
            exception: Mutex::new(None),
            gather: Mutex::new(Vec::new()),
            deadline_nanos: AtomicU64::new(NO_DEADLINE),
        }
    }

    /// This frame followed by its ancestors
    pub(super) fn chain(&self) -> impl Iterator<Item = &ContextFrame> {
        std::iter::successors(Some(self), |f| f.parent.as_deref())
    }
}

/// Handle to one evaluation thread's state
#[derive(Clone)]
pub struct ThreadContext {
    frame: Arc<ContextFrame>,
    kernel: Kernel,
}

/// Decrements the recursion depth when dropped
pub(crate) struct DepthGuard<'a> {
    frame: &'a ContextFrame,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.frame.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ThreadContext {
    pub(crate) fn new_root(kernel: Kernel) -> ThreadContext {
        ThreadContext {
            frame: Arc::new(ContextFrame::new(None)),
            kernel,
        }
    }

    #[inline]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub(super) fn frame(&self) -> &ContextFrame {
        &self.frame
    }

    /// A context for a worker thread. It starts empty and sees this
    /// context's locals through the parent link.
    pub fn spawn_child(&self) -> ThreadContext {
        ThreadContext {
            frame: Arc::new(ContextFrame::new(Some(Arc::clone(&self.frame)))),
            kernel: self.kernel.clone(),
        }
    }

    /// Evaluate `obj` to its fixed point.
    pub fn evaluate(&self, obj: Object) -> EvalResult<Object> {
        evaluation::evaluate(self, obj)
    }

    /// Evaluate `obj` without failing: uncaught throws come back as
    /// `Hold(Throw(x))` and aborts as `$Aborted`.
    pub fn evaluate_top(&self, obj: Object) -> Object {
        evaluation::evaluate_top(self, obj)
    }

    // Local values

    /// Bind `sym` in this context only.
    pub fn set_local(&self, sym: &Symbol, value: Object) {
        self.frame.locals.write().insert(sym.clone(), value);
        bump_generation();
    }

    pub fn unset_local(&self, sym: &Symbol) -> Option<Object> {
        let old = self.frame.locals.write().remove(sym);
        if old.is_some() {
            bump_generation();
        }
        old
    }

    /// Local value of `sym` in this context or the nearest ancestor that has one
    pub fn local_value(&self, sym: &Symbol) -> Option<Object> {
        self.frame.chain().find_map(|f| f.locals.read().get(sym).cloned())
    }

    /// Add a down rule for `sym` visible to this context and its children,
    /// tried before the global rules.
    pub fn add_local_rule(&self, sym: &Symbol, rule: Rule) {
        let mut rules = self.frame.local_rules.write();
        Arc::make_mut(rules.entry(sym.clone()).or_default()).insert(rule);
        bump_generation();
    }

    /// Local down rules for `sym` from the nearest context that has any
    pub fn local_rules(&self, sym: &Symbol) -> Option<Arc<RuleList>> {
        self.frame.chain().find_map(|f| f.local_rules.read().get(sym).cloned())
    }

    /// Generation to stamp evaluated expressions with, or `None` while this
    /// context or an ancestor has local values or rules. Expression nodes
    /// are shared between contexts, so a stamp may only record a result
    /// that holds for every context.
    pub(crate) fn stamp_generation(&self) -> Option<u64> {
        let has_locals = self
            .frame
            .chain()
            .any(|f| !f.locals.read().is_empty() || !f.local_rules.read().is_empty());
        (!has_locals).then(current_generation)
    }

    // Exceptions

    /// Record `value` as the pending exception unless one is already
    /// pending, and return the error that unwinds to the nearest `Catch`.
    pub fn throw(&self, value: Object) -> EvalError {
        let mut slot = self.frame.exception.lock();
        if slot.is_none() {
            trace!(target: "pmath_core::thread", %value, "throw");
            *slot = Some(value.clone());
        }
        EvalError::Thrown(value)
    }

    /// Take the pending exception, clearing the slot.
    pub fn catch_exception(&self) -> Option<Object> {
        self.frame.exception.lock().take()
    }

    pub fn pending_exception(&self) -> Option<Object> {
        self.frame.exception.lock().clone()
    }

    // Recursion depth

    pub fn depth(&self) -> usize {
        self.frame.depth.load(Ordering::Relaxed)
    }

    /// Increment the depth; the returned guard decrements it again.
    pub(crate) fn enter(&self) -> (usize, DepthGuard<'_>) {
        let depth = self.frame.depth.fetch_add(1, Ordering::Relaxed) + 1;
        (depth, DepthGuard { frame: &self.frame })
    }

    /// Arm the recursion-limit guard. Returns false if it was already armed.
    pub(crate) fn arm_reclim_guard(&self) -> bool {
        !self.frame.reclim_guard.swap(true, Ordering::Relaxed)
    }

    pub(crate) fn disarm_reclim_guard(&self) {
        self.frame.reclim_guard.store(false, Ordering::Relaxed);
    }

    // Abort and deadlines

    /// `Err(Aborted)` when an abort was requested or a deadline of this
    /// context or an ancestor has passed.
    pub fn check_abort(&self) -> EvalResult<()> {
        if self.kernel.is_aborting() {
            return Err(EvalError::Aborted);
        }
        let deadline = self
            .frame
            .chain()
            .map(|f| f.deadline_nanos.load(Ordering::Relaxed))
            .min()
            .unwrap_or(NO_DEADLINE);
        if deadline != NO_DEADLINE && self.kernel.elapsed_nanos() >= deadline {
            return Err(EvalError::Aborted);
        }
        Ok(())
    }

    /// Run `f` with a time limit.
    ///
    /// Nested constraints keep the earliest deadline. When this constraint
    /// expires, evaluation inside `f` sees [`EvalError::Aborted`] and the
    /// caller gets [`TimeConstrainedOutcome::TimedOut`]. A kernel abort or an
    /// enclosing constraint expiring is passed through as an error.
    pub fn time_constrained<T>(
        &self,
        limit: Duration,
        f: impl FnOnce(&ThreadContext) -> EvalResult<T>,
    ) -> EvalResult<TimeConstrainedOutcome<T>> {
        let limit = u64::try_from(limit.as_nanos()).unwrap_or(u64::MAX);
        let own = self.kernel.elapsed_nanos().saturating_add(limit);
        let previous = self.frame.deadline_nanos.load(Ordering::Relaxed);
        self.frame.deadline_nanos.store(previous.min(own), Ordering::Relaxed);
        let result = f(self);
        self.frame.deadline_nanos.store(previous, Ordering::Relaxed);
        match result {
            Ok(value) => Ok(TimeConstrainedOutcome::Completed(value)),
            Err(EvalError::Aborted) if !self.kernel.is_aborting() && self.kernel.elapsed_nanos() >= own => {
                debug!(target: "pmath_core::thread", ?limit, "time constraint expired");
                Ok(TimeConstrainedOutcome::TimedOut)
            }
            Err(err) => Err(err),
        }
    }

    /// Block for `duration`, waking early on abort or an expired deadline.
    pub fn pause(&self, duration: Duration) -> EvalResult<()> {
        let deadline = self
            .frame
            .chain()
            .map(|f| f.deadline_nanos.load(Ordering::Relaxed))
            .min()
            .unwrap_or(NO_DEADLINE);
        let wait = if deadline == NO_DEADLINE {
            duration
        } else {
            let left = deadline.saturating_sub(self.kernel.elapsed_nanos());
            duration.min(Duration::from_nanos(left))
        };
        self.kernel.abort_signal().wait(wait);
        self.check_abort()
    }

    // Workers

    /// Evaluate `expr` on the kernel's worker pool in a child context.
    pub fn spawn_task(&self, expr: Object) -> TaskHandle {
        let child = self.spawn_child();
        self.kernel.pool().spawn(move || child.evaluate(expr))
    }

    /// Evaluate every item in parallel, each in its own child context.
    /// Results keep the input order; the first error is returned.
    pub fn parallel_map(&self, items: &[Object]) -> EvalResult<Vec<Object>> {
        items
            .par_iter()
            .map(|item| self.spawn_child().evaluate(item.clone()))
            .collect()
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("depth", &self.depth())
            .field("has_parent", &self.frame.parent.is_some())
            .finish()
    }
}
