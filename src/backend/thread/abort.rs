//! Cooperative cancellation
//!
//! Nothing is preempted. Evaluation polls the kernel's abort flag and the
//! deadlines of its context chain at loop boundaries and unwinds with
//! [`EvalError::Aborted`]. Blocking waits sleep on a condition variable that
//! `request` wakes.
//!
//! [`EvalError::Aborted`]: crate::backend::eval::errors::EvalError::Aborted

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Kernel-wide abort flag with a wakeup for sleepers
#[derive(Debug, Default)]
pub struct AbortSignal {
    flag: AtomicBool,
    lock: Mutex<()>,
    wakeup: Condvar,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.wakeup.notify_all();
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `timeout` or until an abort is requested.
    /// Returns true if woken by an abort.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while !self.is_set() {
            if self.wakeup.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_set()
    }
}

/// Result of [`ThreadContext::time_constrained`]
///
/// [`ThreadContext::time_constrained`]: super::ThreadContext::time_constrained
#[derive(Debug, Clone, PartialEq)]
pub enum TimeConstrainedOutcome<T> {
    Completed(T),
    TimedOut,
}

impl<T> TimeConstrainedOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            TimeConstrainedOutcome::Completed(v) => Some(v),
            TimeConstrainedOutcome::TimedOut => None,
        }
    }
}

/// Sentinel for "no deadline" in a context frame
pub(crate) const NO_DEADLINE: u64 = u64::MAX;
