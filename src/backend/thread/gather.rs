//! Gather/Emit accumulators
//!
//! `Gather(body, pattern)` opens a frame on the calling context's gather
//! stack; `Emit(value, tag)` appends `value` to the innermost frame whose
//! pattern matches `tag`, searching the own stack first and then the stacks
//! of the ancestors. Frames of a parent are shared with its workers, so
//! values emitted from parallel children land in the parent's frame.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::context::ThreadContext;
use crate::backend::eval::errors::EvalResult;
use crate::backend::models::Object;
use crate::backend::pattern::matches;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// One open `Gather`
#[derive(Debug, Clone)]
pub struct GatherFrame {
    id: u64,
    pub pattern: Object,
    pub values: Vec<Object>,
}

impl ThreadContext {
    /// Open a frame collecting values whose tag matches `pattern`.
    pub fn gather_begin(&self, pattern: Object) {
        self.frame().gather.lock().push(GatherFrame {
            id: NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed),
            pattern,
            values: Vec::new(),
        });
    }

    /// Close the innermost frame of this context and return what it collected.
    pub fn gather_end(&self) -> Vec<Object> {
        self.frame().gather.lock().pop().map(|f| f.values).unwrap_or_default()
    }

    /// Append `value` to the innermost matching frame.
    ///
    /// Sends `Emit::nogather` when no frame is open anywhere in the chain
    /// and `Emit::nogather2` when frames exist but none accepts `tag`.
    pub fn emit(&self, value: Object, tag: &Object) -> EvalResult<()> {
        let mut any_frame = false;
        for frame in self.frame().chain() {
            // Patterns are matched without holding the lock: conditions may
            // evaluate code that emits again or opens and closes frames, so
            // the target is found again by id.
            let patterns: Vec<(u64, Object)> =
                frame.gather.lock().iter().map(|g| (g.id, g.pattern.clone())).collect();
            any_frame |= !patterns.is_empty();
            for (id, pattern) in patterns.iter().rev() {
                if matches(self, tag, pattern)? {
                    let mut stack = frame.gather.lock();
                    if let Some(target) = stack.iter_mut().find(|g| g.id == *id) {
                        trace!(target: "pmath_core::thread", %value, %tag, id, "emit");
                        target.values.push(value);
                        return Ok(());
                    }
                }
            }
        }
        let sys = self.kernel().system();
        if any_frame {
            self.kernel().message(&sys.emit, "nogather2", &[value, tag.clone()]);
        } else {
            self.kernel().message(&sys.emit, "nogather", &[value]);
        }
        Ok(())
    }
}
