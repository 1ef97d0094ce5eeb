//! Evaluation threads
//!
//! Every evaluation runs against a [`ThreadContext`]. Contexts form a tree:
//! a context spawned for a worker keeps a read-only link to its parent and
//! falls back to it for local values, local rules and gather frames. Nothing
//! is copied when a child is spawned.

pub mod abort;
pub mod context;
pub mod gather;

pub use abort::{AbortSignal, TimeConstrainedOutcome};
pub use context::ThreadContext;
pub use gather::GatherFrame;
