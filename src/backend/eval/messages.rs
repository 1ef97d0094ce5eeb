//! Diagnostic message collaborator
//!
//! The core never formats user-facing text. It reports `symbol::tag` plus
//! the offending objects and leaves presentation to the host.

use parking_lot::Mutex;
use tracing::warn;

use crate::backend::models::Object;
use crate::backend::symbol::Symbol;

/// Receiver of evaluation-time diagnostics such as `General::reclim`
pub trait MessageSink: Send + Sync {
    fn message(&self, symbol: &Symbol, tag: &str, args: &[Object]);
}

/// Default sink: every message becomes a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessages;

impl MessageSink for TracingMessages {
    fn message(&self, symbol: &Symbol, tag: &str, args: &[Object]) {
        let args = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        warn!(target: "pmath_core::messages", "{}::{}: {}", symbol, tag, args);
    }
}

/// A recorded message
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedMessage {
    pub symbol: String,
    pub tag: String,
    pub args: Vec<Object>,
}

/// Sink that keeps every message, for hosts that display them later and for tests
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Mutex<Vec<LoggedMessage>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub fn entries(&self) -> Vec<LoggedMessage> {
        self.entries.lock().clone()
    }

    /// Whether `symbol::tag` was reported
    pub fn contains(&self, symbol: &str, tag: &str) -> bool {
        self.entries.lock().iter().any(|m| m.symbol == symbol && m.tag == tag)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl MessageSink for MessageLog {
    fn message(&self, symbol: &Symbol, tag: &str, args: &[Object]) {
        self.entries.lock().push(LoggedMessage {
            symbol: symbol.name().to_string(),
            tag: tag.to_string(),
            args: args.to_vec(),
        });
    }
}

impl<T: MessageSink + ?Sized> MessageSink for std::sync::Arc<T> {
    fn message(&self, symbol: &Symbol, tag: &str, args: &[Object]) {
        (**self).message(symbol, tag, args)
    }
}
