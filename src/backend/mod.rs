//! Evaluation backend
//!
//! - `models`: objects, strings, expressions, bindings
//! - `symbol`: symbols, attributes, rule stores, the symbol table
//! - `pattern`: pattern syntax, size analysis, specificity, matching
//! - `dispatch`: rule lists and dispatch tables
//! - `eval`: the evaluator, definitions, native code, messages
//! - `thread`: per-thread contexts, gather/emit, abort
//! - `thread_pool`: workers for spawned evaluations
//! - `kernel`: the shared handle tying it together

pub mod dispatch;
pub mod eval;
pub mod kernel;
pub mod models;
pub mod pattern;
pub mod symbol;
pub mod thread;
pub mod thread_pool;

pub use dispatch::{replace, replace_all, Rule, RuleKind, RuleList};
pub use eval::{
    apply_format, approximate, evaluate, evaluate_top, CodeUsage, EvalError, EvalResult, MessageLog, MessageSink,
    NativeResult,
};
pub use kernel::{Kernel, SystemSymbols};
pub use models::*;
pub use pattern::{apply_rule, match_pattern, matches, PatternError};
pub use symbol::{AccessMode, Attributes, RuleCacheKind, Symbol, SymbolError, SymbolTable};
pub use thread::{ThreadContext, TimeConstrainedOutcome};
pub use thread_pool::{EvalPool, TaskHandle};
