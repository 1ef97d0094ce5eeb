//! pmath-core - term-rewriting evaluation core
//!
//! This library is the kernel of a computer algebra runtime. It provides
//! immutable, reference-counted expressions, a registry of symbols carrying
//! attributes and rule sets, a backtracking pattern matcher, and a
//! fixed-point evaluator that rewrites expressions until no rule applies.
//! There is no parser: hosts build expressions in Rust.
//!
//! # Architecture
//!
//! 1. **Object model** (`backend::models`)
//!    - `Object`: immediates (integers, floats, magic values) and shared heap
//!      objects (strings, symbols, expressions, custom objects)
//!    - `PString`: copy-on-write UTF-16 strings with buffer-sharing slices
//!    - `Expr`: head plus arguments, mutated in place only while unshared
//!
//! 2. **Symbols** (`backend::symbol`)
//!    - attributes (HoldAll, Flat, Orderless, Protected, ...)
//!    - per-symbol rule store with own/down/up/sub/approx/format/default lists
//!
//! 3. **Matching and dispatch** (`backend::pattern`, `backend::dispatch`)
//!    - blanks, sequences, conditions, alternatives, repetition, optionals
//!    - orderless and associative (Flat) matching with full backtracking
//!    - literal index and per-head dispatch tables over rule lists
//!
//! 4. **Evaluation** (`backend::eval`, `backend::thread`)
//!    - hold attributes, Sequence splicing, Listable threading
//!    - up rules, down rules, sub rules, then native code
//!    - thread contexts with local values, Gather/Emit, Throw/Catch,
//!      cooperative abort and time constraints
//!
//! # Example
//!
//! ```rust
//! use pmath_core::backend::*;
//!
//! let kernel = Kernel::new_default();
//! let ctx = kernel.root_context();
//! let sys = kernel.system();
//!
//! // twice(x_Integer) := {x, x}
//! let twice = kernel.symbol("twice");
//! let x = kernel.symbol("x");
//! let lhs = Object::call(&twice, vec![sys.named_blank_of(&x, &sys.integer)]);
//! ctx.assign_delayed(lhs, sys.list(vec![Object::from(&x), Object::from(&x)])).unwrap();
//!
//! let result = ctx.evaluate(Object::call(&twice, vec![Object::Integer(3)])).unwrap();
//! assert_eq!(result.to_string(), "{3, 3}");
//! ```

pub mod backend;
pub mod config;
pub mod logging;

pub use backend::{
    CodeUsage, EvalError, EvalResult, Expr, Kernel, Object, PString, Symbol, SystemSymbols, ThreadContext,
};
pub use config::{ConfigError, EvalConfig, LoggingConfig};
pub use logging::init_tracing;
