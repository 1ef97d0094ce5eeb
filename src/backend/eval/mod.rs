//! Evaluation
//!
//! - [`evaluation`]: the fixed-point loop
//! - [`normalize`]: Sequence splicing, Flat, Orderless, Listable
//! - [`assign`]: definitions on [`ThreadContext`](crate::backend::thread::ThreadContext)
//! - [`approximate`]: numeric approximation and display formatting
//! - [`native`]: native code bound to symbols
//! - [`messages`]: the diagnostic collaborator
//! - [`errors`]: [`EvalError`] and [`EvalResult`]

pub mod approximate;
pub mod assign;
pub mod errors;
pub mod evaluation;
pub mod messages;
pub mod native;
pub mod normalize;

pub use approximate::{apply_format, approximate};
pub use errors::{EvalError, EvalResult};
pub use evaluation::{evaluate, evaluate_top};
pub use messages::{LoggedMessage, MessageLog, MessageSink, TracingMessages};
pub use native::{ApproxFunction, CodeUsage, NativeFunction, NativeResult, NativeSlots};
