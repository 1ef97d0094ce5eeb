//! Native code bound to symbols
//!
//! Host code attaches Rust functions to symbols with [`Kernel::register`].
//! The evaluator calls them only after every user rule failed, so user
//! definitions can always shadow a native implementation.
//!
//! A native function receives the call with its arguments already
//! evaluated (subject to the head's hold attributes) and returns:
//! - `Ok(Some(result))` - the call was rewritten,
//! - `Ok(None)` - not applicable, the call stays as it is,
//! - `Err(...)` - a throw or abort that unwinds evaluation.
//!
//! [`Kernel::register`]: crate::backend::kernel::Kernel::register

use std::fmt;
use std::sync::Arc;

use super::errors::{EvalError, EvalResult};
use crate::backend::kernel::Kernel;
use crate::backend::models::{Expr, Object};
use crate::backend::thread::ThreadContext;

pub type NativeResult = EvalResult<Option<Object>>;

/// Native implementation of a call
///
/// ```ignore
/// kernel.register(&plus, CodeUsage::DownCall, |_ctx: &ThreadContext, call: &Expr| {
///     let mut sum = 0i64;
///     for arg in call.args() {
///         match arg {
///             Object::Integer(n) => sum += n,
///             _ => return Ok(None),
///         }
///     }
///     Ok(Some(Object::Integer(sum)))
/// });
/// ```
pub trait NativeFunction: Send + Sync {
    fn call(&self, ctx: &ThreadContext, expr: &Expr) -> NativeResult;
}

impl<F> NativeFunction for F
where
    F: Fn(&ThreadContext, &Expr) -> NativeResult + Send + Sync,
{
    fn call(&self, ctx: &ThreadContext, expr: &Expr) -> NativeResult {
        self(ctx, expr)
    }
}

/// Numeric approximation of an object whose head (or self) carries the callback
pub trait ApproxFunction: Send + Sync {
    fn approximate(&self, ctx: &ThreadContext, obj: &Object) -> NativeResult;
}

impl<F> ApproxFunction for F
where
    F: Fn(&ThreadContext, &Object) -> NativeResult + Send + Sync,
{
    fn approximate(&self, ctx: &ThreadContext, obj: &Object) -> NativeResult {
        self(ctx, obj)
    }
}

/// Which evaluation phase a native function serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUsage {
    /// `f(...)` with `f` the head
    DownCall,
    /// `f(...)(...)` with `f` the topmost head
    SubCall,
    /// any call that has `f` among its arguments
    UpCall,
}

/// Native code slots of one symbol
#[derive(Clone, Default)]
pub struct NativeSlots {
    pub down: Option<Arc<dyn NativeFunction>>,
    pub sub: Option<Arc<dyn NativeFunction>>,
    pub up: Option<Arc<dyn NativeFunction>>,
    pub approx: Option<Arc<dyn ApproxFunction>>,
}

impl NativeSlots {
    pub fn get(&self, usage: CodeUsage) -> Option<Arc<dyn NativeFunction>> {
        match usage {
            CodeUsage::DownCall => self.down.clone(),
            CodeUsage::SubCall => self.sub.clone(),
            CodeUsage::UpCall => self.up.clone(),
        }
    }
}

impl fmt::Debug for NativeSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeSlots")
            .field("down", &self.down.is_some())
            .field("sub", &self.sub.is_some())
            .field("up", &self.up.is_some())
            .field("approx", &self.approx.is_some())
            .finish()
    }
}

fn throw(ctx: &ThreadContext, call: &Expr) -> NativeResult {
    match call.args() {
        [value] => Err(ctx.throw(value.clone())),
        _ => Ok(None),
    }
}

fn catch(ctx: &ThreadContext, call: &Expr) -> NativeResult {
    let [body] = call.args() else {
        return Ok(None);
    };
    match ctx.evaluate(body.clone()) {
        Ok(value) => Ok(Some(value)),
        Err(EvalError::Thrown(value)) => {
            ctx.catch_exception();
            Ok(Some(value))
        }
        Err(err) => Err(err),
    }
}

fn gather(ctx: &ThreadContext, call: &Expr) -> NativeResult {
    let sys = ctx.kernel().system();
    let (body, pattern) = match call.args() {
        [body] => (body, sys.blank()),
        [body, pattern] => (body, pattern.clone()),
        _ => return Ok(None),
    };
    ctx.gather_begin(pattern);
    let result = ctx.evaluate(body.clone());
    let values = ctx.gather_end();
    let result = result?;
    Ok(Some(sys.list(vec![result, sys.list(values)])))
}

fn emit(ctx: &ThreadContext, call: &Expr) -> NativeResult {
    let (value, tag) = match call.args() {
        [value] => (value, Object::NULL),
        [value, tag] => (value, tag.clone()),
        _ => return Ok(None),
    };
    ctx.emit(value.clone(), &tag)?;
    Ok(Some(value.clone()))
}

fn evaluate(ctx: &ThreadContext, call: &Expr) -> NativeResult {
    Ok(Some(match call.args() {
        [single] => single.clone(),
        args => ctx.kernel().system().sequence(args.to_vec()),
    }))
}

/// Native code every kernel starts with
pub(crate) fn install_core(kernel: &Kernel) {
    let sys = kernel.system().clone();
    kernel.register(&sys.throw, CodeUsage::DownCall, throw);
    kernel.register(&sys.catch, CodeUsage::DownCall, catch);
    kernel.register(&sys.gather, CodeUsage::DownCall, gather);
    kernel.register(&sys.emit, CodeUsage::DownCall, emit);
    kernel.register(&sys.evaluate, CodeUsage::DownCall, evaluate);
}
