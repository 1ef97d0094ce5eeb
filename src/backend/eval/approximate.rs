//! Numeric approximation and display formatting
//!
//! Both paths run outside the main evaluation loop. Approximation works
//! bottom-up: arguments are approximated first, the rebuilt call is
//! evaluated, then the head's approximation rules and native callback get a
//! chance to produce a number.

use super::errors::EvalResult;
use crate::backend::models::{Expr, Object};
use crate::backend::symbol::{Attributes, RuleCacheKind, Symbol};
use crate::backend::thread::ThreadContext;

/// Evaluate `obj` and replace exact numbers by machine floats wherever
/// approximation rules or callbacks allow.
pub fn approximate(ctx: &ThreadContext, obj: Object) -> EvalResult<Object> {
    let value = ctx.evaluate(obj)?;
    approximate_value(ctx, value)
}

fn approximate_value(ctx: &ThreadContext, value: Object) -> EvalResult<Object> {
    ctx.check_abort()?;
    match value {
        Object::Integer(n) => Ok(Object::Float(n as f64)),
        Object::Symbol(ref sym) => Ok(approx_with(ctx, sym, &value)?.unwrap_or(value)),
        Object::Expr(e) => approximate_expr(ctx, e),
        other => Ok(other),
    }
}

fn approximate_expr(ctx: &ThreadContext, e: Expr) -> EvalResult<Object> {
    let attrs = match e.head() {
        Object::Symbol(s) => s.attributes(),
        _ => Attributes::empty(),
    };
    let mut items = Vec::with_capacity(e.length() + 1);
    items.push(e.head().clone());
    for (i, arg) in e.args().iter().enumerate() {
        if attrs.contains(Attributes::HOLD_ALL_COMPLETE) || attrs.holds(i + 1) {
            items.push(arg.clone());
        } else {
            items.push(approximate_value(ctx, arg.clone())?);
        }
    }
    let rebuilt = ctx.evaluate(Object::Expr(Expr::from_items(items)))?;
    if !matches!(rebuilt, Object::Expr(_)) {
        return approximate_value(ctx, rebuilt);
    }
    let Some(sym) = rebuilt.topmost_symbol().cloned() else {
        return Ok(rebuilt);
    };
    match approx_with(ctx, &sym, &rebuilt)? {
        Some(result) => ctx.evaluate(result),
        None => Ok(rebuilt),
    }
}

/// Approximation rules of `sym`, then its native callback
fn approx_with(ctx: &ThreadContext, sym: &Symbol, subject: &Object) -> EvalResult<Option<Object>> {
    if let Some(rules) = sym.rules_snapshot(RuleCacheKind::Approx) {
        if let Some(result) = rules.find(ctx, subject)? {
            return Ok(Some(result));
        }
    }
    let code = sym.native_code().approx.clone();
    match code {
        Some(code) => code.approximate(ctx, subject),
        None => Ok(None),
    }
}

/// Apply the first matching display rule of the object's topmost symbol.
pub fn apply_format(ctx: &ThreadContext, obj: &Object) -> EvalResult<Object> {
    let Some(sym) = obj.topmost_symbol() else {
        return Ok(obj.clone());
    };
    match sym.rules_snapshot(RuleCacheKind::Format) {
        Some(rules) => Ok(rules.find(ctx, obj)?.unwrap_or_else(|| obj.clone())),
        None => Ok(obj.clone()),
    }
}
