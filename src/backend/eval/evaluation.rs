//! Fixed-point evaluation
//!
//! `evaluate` rewrites an object until no rule applies:
//!
//! 1. symbols are replaced by their local value, global value or own rules;
//! 2. expressions go through [`evaluate_expression`]: head, arguments
//!    (honoring hold attributes), `Sequence` splicing, Listable threading,
//!    Flat flattening, Orderless sorting, then up rules, local rules, down
//!    or sub rules and finally native code;
//! 3. a rewrite loops back to step 1, a stable result is stamped with the
//!    current definition generation so it is not evaluated again until some
//!    definition changes. Contexts with local values or rules neither read
//!    nor write stamps.
//!
//! Nesting depth and the number of rewrites per object are bounded by the
//! kernel configuration. Abort requests are polled on every rewrite.

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::errors::{EvalError, EvalResult};
use super::normalize;
use crate::backend::models::{Expr, Object};
use crate::backend::symbol::{Attributes, RuleCacheKind, Symbol};
use crate::backend::thread::ThreadContext;

/// Outcome of one evaluation step
enum Step {
    /// Stable; already stamped where applicable
    Done(Object),
    /// Rewritten; evaluate again
    Rewritten(Object),
}

/// Evaluate `obj` to its fixed point.
pub fn evaluate(ctx: &ThreadContext, obj: Object) -> EvalResult<Object> {
    let outermost = ctx.depth() == 0;
    let result = evaluate_loop(ctx, obj);
    if outermost {
        ctx.disarm_reclim_guard();
    }
    result
}

fn evaluate_loop(ctx: &ThreadContext, obj: Object) -> EvalResult<Object> {
    let max_iterations = ctx.kernel().config().max_iterations;
    let mut current = obj;
    let mut iterations = 0usize;
    loop {
        ctx.check_abort()?;
        let step = match &current {
            Object::Symbol(sym) => match evaluate_symbol(ctx, sym)? {
                Some(value) => Step::Rewritten(value),
                None => Step::Done(current.clone()),
            },
            Object::Expr(e) => {
                if ctx.stamp_generation().is_some_and(|g| e.is_evaluated(g)) {
                    return Ok(current);
                }
                evaluate_expression(ctx, e)?
            }
            _ => return Ok(current),
        };
        let next = match step {
            Step::Done(value) => return Ok(value),
            Step::Rewritten(next) => next,
        };
        if next == current {
            if let Object::Expr(e) = &next {
                stamp(ctx, e, ctx.stamp_generation());
            }
            return Ok(next);
        }
        current = next;
        iterations += 1;
        if iterations > max_iterations {
            let sys = ctx.kernel().system();
            ctx.kernel().message(&sys.general, "itlim", &[Object::Integer(max_iterations as i64)]);
            return Ok(held(ctx, current));
        }
    }
}

/// `Hold(obj)`, stamped so it is not evaluated again
fn held(ctx: &ThreadContext, obj: Object) -> Object {
    let wrapped = ctx.kernel().system().hold(obj);
    if let Object::Expr(e) = &wrapped {
        stamp(ctx, e, ctx.stamp_generation());
    }
    wrapped
}

/// Mark `e` evaluated at `generation` unless local definitions appeared
/// meanwhile.
fn stamp(ctx: &ThreadContext, e: &Expr, generation: Option<u64>) {
    if let (Some(generation), Some(_)) = (generation, ctx.stamp_generation()) {
        e.mark_evaluated(generation);
    }
}

/// Next value of a symbol, or `None` when it has none
fn evaluate_symbol(ctx: &ThreadContext, sym: &Symbol) -> EvalResult<Option<Object>> {
    if sym.is_removed() {
        return Ok(None);
    }
    if let Some(value) = ctx.local_value(sym) {
        return Ok(Some(value));
    }
    if let Some(value) = sym.value() {
        return Ok(Some(value));
    }
    match sym.rules_snapshot(RuleCacheKind::Own) {
        Some(rules) => rules.find(ctx, &Object::Symbol(sym.clone())),
        None => Ok(None),
    }
}

/// One evaluation step of an expression
fn evaluate_expression(ctx: &ThreadContext, e: &Expr) -> EvalResult<Step> {
    let kernel = ctx.kernel();
    let sys = kernel.system();
    let generation = ctx.stamp_generation();
    let max_recursion = kernel.config().max_recursion;

    let (depth, _depth_guard) = ctx.enter();
    if depth > max_recursion {
        if depth > max_recursion.saturating_mul(2) {
            return Err(EvalError::RecursionLimit { depth: max_recursion });
        }
        let subject = Object::Expr(e.clone());
        if ctx.arm_reclim_guard() {
            kernel.message(&sys.general, "reclim", &[Object::Integer(max_recursion as i64)]);
            return Ok(Step::Done(held(ctx, subject)));
        }
        return Err(ctx.throw(held(ctx, subject)));
    }

    let head = evaluate(ctx, e.head().clone())?;
    let head_sym = head.as_symbol().cloned();
    let attrs = head_sym.as_ref().map_or(Attributes::empty(), Symbol::attributes);

    let mut changed = !head.ptr_eq(e.head());
    let mut items = Vec::with_capacity(e.length() + 1);
    items.push(head);
    for (i, arg) in e.args().iter().enumerate() {
        let value = if attrs.contains(Attributes::HOLD_ALL_COMPLETE) {
            arg.clone()
        } else if attrs.holds(i + 1) && !arg.has_head(&sys.evaluate) {
            arg.clone()
        } else {
            evaluate(ctx, arg.clone())?
        };
        changed |= !value.ptr_eq(arg);
        items.push(value);
    }
    let mut expr = if changed { Expr::from_items(items) } else { e.clone() };

    if !attrs.intersects(Attributes::SEQUENCE_HOLD | Attributes::HOLD_ALL_COMPLETE) {
        expr = normalize::splice_sequences(expr, sys);
    }
    if attrs.contains(Attributes::LISTABLE) {
        if let Some(threaded) = normalize::thread_listable(ctx, &expr)? {
            return Ok(Step::Rewritten(threaded));
        }
    }
    if attrs.contains(Attributes::FLAT) {
        expr = normalize::flatten(expr);
    }
    if attrs.contains(Attributes::ORDERLESS) {
        expr = normalize::sort_args(expr);
    }
    let subject = Object::Expr(expr.clone());

    // Symbols that may carry up definitions, each once
    let mut up_symbols: SmallVec<[Symbol; 4]> = SmallVec::new();
    if !attrs.contains(Attributes::HOLD_ALL_COMPLETE) {
        for arg in expr.args() {
            if let Some(sym) = arg.topmost_symbol() {
                if !up_symbols.contains(sym) {
                    up_symbols.push(sym.clone());
                }
            }
        }
    }

    for sym in &up_symbols {
        if let Some(rules) = sym.rules_snapshot(RuleCacheKind::Up) {
            if let Some(result) = rules.find(ctx, &subject)? {
                trace!(target: "pmath_core::eval", symbol = %sym, "up rule applied");
                return Ok(Step::Rewritten(result));
            }
        }
    }

    let (rule_symbol, cache) = match &head_sym {
        Some(sym) => (Some(sym.clone()), RuleCacheKind::Down),
        None => (expr.head().topmost_symbol().cloned(), RuleCacheKind::Sub),
    };
    if let Some(sym) = &rule_symbol {
        if cache == RuleCacheKind::Down {
            if let Some(rules) = ctx.local_rules(sym) {
                if let Some(result) = rules.find(ctx, &subject)? {
                    return Ok(Step::Rewritten(result));
                }
            }
        }
        if let Some(rules) = sym.rules_snapshot(cache) {
            if let Some(result) = rules.find(ctx, &subject)? {
                trace!(target: "pmath_core::eval", symbol = %sym, ?cache, "rule applied");
                return Ok(Step::Rewritten(result));
            }
        }
    }

    for sym in &up_symbols {
        let code = sym.native_code().up.clone();
        if let Some(code) = code {
            if let Some(result) = code.call(ctx, &expr)? {
                return Ok(Step::Rewritten(result));
            }
        }
    }
    if let Some(sym) = &rule_symbol {
        let code = match cache {
            RuleCacheKind::Down => sym.native_code().down.clone(),
            _ => sym.native_code().sub.clone(),
        };
        if let Some(code) = code {
            if let Some(result) = code.call(ctx, &expr)? {
                return Ok(Step::Rewritten(result));
            }
        }
    }

    stamp(ctx, &expr, generation);
    Ok(Step::Done(subject))
}

/// Evaluate without failing.
///
/// An uncaught throw yields `Hold(Throw(x))`, an abort yields `$Aborted`;
/// any other error is logged and the input is returned unevaluated.
pub fn evaluate_top(ctx: &ThreadContext, obj: Object) -> Object {
    let sys = ctx.kernel().system();
    match evaluate(ctx, obj.clone()) {
        Ok(value) => value,
        Err(EvalError::Thrown(value)) => {
            ctx.catch_exception();
            sys.hold(Object::call(&sys.throw, vec![value]))
        }
        Err(EvalError::Aborted) => Object::from(&sys.aborted),
        Err(err) => {
            warn!(target: "pmath_core::eval", error = %err, "evaluation failed");
            obj
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::eval::messages::MessageLog;
    use crate::backend::eval::native::CodeUsage;
    use crate::backend::kernel::Kernel;
    use crate::config::EvalConfig;

    #[test]
    fn test_atoms_are_stable() {
        let k = Kernel::new_default();
        let ctx = k.root_context();
        assert_eq!(evaluate(&ctx, Object::Integer(3)).unwrap(), Object::Integer(3));
        assert_eq!(evaluate(&ctx, Object::from("s")).unwrap(), Object::from("s"));
    }

    #[test]
    fn test_value_chain() {
        let k = Kernel::new_default();
        let ctx = k.root_context();
        let x = k.symbol("x");
        let y = k.symbol("y");
        x.set_value(Some(Object::from(&y))).unwrap();
        y.set_value(Some(Object::Integer(4))).unwrap();
        assert_eq!(evaluate(&ctx, Object::from(&x)).unwrap(), Object::Integer(4));
    }

    #[test]
    fn test_stable_expression_keeps_identity() {
        let k = Kernel::new_default();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let e = Object::call(&f, vec![Object::Integer(1)]);
        let out = evaluate(&ctx, e.clone()).unwrap();
        assert!(out.ptr_eq(&e), "unchanged expression is returned as is");
    }

    #[test]
    fn test_hold_keeps_arguments() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let x = k.symbol("x");
        x.set_value(Some(Object::Integer(1))).unwrap();
        let held_x = sys.hold(Object::from(&x));
        assert_eq!(evaluate(&ctx, held_x.clone()).unwrap(), held_x);

        let forced = sys.hold(Object::call(&sys.evaluate, vec![Object::from(&x)]));
        assert_eq!(evaluate(&ctx, forced).unwrap(), sys.hold(Object::Integer(1)));
    }

    #[test]
    fn test_sequence_spliced() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let e = Object::call(&f, vec![sys.sequence(vec![Object::Integer(1), Object::Integer(2)])]);
        let out = evaluate(&ctx, e).unwrap();
        assert_eq!(out, Object::call(&f, vec![Object::Integer(1), Object::Integer(2)]));
    }

    #[test]
    fn test_iteration_limit() {
        let log = Arc::new(MessageLog::new());
        let config = EvalConfig {
            max_iterations: 16,
            ..EvalConfig::default()
        };
        let k = Kernel::with_messages(config, Arc::clone(&log));
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        k.register(&f, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| {
            match call.args() {
                [Object::Integer(i)] => Ok(Some(Object::call(call.head().clone(), vec![Object::Integer(i + 1)]))),
                _ => Ok(None),
            }
        });
        let out = evaluate(&ctx, Object::call(&f, vec![Object::Integer(0)])).unwrap();
        assert!(out.has_head(&sys.hold));
        assert!(log.contains("General", "itlim"));
    }

    #[test]
    fn test_abort_is_reported_at_top() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        k.request_abort();
        let f = k.symbol("f");
        let out = evaluate_top(&ctx, Object::call(&f, vec![]));
        assert_eq!(out, Object::from(&sys.aborted));
        k.clear_abort();
    }

    #[test]
    fn test_uncaught_throw_at_top() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let out = evaluate_top(&ctx, Object::call(&sys.throw, vec![Object::Integer(1)]));
        assert_eq!(out, sys.hold(Object::call(&sys.throw, vec![Object::Integer(1)])));
        assert!(ctx.pending_exception().is_none());
    }
}
