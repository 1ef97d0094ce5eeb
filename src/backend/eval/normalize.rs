//! Argument normalization driven by head attributes
//!
//! These run after the arguments are evaluated and before any rule is
//! tried, so rules see `Sequence` spliced, Flat calls flattened and
//! Orderless arguments in canonical order.

use tracing::trace;

use super::errors::EvalResult;
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::{Expr, Object};
use crate::backend::thread::ThreadContext;

/// Splice `Sequence(...)` arguments into the argument list.
pub fn splice_sequences(expr: Expr, sys: &SystemSymbols) -> Expr {
    if !expr.args().iter().any(|a| a.has_head(&sys.sequence)) {
        return expr;
    }
    expr.with_items_mut(|items| {
        let old = std::mem::take(items);
        for item in old {
            match item {
                Object::Expr(e) if e.head().is_symbol(&sys.sequence) => items.extend(e.into_items().into_iter().skip(1)),
                other => items.push(other),
            }
        }
    })
}

/// Inline arguments that are calls of the same head, recursively.
pub fn flatten(expr: Expr) -> Expr {
    let head = expr.head().clone();
    let nested = |a: &Object| matches!(a, Object::Expr(e) if *e.head() == head);
    if !expr.args().iter().any(nested) {
        return expr;
    }
    let mut items = Vec::with_capacity(expr.length() + 1);
    items.push(head.clone());
    push_flat(&head, expr.args(), &mut items);
    Expr::from_items(items)
}

fn push_flat(head: &Object, args: &[Object], out: &mut Vec<Object>) {
    for arg in args {
        match arg {
            Object::Expr(e) if e.head() == head => push_flat(head, e.args(), out),
            other => out.push(other.clone()),
        }
    }
}

/// Sort the arguments by the global object order.
pub fn sort_args(expr: Expr) -> Expr {
    if expr.args().windows(2).all(|w| w[0] <= w[1]) {
        return expr;
    }
    expr.with_items_mut(|items| items[1..].sort())
}

/// Thread a Listable call over its `List` arguments:
/// `f({a, b}, c)` becomes `{f(a, c), f(b, c)}`.
///
/// Lists of different lengths send `Thread::tdlen` and leave the call alone.
pub fn thread_listable(ctx: &ThreadContext, expr: &Expr) -> EvalResult<Option<Object>> {
    let sys = ctx.kernel().system();
    let mut len = None;
    for arg in expr.args() {
        if let Object::Expr(list) = arg {
            if list.head().is_symbol(&sys.list) {
                match len {
                    None => len = Some(list.length()),
                    Some(n) if n != list.length() => {
                        ctx.kernel().message(&sys.thread, "tdlen", &[Object::Expr(expr.clone())]);
                        return Ok(None);
                    }
                    Some(_) => {}
                }
            }
        }
    }
    let Some(len) = len else {
        return Ok(None);
    };
    trace!(target: "pmath_core::eval", len, "threading listable call");
    let mut rows = Vec::with_capacity(len);
    for i in 1..=len {
        let row = expr.args().iter().map(|arg| match arg {
            Object::Expr(list) if list.head().is_symbol(&sys.list) => list.get_item(i).clone(),
            other => other.clone(),
        });
        rows.push(Object::call(expr.head().clone(), row.collect::<Vec<_>>()));
    }
    Ok(Some(sys.list(rows)))
}
