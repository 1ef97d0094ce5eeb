//! Shared helpers for integration tests
//!
//! Arithmetic is host code: the kernel only evaluates, so the tests bind a
//! small `Plus`/`Times`/`Less`/`Greater` themselves.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::Arc;

use pmath_core::backend::*;
use pmath_core::EvalConfig;

pub struct TestKernel {
    pub kernel: Kernel,
    pub ctx: ThreadContext,
    pub log: Arc<MessageLog>,
}

impl TestKernel {
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        let log = Arc::new(MessageLog::new());
        let kernel = Kernel::with_messages(config, Arc::clone(&log));
        install_arithmetic(&kernel);
        let ctx = kernel.root_context();
        TestKernel { kernel, ctx, log }
    }

    pub fn sys(&self) -> &SystemSymbols {
        self.kernel.system()
    }

    pub fn sym(&self, name: &str) -> Symbol {
        self.kernel.symbol(name)
    }

    /// `Object::Symbol` for `name`
    pub fn atom(&self, name: &str) -> Object {
        Object::from(&self.kernel.symbol(name))
    }

    pub fn call(&self, head: &str, args: Vec<Object>) -> Object {
        Object::call(&self.kernel.symbol(head), args)
    }

    pub fn eval(&self, obj: Object) -> Object {
        self.ctx.evaluate(obj).expect("evaluation failed")
    }
}

/// Combine the integer arguments, keep the rest symbolic.
fn fold(call: &Expr, unit: i64, op: fn(i64, i64) -> Option<i64>) -> NativeResult {
    if let [single] = call.args() {
        return Ok(Some(single.clone()));
    }
    let mut acc = unit;
    let mut folded = 0;
    let mut rest = Vec::new();
    for arg in call.args() {
        match arg.as_integer().and_then(|n| op(acc, n)) {
            Some(v) => {
                acc = v;
                folded += 1;
            }
            None => rest.push(arg.clone()),
        }
    }
    if folded == 0 || (folded == 1 && acc != unit && !rest.is_empty()) {
        return Ok(None);
    }
    if rest.is_empty() {
        return Ok(Some(Object::Integer(acc)));
    }
    if acc != unit {
        rest.insert(0, Object::Integer(acc));
    }
    Ok(Some(match rest.len() {
        1 => rest.remove(0),
        _ => Object::call(call.head().clone(), rest),
    }))
}

fn compare(ctx: &ThreadContext, call: &Expr, want: Ordering) -> NativeResult {
    match call.args() {
        [a, b] if a.is_type(TypeMask::NUMBER) && b.is_type(TypeMask::NUMBER) => {
            Ok(Some(ctx.kernel().system().boolean(a.cmp(b) == want)))
        }
        _ => Ok(None),
    }
}

pub fn install_arithmetic(kernel: &Kernel) {
    let numeric = Attributes::FLAT | Attributes::ORDERLESS | Attributes::LISTABLE | Attributes::NUMERIC_FUNCTION;
    let plus = kernel.symbol("Plus");
    let times = kernel.symbol("Times");
    kernel.set_attributes(&plus, numeric).expect("Plus attributes");
    kernel.set_attributes(&times, numeric).expect("Times attributes");
    kernel.register(&plus, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| {
        fold(call, 0, i64::checked_add)
    });
    kernel.register(&times, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| {
        fold(call, 1, i64::checked_mul)
    });
    kernel.register(&kernel.symbol("Less"), CodeUsage::DownCall, |ctx: &ThreadContext, call: &Expr| {
        compare(ctx, call, Ordering::Less)
    });
    kernel.register(&kernel.symbol("Greater"), CodeUsage::DownCall, |ctx: &ThreadContext, call: &Expr| {
        compare(ctx, call, Ordering::Greater)
    });
}
