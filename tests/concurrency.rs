//! Evaluation from several threads over one kernel

mod common;

use std::thread;
use std::time::Duration;

use common::TestKernel;
use pmath_core::backend::*;
use pmath_core::EvalConfig;

#[test]
fn test_readers_never_see_torn_values() {
    let t = TestKernel::new();
    let v = t.sym("v");
    let sys = t.sys().clone();
    t.ctx
        .assign(Object::from(&v), sys.list(vec![Object::Integer(0), Object::Integer(0)]))
        .unwrap();

    thread::scope(|s| {
        let writer_ctx = t.kernel.root_context();
        let writer_sys = sys.clone();
        let target = v.clone();
        s.spawn(move || {
            for i in 1..=500 {
                let pair = writer_sys.list(vec![Object::Integer(i), Object::Integer(i)]);
                writer_ctx.assign(Object::from(&target), pair).unwrap();
            }
        });

        for _ in 0..2 {
            let reader_ctx = t.kernel.root_context();
            let target = v.clone();
            s.spawn(move || {
                for _ in 0..500 {
                    let value = reader_ctx.evaluate(Object::from(&target)).unwrap();
                    let args = value.args();
                    assert_eq!(args.len(), 2);
                    assert_eq!(args[0], args[1], "torn value {}", value);
                }
            });
        }
    });

    let last = t.eval(Object::from(&v));
    assert_eq!(last, sys.list(vec![Object::Integer(500), Object::Integer(500)]));
}

#[test]
fn test_shared_expression_follows_each_context_locals() {
    let t = TestKernel::new();
    let x = t.sym("x");
    let expr = t.call("f", vec![Object::from(&x)]);

    let child = t.ctx.spawn_child();
    child.set_local(&x, Object::Integer(5));

    assert_eq!(t.eval(expr.clone()), expr, "x has no value in the root context");
    let five = t.call("f", vec![Object::Integer(5)]);
    assert_eq!(child.evaluate(expr.clone()).unwrap(), five, "same handle, child locals apply");
    assert_eq!(t.eval(expr.clone()), expr);

    let sibling = t.ctx.spawn_child();
    sibling.set_local(&x, Object::Integer(7));
    let results = sibling.parallel_map(&[expr.clone(), expr.clone()]).unwrap();
    assert_eq!(results, vec![t.call("f", vec![Object::Integer(7)]); 2]);
}

#[test]
fn test_parallel_map_sees_parent_locals() {
    let t = TestKernel::new();
    let sys = t.sys();
    let (x, offset) = (t.sym("x"), t.sym("offset"));
    t.ctx.set_local(&offset, Object::Integer(100));

    // shift(x_) := x + offset
    let lhs = t.call("shift", vec![sys.named_blank(&x)]);
    t.ctx
        .assign_delayed(lhs, t.call("Plus", vec![Object::from(&x), Object::from(&offset)]))
        .unwrap();

    let items: Vec<Object> = (0..16).map(|i| t.call("shift", vec![Object::Integer(i)])).collect();
    let out = t.ctx.parallel_map(&items).unwrap();
    let expected: Vec<Object> = (100..116).map(Object::Integer).collect();
    assert_eq!(out, expected);

    // siblings and the global value are untouched
    assert_eq!(t.kernel.root_context().evaluate(Object::from(&offset)).unwrap(), Object::from(&offset));
}

#[test]
fn test_parallel_emits_reach_parent_gather() {
    let t = TestKernel::new();
    let sys = t.sys();
    let items: Vec<Object> = (1..=8).map(|i| Object::call(&sys.emit, vec![Object::Integer(i)])).collect();

    t.ctx.gather_begin(sys.blank());
    t.ctx.parallel_map(&items).unwrap();
    let mut collected = t.ctx.gather_end();
    collected.sort();
    let expected: Vec<Object> = (1..=8).map(Object::Integer).collect();
    assert_eq!(collected, expected);
}

#[test]
fn test_spawned_tasks_complete() {
    let config = EvalConfig {
        worker_threads: 2,
        ..EvalConfig::default()
    };
    let t = TestKernel::with_config(config);
    let handles: Vec<TaskHandle> = (1..=6)
        .map(|i| t.ctx.spawn_task(t.call("Times", vec![Object::Integer(i), Object::Integer(i)])))
        .collect();
    let results: Vec<Object> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
    let expected: Vec<Object> = (1..=6).map(|i| Object::Integer(i * i)).collect();
    assert_eq!(results, expected);
}

#[test]
fn test_abort_from_another_thread() {
    let config = EvalConfig {
        max_iterations: 1 << 40,
        ..EvalConfig::default()
    };
    let t = TestKernel::with_config(config);
    let spin = t.sym("spin");
    t.kernel.register(&spin, CodeUsage::DownCall, |_: &ThreadContext, call: &Expr| match call.args() {
        [Object::Integer(i)] => Ok(Some(Object::call(call.head().clone(), vec![Object::Integer(i.wrapping_add(1))]))),
        _ => Ok(None),
    });

    let worker = t.kernel.root_context();
    let subject = Object::call(&spin, vec![Object::Integer(0)]);
    let running = thread::spawn(move || worker.evaluate_top(subject));

    thread::sleep(Duration::from_millis(20));
    t.kernel.request_abort();
    let out = running.join().unwrap();
    assert_eq!(out, Object::from(&t.sys().aborted));

    t.kernel.clear_abort();
    assert_eq!(t.eval(t.call("Plus", vec![Object::Integer(1), Object::Integer(2)])), Object::Integer(3));
}

#[test]
fn test_pause_is_interrupted_by_abort() {
    let t = TestKernel::new();
    let worker = t.kernel.root_context();
    let sleeper = thread::spawn(move || worker.pause(Duration::from_secs(30)));

    thread::sleep(Duration::from_millis(20));
    t.kernel.request_abort();
    assert!(matches!(sleeper.join().unwrap(), Err(EvalError::Aborted)));
    t.kernel.clear_abort();
}
