//! Pattern matcher behaviour seen through `match_pattern` and `apply_rule`

mod common;

use common::TestKernel;
use pmath_core::backend::*;

fn binding(b: &Bindings, sym: &Symbol) -> Object {
    b.get(sym).cloned().unwrap_or_else(|| panic!("{} not bound", sym))
}

#[test]
fn test_orderless_match_ignores_argument_order() {
    let t = TestKernel::new();
    let sys = t.sys();
    let h = t.sym("h");
    let (x, y) = (t.sym("x"), t.sym("y"));
    h.set_attributes(Attributes::ORDERLESS).unwrap();

    let pattern = Object::call(&h, vec![sys.named_blank_of(&x, &sys.string), sys.named_blank_of(&y, &sys.integer)]);
    for subject in [
        Object::call(&h, vec![Object::from("s"), Object::Integer(1)]),
        Object::call(&h, vec![Object::Integer(1), Object::from("s")]),
    ] {
        let b = match_pattern(&t.ctx, &subject, &pattern).unwrap().expect("orderless match");
        assert_eq!(binding(&b, &x), Object::from("s"));
        assert_eq!(binding(&b, &y), Object::Integer(1));
    }

    let wrong = Object::call(&h, vec![Object::Integer(1), Object::Integer(2)]);
    assert!(match_pattern(&t.ctx, &wrong, &pattern).unwrap().is_none());
}

#[test]
fn test_flat_groups_trailing_arguments() {
    let t = TestKernel::new();
    let sys = t.sys();
    let f = t.sym("f");
    let (x, y) = (t.sym("x"), t.sym("y"));
    f.set_attributes(Attributes::FLAT).unwrap();

    let subject = Object::call(&f, vec![t.atom("a"), t.atom("b"), t.atom("c")]);
    let pattern = Object::call(&f, vec![sys.named_blank(&x), sys.named_blank(&y)]);
    let b = match_pattern(&t.ctx, &subject, &pattern).unwrap().expect("flat match");
    assert_eq!(binding(&b, &x), t.atom("a"));
    assert_eq!(binding(&b, &y), Object::call(&f, vec![t.atom("b"), t.atom("c")]));
}

#[test]
fn test_flat_null_sequence_groups_trailing_arguments() {
    let t = TestKernel::new();
    let sys = t.sys();
    let f = t.sym("f");
    let (x, y) = (t.sym("x"), t.sym("y"));
    f.set_attributes(Attributes::FLAT).unwrap();
    let pattern = Object::call(&f, vec![sys.named_blank(&x), sys.named_blank_null_sequence(&y)]);

    let subject = Object::call(&f, vec![t.atom("a"), t.atom("b"), t.atom("c")]);
    let b = match_pattern(&t.ctx, &subject, &pattern).unwrap().expect("flat match");
    assert_eq!(binding(&b, &x), t.atom("a"));
    assert_eq!(binding(&b, &y), Object::call(&f, vec![t.atom("b"), t.atom("c")]));

    let lone = Object::call(&f, vec![t.atom("a")]);
    let b = match_pattern(&t.ctx, &lone, &pattern).unwrap().expect("empty run");
    assert_eq!(binding(&b, &x), t.atom("a"));
    let empty = binding(&b, &y);
    assert!(empty.is_sequence_marker());
    assert!(empty.args().is_empty());
}

#[test]
fn test_flat_rule_rewrites_contiguous_run() {
    let t = TestKernel::new();
    let cat = t.sym("cat");
    cat.set_attributes(Attributes::FLAT).unwrap();
    t.ctx
        .assign_delayed(Object::call(&cat, vec![t.atom("a"), t.atom("b")]), Object::from("ab"))
        .unwrap();

    let subject = Object::call(&cat, vec![t.atom("c"), t.atom("a"), t.atom("b"), t.atom("c")]);
    let out = t.eval(subject);
    assert_eq!(out, Object::call(&cat, vec![t.atom("c"), Object::from("ab"), t.atom("c")]));
}

#[test]
fn test_repeated_name_must_agree() {
    let t = TestKernel::new();
    let sys = t.sys();
    let x = t.sym("x");
    let pattern = t.call("p", vec![sys.named_blank(&x), sys.named_blank(&x)]);

    assert!(matches(&t.ctx, &t.call("p", vec![Object::Integer(1), Object::Integer(1)]), &pattern).unwrap());
    assert!(!matches(&t.ctx, &t.call("p", vec![Object::Integer(1), Object::Integer(2)]), &pattern).unwrap());
}

#[test]
fn test_sequences_longest_first_unless_shortest() {
    let t = TestKernel::new();
    let sys = t.sys();
    let (x, y) = (t.sym("x"), t.sym("y"));
    let subject = t.call("f", vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)]);
    let rhs = sys.list(vec![t.call("g", vec![Object::from(&x)]), t.call("g", vec![Object::from(&y)])]);

    let lhs = t.call("f", vec![sys.named_blank_sequence(&x), sys.named_blank_sequence(&y)]);
    let out = apply_rule(&t.ctx, &lhs, &rhs, &subject).unwrap().expect("match");
    assert_eq!(out.to_string(), "{g(1, 2), g(3)}");

    let lhs = t.call("f", vec![sys.shortest(sys.named_blank_sequence(&x)), sys.named_blank_sequence(&y)]);
    let out = apply_rule(&t.ctx, &lhs, &rhs, &subject).unwrap().expect("match");
    assert_eq!(out.to_string(), "{g(1), g(2, 3)}");
}

#[test]
fn test_null_sequence_matches_nothing() {
    let t = TestKernel::new();
    let sys = t.sys();
    let x = t.sym("x");
    let lhs = t.call("f", vec![sys.named_blank_null_sequence(&x)]);
    let rhs = t.call("g", vec![Object::from(&x)]);

    let out = apply_rule(&t.ctx, &lhs, &rhs, &t.call("f", vec![])).unwrap();
    assert_eq!(out, Some(t.call("g", vec![])));
    assert!(!matches(&t.ctx, &t.call("f", vec![]), &t.call("f", vec![sys.blank_sequence()])).unwrap());
}

#[test]
fn test_alternatives_and_except() {
    let t = TestKernel::new();
    let sys = t.sys();
    let either = sys.alternatives(vec![t.atom("a"), sys.blank_of(&sys.integer)]);
    assert!(matches(&t.ctx, &t.atom("a"), &either).unwrap());
    assert!(matches(&t.ctx, &Object::Integer(9), &either).unwrap());
    assert!(!matches(&t.ctx, &t.atom("b"), &either).unwrap());

    let nonzero = sys.except_then(Object::Integer(0), sys.blank_of(&sys.integer));
    assert!(matches(&t.ctx, &Object::Integer(3), &nonzero).unwrap());
    assert!(!matches(&t.ctx, &Object::Integer(0), &nonzero).unwrap());
    assert!(!matches(&t.ctx, &Object::from("3"), &nonzero).unwrap());
}

#[test]
fn test_repeated_counts() {
    let t = TestKernel::new();
    let sys = t.sys();
    let ints = |n: i64| t.call("f", (1..=n).map(Object::Integer).collect());

    let any = t.call("f", vec![sys.repeated(sys.blank_of(&sys.integer))]);
    assert!(matches(&t.ctx, &ints(3), &any).unwrap());
    assert!(!matches(&t.ctx, &ints(0), &any).unwrap());
    assert!(!matches(&t.ctx, &t.call("f", vec![Object::Integer(1), Object::from("a")]), &any).unwrap());

    let two_or_three = t.call("f", vec![sys.repeated_range(sys.blank_of(&sys.integer), 2, Some(3))]);
    assert!(!matches(&t.ctx, &ints(1), &two_or_three).unwrap());
    assert!(matches(&t.ctx, &ints(2), &two_or_three).unwrap());
    assert!(!matches(&t.ctx, &ints(4), &two_or_three).unwrap());
}

#[test]
fn test_optional_defaults() {
    let t = TestKernel::new();
    let sys = t.sys();
    let f = t.sym("f");
    let (x, y) = (t.sym("x"), t.sym("y"));

    let explicit = Object::call(&f, vec![sys.named_blank(&x), sys.optional_with(sys.named_blank(&y), Object::Integer(0))]);
    let b = match_pattern(&t.ctx, &Object::call(&f, vec![Object::Integer(5)]), &explicit).unwrap().expect("match");
    assert_eq!(binding(&b, &y), Object::Integer(0));
    let b = match_pattern(&t.ctx, &Object::call(&f, vec![Object::Integer(5), Object::Integer(6)]), &explicit)
        .unwrap()
        .expect("match");
    assert_eq!(binding(&b, &y), Object::Integer(6));

    // Default(f) = 7
    t.ctx
        .set_default(&f, Object::call(&sys.default, vec![Object::from(&f)]), Object::Integer(7))
        .unwrap();
    let implicit = Object::call(&f, vec![sys.named_blank(&x), sys.optional(sys.named_blank(&y))]);
    let b = match_pattern(&t.ctx, &Object::call(&f, vec![Object::Integer(5)]), &implicit).unwrap().expect("match");
    assert_eq!(binding(&b, &y), Object::Integer(7));
}

#[test]
fn test_condition_sees_bindings() {
    let t = TestKernel::new();
    let sys = t.sys();
    let x = t.sym("x");
    let positive = sys.condition(sys.named_blank(&x), t.call("Greater", vec![Object::from(&x), Object::Integer(0)]));
    assert!(matches(&t.ctx, &Object::Integer(2), &positive).unwrap());
    assert!(!matches(&t.ctx, &Object::Integer(-2), &positive).unwrap());
    assert!(!matches(&t.ctx, &t.atom("z"), &positive).unwrap(), "undecided test fails");
}

#[test]
fn test_pattern_test_calls_predicate() {
    let t = TestKernel::new();
    let sys = t.sys();
    let even = t.sym("EvenQ");
    t.kernel.register(&even, CodeUsage::DownCall, |ctx: &ThreadContext, call: &Expr| {
        Ok(Some(ctx.kernel().system().boolean(matches!(call.args(), [Object::Integer(n)] if n % 2 == 0))))
    });

    let pattern = sys.pattern_test(sys.blank(), Object::from(&even));
    assert!(matches(&t.ctx, &Object::Integer(4), &pattern).unwrap());
    assert!(!matches(&t.ctx, &Object::Integer(5), &pattern).unwrap());
}

#[test]
fn test_literal_and_hold_pattern() {
    let t = TestKernel::new();
    let sys = t.sys();
    let blank = sys.blank();

    let literal = sys.literal(blank.clone());
    assert!(matches(&t.ctx, &blank, &literal).unwrap());
    assert!(!matches(&t.ctx, &Object::Integer(1), &literal).unwrap());

    let held = sys.hold_pattern(t.call("f", vec![sys.blank()]));
    assert!(matches(&t.ctx, &t.call("f", vec![Object::Integer(1)]), &held).unwrap());
}
