//! Global total order over objects
//!
//! Used to canonically sort the arguments of Orderless heads. Ranks by type
//! first: magic < numbers < strings < symbols < custom < expressions.
//! Numbers compare by value with integers before floats of equal value;
//! expressions compare by length, then head, then arguments left to right.
//! The order agrees with structural equality: `cmp` is `Equal` exactly when
//! `==` holds.

use std::cmp::Ordering;

use super::object::Object;

fn compare_numbers(a: &Object, b: &Object) -> Ordering {
    match (a, b) {
        (Object::Integer(x), Object::Integer(y)) => x.cmp(y),
        (Object::Float(x), Object::Float(y)) => x.total_cmp(y),
        (Object::Integer(x), Object::Float(y)) => (*x as f64).total_cmp(y).then(Ordering::Less),
        (Object::Float(x), Object::Integer(y)) => x.total_cmp(&(*y as f64)).then(Ordering::Greater),
        _ => Ordering::Equal,
    }
}

impl Ord for Object {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.type_of().rank().cmp(&other.type_of().rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Object::Magic(a), Object::Magic(b)) => a.cmp(b),
            (Object::String(a), Object::String(b)) => a.cmp(b),
            (Object::Symbol(a), Object::Symbol(b)) => a
                .name()
                .cmp(b.name())
                .then_with(|| a.id().cmp(&b.id())),
            (Object::Custom(a), Object::Custom(b)) => {
                if a.equals(b.as_ref()) {
                    return Ordering::Equal;
                }
                a.type_name()
                    .cmp(b.type_name())
                    .then_with(|| a.hash_code().cmp(&b.hash_code()))
                    .then_with(|| {
                        let pa = std::sync::Arc::as_ptr(a) as *const () as usize;
                        let pb = std::sync::Arc::as_ptr(b) as *const () as usize;
                        pa.cmp(&pb)
                    })
            }
            (Object::Expr(a), Object::Expr(b)) => {
                if crate::backend::models::Expr::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.length()
                    .cmp(&b.length())
                    .then_with(|| a.items().cmp(b.items()))
            }
            _ => compare_numbers(self, other),
        }
    }
}

impl PartialOrd for Object {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::models::Expr;

    #[test]
    fn test_numbers_before_strings() {
        let mut items = vec![
            Object::from("b"),
            Object::Integer(3),
            Object::Float(1.5),
            Object::from("a"),
            Object::Integer(-2),
        ];
        items.sort();
        assert_eq!(
            items,
            vec![
                Object::Integer(-2),
                Object::Float(1.5),
                Object::Integer(3),
                Object::from("a"),
                Object::from("b"),
            ]
        );
    }

    #[test]
    fn test_integer_before_equal_float() {
        assert_eq!(Object::Integer(2).cmp(&Object::Float(2.0)), Ordering::Less);
        assert_eq!(Object::Float(2.0).cmp(&Object::Integer(2)), Ordering::Greater);
    }

    #[test]
    fn test_shorter_expressions_first() {
        let short = Object::call(Object::Integer(9), vec![Object::Integer(1)]);
        let long = Object::call(Object::Integer(0), vec![Object::Integer(1), Object::Integer(2)]);
        assert!(short < long);
        assert!(Object::from("zzz") < short, "atoms sort before expressions");
    }

    #[test]
    fn test_order_agrees_with_equality() {
        let a = Object::Expr(Expr::call(Object::Integer(0), vec![Object::from("x")]));
        let b = Object::Expr(Expr::call(Object::Integer(0), vec![Object::from("x")]));
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
    }
}
