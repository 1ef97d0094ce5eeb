//! Substitution of bindings into templates
//!
//! Bound sequence markers are spliced into the enclosing argument list, so a
//! variable bound by `x__` to `PatternSequence(a, b)` turns `g(x, c)` into
//! `g(a, b, c)`. Subtrees without bound variables are shared, not copied.

use crate::backend::models::{Bindings, Expr, Object};

/// `template` with every bound variable replaced by its value.
pub fn substitute(template: &Object, bindings: &Bindings) -> Object {
    if bindings.is_empty() {
        return template.clone();
    }
    substitute_changed(template, bindings).unwrap_or_else(|| template.clone())
}

fn substitute_changed(template: &Object, bindings: &Bindings) -> Option<Object> {
    match template {
        Object::Symbol(s) => bindings.get(s).cloned(),
        Object::Expr(e) => {
            let items = e.items();
            let first_change = items
                .iter()
                .enumerate()
                .find_map(|(i, item)| substitute_changed(item, bindings).map(|new| (i, new)))?;

            let (index, value) = first_change;
            let mut out = Vec::with_capacity(items.len());
            out.extend(items[..index].iter().cloned());
            push_item(&mut out, index, value);
            for (i, item) in items.iter().enumerate().skip(index + 1) {
                let value = substitute_changed(item, bindings).unwrap_or_else(|| item.clone());
                push_item(&mut out, i, value);
            }
            Some(Object::Expr(Expr::from_items(out)))
        }
        _ => None,
    }
}

fn push_item(out: &mut Vec<Object>, index: usize, value: Object) {
    if index > 0 && value.is_sequence_marker() {
        out.extend(value.args().iter().cloned());
    } else {
        out.push(value);
    }
}
