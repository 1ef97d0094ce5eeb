//! Specificity order of patterns
//!
//! Rule lists keep more specific left-hand sides first. Instead of a
//! pairwise comparison the order is captured in a key: a pre-order walk of
//! the pattern where every node contributes a class code and an `END`
//! marker. Keys compare lexicographically, so the first differing node
//! decides:
//!
//! constants < calls < `_h` < `_` < `Except` < alternatives < sequences of
//! increasing generality < `Optional` < `Repeated`.
//!
//! A `Condition`/`PatternTest` wrapper inserts `COND` right after the first
//! code of the wrapped key, which sorts a conditioned pattern just before
//! its unconditioned form. A pattern name that occurs more than once does
//! the same with a code that shrinks as the count grows, so `f(x_, x_)`
//! sorts before `f(x_, y_)`. Names themselves never affect the order.

use smallvec::SmallVec;

use super::{classify, is_literal, PatternKind};
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::Object;
use crate::backend::symbol::Symbol;

/// Pattern names of a left-hand side with their occurrence counts, in
/// order of first occurrence
pub type PatternNames = SmallVec<[(Symbol, usize); 4]>;

const COND: u8 = 0;
// 1..=3 are `END - n` for a name occurring n (at most 4) times
const END: u8 = 5;
const CONST: u8 = 6;
const CALL: u8 = 7;
const TYPED_BLANK: u8 = 8;
const BLANK: u8 = 9;
const EXCEPT: u8 = 10;
const ALTERNATIVES: u8 = 11;
const SEQUENCE: u8 = 12;
const TYPED_BLANK_SEQ: u8 = 13;
const BLANK_SEQ: u8 = 14;
const TYPED_BLANK_NULL_SEQ: u8 = 15;
const BLANK_NULL_SEQ: u8 = 16;
const OPTIONAL: u8 = 17;
const REPEATED: u8 = 18;

/// Sort key of a left-hand side; smaller is more specific
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SpecificityKey(SmallVec<[u8; 16]>);

pub fn specificity_key(pat: &Object, sys: &SystemSymbols) -> SpecificityKey {
    let names = pattern_names(pat, sys);
    let mut key = SmallVec::new();
    push_key(pat, sys, &names, &mut key);
    SpecificityKey(key)
}

pub fn pattern_names(pat: &Object, sys: &SystemSymbols) -> PatternNames {
    let mut names = PatternNames::new();
    collect_names(pat, sys, &mut names);
    names
}

fn collect_names(obj: &Object, sys: &SystemSymbols, names: &mut PatternNames) {
    let Object::Expr(e) = obj else {
        return;
    };
    if e.head().is_symbol(&sys.pattern) {
        if let [Object::Symbol(name), p] = e.args() {
            match names.iter_mut().find(|(n, _)| n == name) {
                Some((_, count)) => *count += 1,
                None => names.push((name.clone(), 1)),
            }
            collect_names(p, sys, names);
            return;
        }
    }
    for item in e.items() {
        collect_names(item, sys, names);
    }
}

fn occurrences(names: &PatternNames, name: &Symbol) -> usize {
    names.iter().find(|(n, _)| n == name).map_or(0, |(_, c)| *c)
}

/// True if `a` and `b` differ only by a consistent renaming of their
/// pattern names. `names_a` and `names_b` come from [`pattern_names`].
pub fn alpha_equivalent(a: &Object, names_a: &PatternNames, b: &Object, names_b: &PatternNames) -> bool {
    match (a, b) {
        (Object::Symbol(x), Object::Symbol(y)) => {
            let i = names_a.iter().position(|(n, _)| n == x);
            let j = names_b.iter().position(|(n, _)| n == y);
            match (i, j) {
                (None, None) => x == y,
                (i, j) => i == j,
            }
        }
        (Object::Expr(x), Object::Expr(y)) => {
            x.length() == y.length()
                && x.items()
                    .iter()
                    .zip(y.items())
                    .all(|(p, q)| alpha_equivalent(p, names_a, q, names_b))
        }
        _ => a == b,
    }
}

fn leaf(key: &mut SmallVec<[u8; 16]>, code: u8) {
    key.push(code);
    key.push(END);
}

fn push_key(pat: &Object, sys: &SystemSymbols, names: &PatternNames, key: &mut SmallVec<[u8; 16]>) {
    match classify(pat, sys) {
        PatternKind::Atom(_) | PatternKind::Literal(_) => leaf(key, CONST),
        PatternKind::Blank(h) => leaf(key, if h.is_some() { TYPED_BLANK } else { BLANK }),
        PatternKind::BlankSequence(h) => leaf(key, if h.is_some() { TYPED_BLANK_SEQ } else { BLANK_SEQ }),
        PatternKind::BlankNullSequence(h) => {
            leaf(key, if h.is_some() { TYPED_BLANK_NULL_SEQ } else { BLANK_NULL_SEQ })
        }
        PatternKind::Named(name, p) => {
            let at = key.len();
            push_key(p, sys, names, key);
            let count = occurrences(names, name);
            if count > 1 {
                key.insert(at + 1, END - count.min(4) as u8);
            }
        }
        PatternKind::Hold(p) | PatternKind::Longest(p) | PatternKind::Shortest(p) => push_key(p, sys, names, key),
        PatternKind::Condition(p, _) | PatternKind::Test(p, _) => {
            let at = key.len();
            push_key(p, sys, names, key);
            key.insert(at + 1, COND);
        }
        PatternKind::Except(_, _) => leaf(key, EXCEPT),
        PatternKind::Alternatives(_) => leaf(key, ALTERNATIVES),
        PatternKind::Sequence(ps) => {
            key.push(SEQUENCE);
            for p in ps {
                push_key(p, sys, names, key);
            }
            key.push(END);
        }
        PatternKind::Optional(p, _) => {
            key.push(OPTIONAL);
            push_key(p, sys, names, key);
            key.push(END);
        }
        PatternKind::Repeated(p, _, _) => {
            key.push(REPEATED);
            push_key(p, sys, names, key);
            key.push(END);
        }
        PatternKind::Function(e) => {
            if is_literal(pat, sys) {
                leaf(key, CONST);
                return;
            }
            key.push(CALL);
            for item in e.items() {
                push_key(item, sys, names, key);
            }
            key.push(END);
        }
    }
}

/// Order two patterns by specificity.
pub fn pattern_compare(a: &Object, b: &Object, sys: &SystemSymbols) -> std::cmp::Ordering {
    specificity_key(a, sys).cmp(&specificity_key(b, sys))
}
