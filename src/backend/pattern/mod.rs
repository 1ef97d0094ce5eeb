//! Pattern matching
//!
//! Patterns are ordinary expressions whose heads are the pattern symbols of
//! the kernel (`Blank`, `Pattern`, `Condition`, ...). This module classifies
//! pattern syntax, computes how many arguments each sub-pattern can consume,
//! orders patterns by specificity and runs the backtracking matcher.
//!
//! # Architecture
//!
//! - [`classify`] turns a pattern object into a [`PatternKind`] view.
//! - [`analyse`] computes the `{min, max}` argument range of a sub-pattern
//!   plus the enumeration policy (`longest`, `prefer_nonempty`,
//!   `no_sequence`).
//! - [`compare`] derives a specificity key used to order rule lists.
//! - [`matcher`] performs the search with explicit continuations so every
//!   choice point can be revisited when a later slot fails.
//! - [`replace`] substitutes bindings into right-hand sides.

pub mod analyse;
pub mod builders;
pub mod compare;
pub mod matcher;
pub mod replace;

use std::fmt;

pub use analyse::{analyse, SizeInfo, UNBOUNDED};
pub use compare::{specificity_key, SpecificityKey};
pub use matcher::{apply_rule, match_pattern, matches};
pub use replace::substitute;

use crate::backend::kernel::SystemSymbols;
use crate::backend::models::{Expr, Object};
use crate::backend::symbol::{Attributes, Symbol};

/// Construction-time pattern problems, reported when a rule is defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// `Repeated` around a pattern that can match zero arguments
    NestedRepeated(String),
    /// Unparseable or empty repetition range
    InvalidRange(String),
    /// `Pattern(name, p)` whose name is not a symbol
    InvalidName(String),
    /// A definition left-hand side without a symbol to attach the rule to
    NoTarget(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::NestedRepeated(p) => write!(f, "Repeated pattern {} can match an empty sequence", p),
            PatternError::InvalidRange(p) => write!(f, "Invalid repetition range in {}", p),
            PatternError::InvalidName(p) => write!(f, "Pattern name must be a symbol in {}", p),
            PatternError::NoTarget(p) => write!(f, "No symbol to attach a definition for {}", p),
        }
    }
}

impl std::error::Error for PatternError {}

/// Syntactic view of one pattern node
#[derive(Debug, Clone, Copy)]
pub enum PatternKind<'a> {
    /// `_` or `_h`
    Blank(Option<&'a Object>),
    /// `__` or `__h`
    BlankSequence(Option<&'a Object>),
    /// `___` or `___h`
    BlankNullSequence(Option<&'a Object>),
    /// `Pattern(name, p)`
    Named(&'a Symbol, &'a Object),
    /// `Condition(p, test)`
    Condition(&'a Object, &'a Object),
    /// `PatternTest(p, f)`
    Test(&'a Object, &'a Object),
    Alternatives(&'a [Object]),
    /// `Repeated(p, range)` with an inclusive count range
    Repeated(&'a Object, usize, usize),
    /// `Optional(p[, default])`
    Optional(&'a Object, Option<&'a Object>),
    /// `HoldPattern(p)`
    Hold(&'a Object),
    Longest(&'a Object),
    Shortest(&'a Object),
    /// `Literal(x)`: match `x` verbatim
    Literal(&'a Object),
    /// `PatternSequence(p...)`
    Sequence(&'a [Object]),
    /// `Except(no[, p])`
    Except(&'a Object, Option<&'a Object>),
    /// Any other expression, matched structurally
    Function(&'a Expr),
    /// Any other atom, matched by equality
    Atom(&'a Object),
}

/// Inclusive repetition range of `Repeated(p, {min, max})`
pub(crate) fn repeat_range(bounds: Option<&Object>, sys: &SystemSymbols) -> Option<(usize, usize)> {
    let bound = |o: &Object| -> Option<usize> {
        match o {
            Object::Integer(n) if *n >= 0 => Some(*n as usize),
            Object::Symbol(s) if *s == sys.infinity || *s == sys.automatic => Some(UNBOUNDED),
            _ => None,
        }
    };
    let (min, max) = match bounds {
        None => (1, UNBOUNDED),
        Some(Object::Integer(n)) if *n >= 0 => (1, *n as usize),
        Some(Object::Expr(e)) if e.head().is_symbol(&sys.list) || e.head().is_symbol(&sys.range) => {
            match e.args() {
                [n] => {
                    let n = bound(n)?;
                    (n, n)
                }
                [lo, hi] => (bound(lo)?, bound(hi)?),
                _ => return None,
            }
        }
        _ => return None,
    };
    (min <= max).then_some((min, max))
}

/// Classify `pat` against the kernel's pattern symbols.
///
/// Malformed pattern forms (wrong arity, non-symbol names) fall back to
/// structural matching.
pub fn classify<'a>(pat: &'a Object, sys: &SystemSymbols) -> PatternKind<'a> {
    let Object::Expr(e) = pat else {
        return PatternKind::Atom(pat);
    };
    let Object::Symbol(head) = e.head() else {
        return PatternKind::Function(e);
    };
    let args = e.args();
    let kind = if *head == sys.blank {
        match args {
            [] => Some(PatternKind::Blank(None)),
            [h] => Some(PatternKind::Blank(Some(h))),
            _ => None,
        }
    } else if *head == sys.blank_sequence {
        match args {
            [] => Some(PatternKind::BlankSequence(None)),
            [h] => Some(PatternKind::BlankSequence(Some(h))),
            _ => None,
        }
    } else if *head == sys.blank_null_sequence {
        match args {
            [] => Some(PatternKind::BlankNullSequence(None)),
            [h] => Some(PatternKind::BlankNullSequence(Some(h))),
            _ => None,
        }
    } else if *head == sys.pattern {
        match args {
            [Object::Symbol(name), p] => Some(PatternKind::Named(name, p)),
            _ => None,
        }
    } else if *head == sys.condition {
        match args {
            [p, test] => Some(PatternKind::Condition(p, test)),
            _ => None,
        }
    } else if *head == sys.pattern_test {
        match args {
            [p, f] => Some(PatternKind::Test(p, f)),
            _ => None,
        }
    } else if *head == sys.alternatives {
        Some(PatternKind::Alternatives(args))
    } else if *head == sys.repeated {
        match args {
            [p] => Some(PatternKind::Repeated(p, 1, UNBOUNDED)),
            [p, bounds] => repeat_range(Some(bounds), sys).map(|(lo, hi)| PatternKind::Repeated(p, lo, hi)),
            _ => None,
        }
    } else if *head == sys.optional {
        match args {
            [p] => Some(PatternKind::Optional(p, None)),
            [p, d] => Some(PatternKind::Optional(p, Some(d))),
            _ => None,
        }
    } else if *head == sys.hold_pattern {
        match args {
            [p] => Some(PatternKind::Hold(p)),
            _ => None,
        }
    } else if *head == sys.longest {
        match args {
            [p] => Some(PatternKind::Longest(p)),
            _ => None,
        }
    } else if *head == sys.shortest {
        match args {
            [p] => Some(PatternKind::Shortest(p)),
            _ => None,
        }
    } else if *head == sys.literal {
        match args {
            [x] => Some(PatternKind::Literal(x)),
            _ => None,
        }
    } else if *head == sys.pattern_sequence {
        Some(PatternKind::Sequence(args))
    } else if *head == sys.except {
        match args {
            [no] => Some(PatternKind::Except(no, None)),
            [no, p] => Some(PatternKind::Except(no, Some(p))),
            _ => None,
        }
    } else {
        None
    };
    kind.unwrap_or(PatternKind::Function(e))
}

/// True if `obj` contains no pattern syntax and no Flat/Orderless call, so
/// that matching it reduces to structural equality.
pub fn is_literal(obj: &Object, sys: &SystemSymbols) -> bool {
    match obj {
        Object::Expr(e) => {
            if let Object::Symbol(h) = e.head() {
                if sys.is_pattern_head(h) || h.has_attribute(Attributes::FLAT | Attributes::ORDERLESS) {
                    return false;
                }
            }
            e.items().iter().all(|item| is_literal(item, sys))
        }
        _ => true,
    }
}

/// The constant dispatch key of a rule's left-hand side: the outermost head
/// for calls, the object itself for atoms. `None` when the outermost
/// structure is itself a pattern (e.g. `x_` or `_(1)`).
pub fn dispatch_key(lhs: &Object, sys: &SystemSymbols) -> Option<Object> {
    match classify(lhs, sys) {
        PatternKind::Hold(p) | PatternKind::Condition(p, _) | PatternKind::Named(_, p) => dispatch_key(p, sys),
        PatternKind::Literal(x) => Some(subject_key(x).clone()),
        PatternKind::Function(e) => is_literal(e.head(), sys).then(|| e.head().clone()),
        PatternKind::Atom(a) => Some(a.clone()),
        _ => None,
    }
}

/// The dispatch key of a subject: its head for calls, itself otherwise.
#[inline]
pub fn subject_key(subject: &Object) -> &Object {
    match subject {
        Object::Expr(e) => e.head(),
        other => other,
    }
}

/// Reject malformed patterns before they enter a rule list.
pub fn validate_pattern(pat: &Object, sys: &SystemSymbols) -> Result<(), PatternError> {
    let Object::Expr(e) = pat else {
        return Ok(());
    };
    if e.head().is_symbol(&sys.pattern) && !matches!(e.args(), [Object::Symbol(_), _]) {
        return Err(PatternError::InvalidName(pat.to_string()));
    }
    if e.head().is_symbol(&sys.repeated) {
        match e.args() {
            [p] | [p, _] => {
                if e.length() == 2 && repeat_range(e.args().get(1), sys).is_none() {
                    return Err(PatternError::InvalidRange(pat.to_string()));
                }
                let inner = analyse(p, sys, None, &Default::default());
                if inner.min == 0 {
                    return Err(PatternError::NestedRepeated(pat.to_string()));
                }
            }
            _ => return Err(PatternError::InvalidRange(pat.to_string())),
        }
    }
    e.items().iter().try_for_each(|item| validate_pattern(item, sys))
}
