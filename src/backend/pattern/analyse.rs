//! Argument-count analysis of sub-patterns
//!
//! Before the matcher assigns arguments to a pattern slot it needs to know
//! how many arguments the slot may take and in which order to try the
//! counts:
//!
//! | pattern            | range      | order                        |
//! |--------------------|------------|------------------------------|
//! | `_`, atoms, calls  | `{1,1}`    | -                            |
//! | `__`               | `{1,∞}`    | longest first                |
//! | `___`              | `{0,∞}`    | longest first                |
//! | `Optional(p)`      | `{0,max}`  | non-empty first, then empty  |
//! | `Repeated(p,{a,b})`| `p × {a,b}`| longest first                |
//! | `Shortest(p)`      | as `p`     | shortest first               |
//!
//! Inside a Flat head every blank may take a run of arguments; runs are
//! wrapped in that head instead of a sequence marker (`no_sequence`), and
//! a plain `_` prefers the shortest run.

use super::{classify, PatternKind};
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::{Bindings, Object};

/// Upper bound meaning "any number of arguments"
pub const UNBOUNDED: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeInfo {
    pub min: usize,
    pub max: usize,
    /// Try counts from `max` down to `min`
    pub longest: bool,
    /// With `min == 0`: try `1..=max` before the empty match
    pub prefer_nonempty: bool,
    /// Runs are wrapped in the enclosing Flat head
    pub no_sequence: bool,
}

impl SizeInfo {
    pub const SINGLE: SizeInfo = SizeInfo {
        min: 1,
        max: 1,
        longest: true,
        prefer_nonempty: false,
        no_sequence: false,
    };

    fn range(min: usize, max: usize) -> SizeInfo {
        SizeInfo { min, max, ..SizeInfo::SINGLE }
    }

    #[inline]
    pub fn is_single(&self) -> bool {
        self.min == 1 && self.max == 1 && !self.no_sequence
    }
}

fn flat_run(mut info: SizeInfo, assoc: Option<&Object>, shortest: bool) -> SizeInfo {
    if assoc.is_some() {
        info.max = UNBOUNDED;
        info.no_sequence = true;
        if shortest {
            info.longest = false;
        }
    }
    info
}

/// Size range of `pat` when it occupies one argument slot.
///
/// `assoc` is the enclosing head when that head is Flat. Pattern names that
/// are already bound fix the size to the length of their value.
pub fn analyse(pat: &Object, sys: &SystemSymbols, assoc: Option<&Object>, bindings: &Bindings) -> SizeInfo {
    match classify(pat, sys) {
        PatternKind::Blank(_) => flat_run(SizeInfo::SINGLE, assoc, true),
        PatternKind::BlankSequence(_) => flat_run(SizeInfo::range(1, UNBOUNDED), assoc, false),
        PatternKind::BlankNullSequence(_) => flat_run(SizeInfo::range(0, UNBOUNDED), assoc, false),
        PatternKind::Named(name, p) => match bindings.get(name) {
            Some(value) => {
                let inner = analyse(p, sys, assoc, bindings);
                let len = bound_length(value, assoc);
                SizeInfo { min: len, max: len, ..inner }
            }
            None => analyse(p, sys, assoc, bindings),
        },
        PatternKind::Condition(p, _) | PatternKind::Test(p, _) | PatternKind::Hold(p) => {
            analyse(p, sys, assoc, bindings)
        }
        PatternKind::Longest(p) => SizeInfo {
            longest: true,
            prefer_nonempty: false,
            ..analyse(p, sys, assoc, bindings)
        },
        PatternKind::Shortest(p) => SizeInfo {
            longest: false,
            prefer_nonempty: false,
            ..analyse(p, sys, assoc, bindings)
        },
        PatternKind::Optional(p, _) => SizeInfo {
            min: 0,
            prefer_nonempty: true,
            ..analyse(p, sys, assoc, bindings)
        },
        PatternKind::Repeated(p, lo, hi) => {
            let inner = analyse(p, sys, None, bindings);
            SizeInfo {
                min: inner.min.saturating_mul(lo),
                max: inner.max.saturating_mul(hi),
                longest: true,
                prefer_nonempty: false,
                no_sequence: false,
            }
        }
        PatternKind::Alternatives(alts) => {
            let mut iter = alts.iter().map(|a| analyse(a, sys, assoc, bindings));
            match iter.next() {
                None => SizeInfo::SINGLE,
                Some(first) => iter.fold(first, |acc, s| SizeInfo {
                    min: acc.min.min(s.min),
                    max: acc.max.max(s.max),
                    no_sequence: acc.no_sequence && s.no_sequence,
                    ..acc
                }),
            }
        }
        PatternKind::Sequence(ps) => ps.iter().fold(SizeInfo::range(0, 0), |acc, p| {
            let s = analyse(p, sys, None, bindings);
            SizeInfo {
                min: acc.min.saturating_add(s.min),
                max: acc.max.saturating_add(s.max),
                ..acc
            }
        }),
        PatternKind::Except(_, Some(p)) => analyse(p, sys, assoc, bindings),
        PatternKind::Except(_, None) | PatternKind::Literal(_) | PatternKind::Function(_) | PatternKind::Atom(_) => {
            SizeInfo::SINGLE
        }
    }
}

/// Number of arguments a bound value stands for
fn bound_length(value: &Object, assoc: Option<&Object>) -> usize {
    if value.is_sequence_marker() {
        return value.args().len();
    }
    match (value, assoc) {
        (Object::Expr(e), Some(head)) if e.head() == head => e.length(),
        _ => 1,
    }
}

/// Combined size range of a pattern argument list, used to reject
/// subjects of the wrong length before searching.
pub fn total_range(pats: &[Object], sys: &SystemSymbols, bindings: &Bindings) -> (usize, usize) {
    pats.iter().fold((0usize, 0usize), |(lo, hi), p| {
        let s = analyse(p, sys, None, bindings);
        (lo.saturating_add(s.min), hi.saturating_add(s.max))
    })
}
