//! Backtracking pattern matcher
//!
//! The matcher walks pattern and subject together. Every place where more
//! than one choice exists (how many arguments a sequence slot takes, which
//! arguments an orderless slot takes, which alternative matches) is a loop,
//! and the rest of the match is passed down as a continuation. When the
//! continuation fails the loop tries its next choice, so a late failure
//! backtracks into every earlier decision. The first solution in this order
//! wins:
//!
//! - slots are filled left to right,
//! - counts follow [`SizeInfo`] (longest first for sequences, shortest
//!   first for blanks inside Flat heads, non-empty first for `Optional`),
//! - orderless slots take argument subsets in lexicographic index order.
//!
//! Bindings live on a stack that each branch truncates on failure.
//! Conditions and pattern tests run through the evaluator; an abort or throw
//! raised there stops the whole search and is reported to the caller.

use itertools::Itertools;
use smallvec::SmallVec;
use tracing::trace;

use super::analyse::{analyse, total_range, SizeInfo};
use super::replace::substitute;
use super::{classify, is_literal, PatternKind};
use crate::backend::eval::errors::{EvalError, EvalResult};
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::{Bindings, Expr, Object};
use crate::backend::symbol::{Attributes, RuleCacheKind};
use crate::backend::thread::ThreadContext;

type Cont<'k, 'c> = dyn FnMut(&mut Matcher<'c>) -> bool + 'k;

/// Head and slot count of the call whose arguments are being matched
#[derive(Clone, Copy)]
struct Site<'a> {
    head: &'a Object,
    count: usize,
}

pub(crate) struct Matcher<'c> {
    ctx: &'c ThreadContext,
    sys: &'c SystemSymbols,
    bindings: Bindings,
    steps: usize,
    poll_interval: usize,
    interrupted: Option<EvalError>,
    /// Argument usage recorded when an orderless match completes
    last_used: Vec<bool>,
    /// Unconsumed arguments when a partial left-to-right match completes
    last_rest: usize,
    /// `(head, slot index, slot count)` of the slot being matched, for `Optional` defaults
    default_site: Option<(Object, usize, usize)>,
}

/// Argument counts to try for a slot, in preference order
fn slot_counts(info: &SizeInfo, available: usize) -> SmallVec<[usize; 8]> {
    let max = info.max.min(available);
    let mut out = SmallVec::new();
    if info.min > max {
        return out;
    }
    if info.longest {
        out.extend((info.min..=max).rev());
    } else if info.prefer_nonempty && info.min == 0 {
        out.extend(1..=max);
        out.push(0);
    } else {
        out.extend(info.min..=max);
    }
    out
}

/// The object a slot sees for a run of `items`
fn slot_value(items: &[Object], info: &SizeInfo, assoc: Option<&Object>) -> Object {
    if info.no_sequence {
        return match (items, assoc) {
            ([single], _) => single.clone(),
            ([], _) | (_, None) => Object::sequence_marker(items.iter().cloned()),
            (_, Some(head)) => Object::call(head.clone(), items.iter().cloned()),
        };
    }
    match items {
        [single] if info.max == 1 => single.clone(),
        _ => Object::sequence_marker(items.iter().cloned()),
    }
}

/// A sequence marker's items, or the object itself as a one-item run
fn run_items(arg: &Object) -> &[Object] {
    if arg.is_sequence_marker() {
        arg.args()
    } else {
        std::slice::from_ref(arg)
    }
}

/// The single object `arg` stands for, unwrapping one-item markers
fn single(arg: &Object) -> Option<&Object> {
    if arg.is_sequence_marker() {
        match arg.args() {
            [one] => Some(one),
            _ => None,
        }
    } else {
        Some(arg)
    }
}

fn has_type(arg: &Object, head: Option<&Object>, sys: &SystemSymbols) -> bool {
    let Some(head) = head else {
        return true;
    };
    match arg {
        Object::Integer(_) => head.is_symbol(&sys.integer),
        Object::Float(_) => head.is_symbol(&sys.real),
        Object::String(_) => head.is_symbol(&sys.string),
        Object::Symbol(_) => head.is_symbol(&sys.symbol),
        Object::Expr(e) => e.head() == head,
        Object::Magic(_) | Object::Custom(_) => false,
    }
}

impl<'c> Matcher<'c> {
    pub(crate) fn new(ctx: &'c ThreadContext) -> Self {
        let kernel = ctx.kernel();
        Matcher {
            ctx,
            sys: kernel.system(),
            bindings: Bindings::new(),
            steps: 0,
            poll_interval: kernel.config().abort_poll_interval.max(1),
            interrupted: None,
            last_used: Vec::new(),
            last_rest: 0,
            default_site: None,
        }
    }

    fn finish<T>(self, value: T) -> EvalResult<T> {
        match self.interrupted {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn tick(&mut self) -> bool {
        if self.interrupted.is_some() {
            return false;
        }
        self.steps += 1;
        if self.steps % self.poll_interval == 0 {
            if let Err(err) = self.ctx.check_abort() {
                self.interrupted = Some(err);
                return false;
            }
        }
        true
    }

    fn interrupt(&mut self, err: EvalError) -> bool {
        if self.interrupted.is_none() {
            self.interrupted = Some(err);
        }
        false
    }

    /// Evaluate `test` with the current bindings substituted; true iff it yields `True`.
    fn check_condition(&mut self, test: &Object) -> bool {
        let test = substitute(test, &self.bindings);
        match self.ctx.evaluate(test) {
            Ok(v) => v.is_symbol(&self.sys.true_),
            Err(err) => self.interrupt(err),
        }
    }

    fn check_test(&mut self, f: &Object, arg: &Object) -> bool {
        let call = Object::call(f.clone(), run_items(arg).iter().cloned());
        match self.ctx.evaluate(call) {
            Ok(v) => v.is_symbol(&self.sys.true_),
            Err(err) => self.interrupt(err),
        }
    }

    /// Value of `Default(f, i, n)`, `Default(f, i)` or `Default(f)` for the current slot
    fn lookup_default(&mut self) -> Option<Object> {
        let (head, index, count) = self.default_site.clone()?;
        let sym = head.topmost_symbol()?.clone();
        let list = sym.rules_snapshot(RuleCacheKind::Default)?;
        let sys = self.sys;
        let candidates = [
            Object::call(&sys.default, vec![head.clone(), Object::Integer(index as i64), Object::Integer(count as i64)]),
            Object::call(&sys.default, vec![head.clone(), Object::Integer(index as i64)]),
            Object::call(&sys.default, vec![head]),
        ];
        for key in candidates {
            match list.find(self.ctx, &key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => {
                    self.interrupt(err);
                    return None;
                }
            }
        }
        None
    }

    /// Match `pat` against `arg`, then run `k`. Returns true when `k` accepted.
    fn match_atom(&mut self, pat: &Object, arg: &Object, k: &mut Cont<'_, 'c>) -> bool {
        if !self.tick() {
            return false;
        }
        let sys = self.sys;
        match classify(pat, sys) {
            PatternKind::Atom(p) => single(arg).is_some_and(|a| a == p) && k(self),
            PatternKind::Literal(x) => single(arg).is_some_and(|a| a == x) && k(self),
            PatternKind::Blank(head) => single(arg).is_some_and(|a| has_type(a, head, sys)) && k(self),
            PatternKind::BlankSequence(head) => {
                let items = run_items(arg);
                !items.is_empty() && items.iter().all(|a| has_type(a, head, sys)) && k(self)
            }
            PatternKind::BlankNullSequence(head) => {
                run_items(arg).iter().all(|a| has_type(a, head, sys)) && k(self)
            }
            PatternKind::Named(name, p) => {
                let bound_same = self.bindings.get(name).map(|v| v == arg);
                match bound_same {
                    Some(false) => false,
                    Some(true) => self.match_atom(p, arg, k),
                    None => {
                        let mark = self.bindings.len();
                        self.bindings.push(name.clone(), arg.clone());
                        if self.match_atom(p, arg, k) {
                            return true;
                        }
                        self.bindings.truncate(mark);
                        false
                    }
                }
            }
            PatternKind::Condition(p, test) => {
                self.match_atom(p, arg, &mut |m: &mut Matcher<'c>| m.check_condition(test) && k(m))
            }
            PatternKind::Test(p, f) => {
                self.match_atom(p, arg, &mut |m: &mut Matcher<'c>| m.check_test(f, arg) && k(m))
            }
            PatternKind::Alternatives(alts) => {
                for alt in alts {
                    let mark = self.bindings.len();
                    if self.match_atom(alt, arg, &mut *k) {
                        return true;
                    }
                    self.bindings.truncate(mark);
                    if self.interrupted.is_some() {
                        return false;
                    }
                }
                false
            }
            PatternKind::Repeated(p, lo, hi) => self.match_repeated(p, run_items(arg), 0, lo, hi, k),
            PatternKind::Optional(p, default) => {
                if arg.is_sequence_marker() && arg.args().is_empty() {
                    let value = match default {
                        Some(d) => Some(d.clone()),
                        None => self.lookup_default(),
                    };
                    match value {
                        Some(v) => self.match_atom(p, &v, k),
                        None => false,
                    }
                } else {
                    self.match_atom(p, arg, k)
                }
            }
            PatternKind::Hold(p) | PatternKind::Longest(p) | PatternKind::Shortest(p) => self.match_atom(p, arg, k),
            PatternKind::Sequence(ps) => {
                let head = Object::from(&sys.pattern_sequence);
                let site = Site { head: &head, count: ps.len() };
                self.match_left(ps, run_items(arg), None, site, false, k)
            }
            PatternKind::Except(no, p) => {
                let mark = self.bindings.len();
                let excluded = self.match_atom(no, arg, &mut |_: &mut Matcher<'c>| true);
                self.bindings.truncate(mark);
                if excluded || self.interrupted.is_some() {
                    return false;
                }
                match p {
                    Some(p) => self.match_atom(p, arg, k),
                    None => single(arg).is_some() && k(self),
                }
            }
            PatternKind::Function(pe) => {
                let Some(arg) = single(arg) else {
                    return false;
                };
                if is_literal(pat, sys) {
                    return pat == arg && k(self);
                }
                match arg {
                    Object::Expr(ae) => self.match_function(pe, ae, k),
                    _ => false,
                }
            }
        }
    }

    fn match_function(&mut self, pe: &Expr, ae: &Expr, k: &mut Cont<'_, 'c>) -> bool {
        self.match_atom(pe.head(), ae.head(), &mut |m: &mut Matcher<'c>| m.match_function_args(pe, ae, &mut *k))
    }

    fn match_function_args(&mut self, pe: &Expr, ae: &Expr, k: &mut Cont<'_, 'c>) -> bool {
        let attrs = match ae.head() {
            Object::Symbol(s) => s.attributes(),
            _ => Attributes::empty(),
        };
        let flat = attrs.contains(Attributes::FLAT);
        let assoc = flat.then(|| ae.head());
        if !flat {
            let (lo, hi) = total_range(pe.args(), self.sys, &self.bindings);
            if ae.length() < lo || ae.length() > hi {
                return false;
            }
        }
        let site = Site { head: ae.head(), count: pe.length() };
        if attrs.contains(Attributes::ORDERLESS) {
            let mut used = vec![false; ae.length()];
            self.match_symmetric(pe.args(), ae.args(), &mut used, assoc, site, false, k)
        } else {
            self.match_left(pe.args(), ae.args(), assoc, site, false, k)
        }
    }

    /// Fill pattern slots left to right from `args`.
    ///
    /// With `partial`, arguments left over after the last slot are allowed
    /// and their count is recorded in `last_rest`.
    fn match_left(
        &mut self,
        pats: &[Object],
        args: &[Object],
        assoc: Option<&Object>,
        site: Site<'_>,
        partial: bool,
        k: &mut Cont<'_, 'c>,
    ) -> bool {
        let Some((pat, rest_pats)) = pats.split_first() else {
            if args.is_empty() || partial {
                self.last_rest = args.len();
                return k(self);
            }
            return false;
        };
        let info = analyse(pat, self.sys, assoc, &self.bindings);
        let index = site.count - pats.len() + 1;
        for n in slot_counts(&info, args.len()) {
            let value = slot_value(&args[..n], &info, assoc);
            let rest = &args[n..];
            self.default_site = Some((site.head.clone(), index, site.count));
            if self.match_atom(pat, &value, &mut |m: &mut Matcher<'c>| {
                m.match_left(rest_pats, rest, assoc, site, partial, &mut *k)
            }) {
                return true;
            }
            if self.interrupted.is_some() {
                return false;
            }
        }
        false
    }

    /// Fill pattern slots from any unused arguments (Orderless heads).
    ///
    /// With `allow_unused`, arguments no slot claimed are allowed; the final
    /// usage is recorded in `last_used`.
    #[allow(clippy::too_many_arguments)]
    fn match_symmetric(
        &mut self,
        pats: &[Object],
        args: &[Object],
        used: &mut Vec<bool>,
        assoc: Option<&Object>,
        site: Site<'_>,
        allow_unused: bool,
        k: &mut Cont<'_, 'c>,
    ) -> bool {
        let Some((pat, rest_pats)) = pats.split_first() else {
            if allow_unused || used.iter().all(|u| *u) {
                self.last_used.clear();
                self.last_used.extend_from_slice(used);
                return k(self);
            }
            return false;
        };
        let free: SmallVec<[usize; 8]> = (0..args.len()).filter(|i| !used[*i]).collect();
        let info = analyse(pat, self.sys, assoc, &self.bindings);
        let index = site.count - pats.len() + 1;
        for n in slot_counts(&info, free.len()) {
            for combo in free.iter().copied().combinations(n) {
                let items: SmallVec<[Object; 4]> = combo.iter().map(|i| args[*i].clone()).collect();
                let value = slot_value(&items, &info, assoc);
                for i in &combo {
                    used[*i] = true;
                }
                self.default_site = Some((site.head.clone(), index, site.count));
                let ok = self.match_atom(pat, &value, &mut |m: &mut Matcher<'c>| {
                    m.match_symmetric(rest_pats, args, &mut *used, assoc, site, allow_unused, &mut *k)
                });
                for i in &combo {
                    used[*i] = false;
                }
                if ok {
                    return true;
                }
                if self.interrupted.is_some() {
                    return false;
                }
            }
        }
        false
    }

    /// Match `items` as consecutive repetitions of `p`.
    fn match_repeated(
        &mut self,
        p: &Object,
        items: &[Object],
        count: usize,
        lo: usize,
        hi: usize,
        k: &mut Cont<'_, 'c>,
    ) -> bool {
        if items.is_empty() {
            return count >= lo && k(self);
        }
        if count >= hi {
            return false;
        }
        let info = analyse(p, self.sys, None, &self.bindings);
        for n in slot_counts(&info, items.len()) {
            if n == 0 {
                continue;
            }
            let value = slot_value(&items[..n], &info, None);
            let rest = &items[n..];
            if self.match_atom(p, &value, &mut |m: &mut Matcher<'c>| {
                m.match_repeated(p, rest, count + 1, lo, hi, &mut *k)
            }) {
                return true;
            }
            if self.interrupted.is_some() {
                return false;
            }
        }
        false
    }

    /// Substitute the bindings into `rhs`, honoring a `Condition(body, test)` wrapper.
    fn build_rhs(&mut self, rhs: &Object) -> Option<Object> {
        let sys = self.sys;
        let body = match rhs {
            Object::Expr(e) if e.head().is_symbol(&sys.condition) && e.length() == 2 => {
                if !self.check_condition(e.get_item(2)) {
                    return None;
                }
                e.get_item(1)
            }
            _ => rhs,
        };
        let value = substitute(body, &self.bindings);
        Some(if value.is_sequence_marker() {
            Object::call(&sys.sequence, value.args().iter().cloned())
        } else {
            value
        })
    }

    /// Top-level match of a Flat head that may cover only part of the subject.
    fn match_flat_partial(&mut self, pe: &Expr, se: &Expr, rhs: &Object, orderless: bool) -> Option<Object> {
        let mut result = None;
        let n = se.length();
        let head = se.head();
        let site = Site { head, count: pe.length() };
        if orderless {
            let mut used = vec![false; n];
            self.match_atom(pe.head(), head, &mut |m: &mut Matcher<'c>| {
                m.match_symmetric(pe.args(), se.args(), &mut used, Some(head), site, true, &mut |m: &mut Matcher<'c>| {
                    match m.build_rhs(rhs) {
                        Some(r) => {
                            result = Some(splice_used(se, &m.last_used, r));
                            true
                        }
                        None => false,
                    }
                })
            });
            return result;
        }
        for start in 0..n {
            let tail = &se.args()[start..];
            let found = self.match_atom(pe.head(), head, &mut |m: &mut Matcher<'c>| {
                m.match_left(pe.args(), tail, Some(head), site, true, &mut |m: &mut Matcher<'c>| {
                    match m.build_rhs(rhs) {
                        Some(r) => {
                            let end = n - m.last_rest;
                            result = Some(splice_range(se, start, end, r));
                            true
                        }
                        None => false,
                    }
                })
            });
            if found || self.interrupted.is_some() {
                break;
            }
        }
        result
    }
}

/// `f(args[..start], rhs, args[end..])`, or just `rhs` when it covers everything
fn splice_range(se: &Expr, start: usize, end: usize, rhs: Object) -> Object {
    if start == 0 && end == se.length() {
        return rhs;
    }
    let args = se.args();
    let items = args[..start]
        .iter()
        .cloned()
        .chain(std::iter::once(rhs))
        .chain(args[end..].iter().cloned());
    Object::call(se.head().clone(), items)
}

/// The subject with its used arguments replaced by `rhs` at the first used position
fn splice_used(se: &Expr, used: &[bool], rhs: Object) -> Object {
    if used.iter().all(|u| *u) {
        return rhs;
    }
    let mut rhs = Some(rhs);
    let mut items = Vec::with_capacity(se.length());
    for (arg, is_used) in se.args().iter().zip(used) {
        if !*is_used {
            items.push(arg.clone());
        } else if let Some(r) = rhs.take() {
            items.push(r);
        }
    }
    Object::call(se.head().clone(), items)
}

/// Match `subject` against `pattern`, returning the first binding set found.
pub fn match_pattern(ctx: &ThreadContext, subject: &Object, pattern: &Object) -> EvalResult<Option<Bindings>> {
    let mut m = Matcher::new(ctx);
    let mut found = None;
    m.match_atom(pattern, subject, &mut |m| {
        found = Some(m.bindings.clone());
        true
    });
    m.finish(found)
}

/// Whether `subject` matches `pattern`
pub fn matches(ctx: &ThreadContext, subject: &Object, pattern: &Object) -> EvalResult<bool> {
    match_pattern(ctx, subject, pattern).map(|b| b.is_some())
}

/// Try one rule on `subject`, returning the instantiated right-hand side.
///
/// Rules for Flat heads may rewrite a contiguous part of the subject (or
/// any subset, for Flat + Orderless heads); the untouched arguments are
/// kept around the result.
pub fn apply_rule(ctx: &ThreadContext, lhs: &Object, rhs: &Object, subject: &Object) -> EvalResult<Option<Object>> {
    let mut m = Matcher::new(ctx);
    let mut result = None;
    m.match_atom(lhs, subject, &mut |m| match m.build_rhs(rhs) {
        Some(r) => {
            result = Some(r);
            true
        }
        None => false,
    });
    if result.is_none() && m.interrupted.is_none() {
        let sys = m.sys;
        let bare = match classify(lhs, sys) {
            PatternKind::Hold(p) => p,
            _ => lhs,
        };
        if let (PatternKind::Function(pe), Object::Expr(se)) = (classify(bare, sys), subject) {
            if let Object::Symbol(h) = se.head() {
                let attrs = h.attributes();
                if attrs.contains(Attributes::FLAT) && pe.head() == se.head() && se.length() > 0 {
                    m.bindings.truncate(0);
                    result = m.match_flat_partial(pe, se, rhs, attrs.contains(Attributes::ORDERLESS));
                }
            }
        }
    }
    if result.is_some() {
        trace!(target: "pmath_core::pattern", %lhs, %subject, "rule matched");
    }
    m.finish(result)
}
