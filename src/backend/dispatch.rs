//! Rule lists and dispatch tables
//!
//! Every rule cache of a symbol is a [`RuleList`]. Rules whose left-hand
//! side is a plain constant (`f(1)`, `x`, `Default(f, 2)`) live in a hash
//! index and are found in O(1). All other rules are kept sorted by
//! specificity, most specific first, with insertion order breaking ties.
//!
//! Scanning every pattern rule for every call would make large definitions
//! slow, so a [`DispatchTable`] groups the pattern rules by the head their
//! left-hand side requires. It is built on the first lookup after a change
//! and dropped whenever the list is mutated. A table is also rebuilt when a
//! symbol gains or loses Flat or Orderless: constant left-hand sides such as
//! `f(b, a)` stop being found by hash once `f` sorts its arguments, and the
//! rebuilt table hands them to the matcher instead.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::backend::eval::errors::EvalResult;
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::{Expr, Object};
use crate::backend::pattern::compare::{alpha_equivalent, pattern_names, PatternNames};
use crate::backend::pattern::{apply_rule, dispatch_key, is_literal, specificity_key, subject_key, SpecificityKey};
use crate::backend::symbol::structure_epoch;
use crate::backend::thread::ThreadContext;

/// When the right-hand side was evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// `lhs -> rhs`: evaluated once, at definition
    Immediate,
    /// `lhs :> rhs`: evaluated on every use
    Delayed,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub lhs: Object,
    pub rhs: Object,
    pub kind: RuleKind,
    literal: bool,
    conditional: bool,
    key: SpecificityKey,
    names: PatternNames,
    dispatch: Option<Object>,
}

impl Rule {
    pub fn new(lhs: Object, rhs: Object, kind: RuleKind, sys: &SystemSymbols) -> Rule {
        let conditional = rhs.has_head(&sys.condition) && rhs.args().len() == 2;
        let literal = !conditional && is_literal(&lhs, sys);
        Rule {
            key: specificity_key(&lhs, sys),
            names: pattern_names(&lhs, sys),
            dispatch: dispatch_key(&lhs, sys),
            lhs,
            rhs,
            kind,
            literal,
            conditional,
        }
    }

    /// Read `Rule(lhs, rhs)` or `RuleDelayed(lhs, rhs)`.
    pub fn from_object(obj: &Object, sys: &SystemSymbols) -> Option<Rule> {
        let kind = if obj.has_head(&sys.rule) {
            RuleKind::Immediate
        } else if obj.has_head(&sys.rule_delayed) {
            RuleKind::Delayed
        } else {
            return None;
        };
        match obj.args() {
            [lhs, rhs] => Some(Rule::new(lhs.clone(), rhs.clone(), kind, sys)),
            _ => None,
        }
    }

    /// True if the right-hand side is `Condition(body, test)`
    pub fn is_conditional(&self) -> bool {
        self.conditional
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// True if both left-hand sides are the same pattern up to renaming
    /// of pattern names
    pub fn same_lhs(&self, other: &Rule) -> bool {
        self.key == other.key && alpha_equivalent(&self.lhs, &self.names, &other.lhs, &other.names)
    }

    /// Apply to `subject`, returning the instantiated right-hand side.
    pub fn apply(&self, ctx: &ThreadContext, subject: &Object) -> EvalResult<Option<Object>> {
        if self.literal {
            return Ok((&self.lhs == subject).then(|| self.rhs.clone()));
        }
        apply_rule(ctx, &self.lhs, &self.rhs, subject)
    }
}

/// Candidate pattern rules grouped by the head their left-hand side needs
#[derive(Debug, Default)]
pub struct DispatchTable {
    by_head: HashMap<Object, Vec<usize>>,
    any_head: Vec<usize>,
    /// Hash-indexed rules that are no longer constant, re-read as patterns
    demoted: Vec<Rule>,
    built_at: u64,
    epoch: u64,
}

impl DispatchTable {
    fn build(list: &RuleList, sys: &SystemSymbols) -> DispatchTable {
        let patterns = &list.patterns;
        let mut table = DispatchTable {
            built_at: list.generation,
            epoch: structure_epoch(),
            ..Default::default()
        };
        table.demoted = list
            .literal
            .values()
            .filter(|r| !is_literal(&r.lhs, sys))
            .sorted_by(|a, b| a.lhs.cmp(&b.lhs))
            .map(|r| Rule::new(r.lhs.clone(), r.rhs.clone(), r.kind, sys))
            .collect();
        for (i, rule) in patterns.iter().enumerate() {
            match &rule.dispatch {
                Some(key) => table.by_head.entry(key.clone()).or_default().push(i),
                None => table.any_head.push(i),
            }
        }
        debug!(
            target: "pmath_core::dispatch",
            rules = patterns.len(),
            heads = table.by_head.len(),
            demoted = table.demoted.len(),
            "dispatch table built"
        );
        table
    }

    /// Indices of rules that may match a subject with dispatch key `key`, in list order
    fn candidates<'a>(&'a self, key: &Object) -> impl Iterator<Item = usize> + 'a {
        let keyed = self.by_head.get(key).map(Vec::as_slice).unwrap_or(&[]);
        keyed.iter().copied().merge(self.any_head.iter().copied())
    }
}

/// One rule cache of a symbol
#[derive(Debug, Default)]
pub struct RuleList {
    literal: HashMap<Object, Rule>,
    patterns: Vec<Rule>,
    generation: u64,
    table: RwLock<Option<Arc<DispatchTable>>>,
}

impl Clone for RuleList {
    fn clone(&self) -> Self {
        RuleList {
            literal: self.literal.clone(),
            patterns: self.patterns.clone(),
            generation: self.generation,
            table: RwLock::new(None),
        }
    }
}

impl RuleList {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self) {
        self.generation += 1;
        *self.table.get_mut() = None;
    }

    /// Add a rule.
    ///
    /// A rule whose left-hand side equals an existing one up to renaming of
    /// pattern names replaces it, unless either right-hand side is
    /// conditional; then both are kept and the new one is tried after the
    /// old one.
    pub fn insert(&mut self, rule: Rule) {
        self.touch();
        if rule.literal {
            self.literal.insert(rule.lhs.clone(), rule);
            return;
        }
        if !rule.conditional {
            if let Some(existing) = self.patterns.iter_mut().find(|r| !r.conditional && r.same_lhs(&rule)) {
                trace!(target: "pmath_core::dispatch", lhs = %rule.lhs, "rule replaced");
                *existing = rule;
                return;
            }
        }
        let pos = self.patterns.partition_point(|r| r.key <= rule.key);
        self.patterns.insert(pos, rule);
    }

    /// Remove every rule whose left-hand side is `lhs` up to renaming of
    /// pattern names.
    pub fn remove(&mut self, lhs: &Object, sys: &SystemSymbols) -> bool {
        let before = self.len();
        self.literal.remove(lhs);
        let key = specificity_key(lhs, sys);
        let names = pattern_names(lhs, sys);
        self.patterns
            .retain(|r| !(r.key == key && alpha_equivalent(&r.lhs, &r.names, lhs, &names)));
        let removed = self.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.literal.clear();
        self.patterns.clear();
        self.touch();
    }

    pub fn len(&self) -> usize {
        self.literal.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.patterns.is_empty()
    }

    /// Literal rules (unordered) followed by pattern rules in matching order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.literal.values().chain(self.patterns.iter())
    }

    /// Incremented by every mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation the cached dispatch table was built at, if one is cached
    pub fn table_generation(&self) -> Option<u64> {
        self.table.read().as_ref().map(|t| t.built_at)
    }

    fn table(&self, sys: &SystemSymbols) -> Arc<DispatchTable> {
        let epoch = structure_epoch();
        if let Some(table) = self.table.read().as_ref().filter(|t| t.epoch == epoch) {
            return Arc::clone(table);
        }
        let table = Arc::new(DispatchTable::build(self, sys));
        *self.table.write() = Some(Arc::clone(&table));
        table
    }

    /// Rewrite `subject` with the first applicable rule.
    pub fn find(&self, ctx: &ThreadContext, subject: &Object) -> EvalResult<Option<Object>> {
        if let Some(rule) = self.literal.get(subject) {
            return Ok(Some(rule.rhs.clone()));
        }
        if self.is_empty() {
            return Ok(None);
        }
        let table = self.table(ctx.kernel().system());
        for rule in &table.demoted {
            if let Some(result) = rule.apply(ctx, subject)? {
                return Ok(Some(result));
            }
        }
        for i in table.candidates(subject_key(subject)) {
            if let Some(result) = self.patterns[i].apply(ctx, subject)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

/// Apply the first of `rules` that matches the whole of `expr`; `expr` itself when none does.
pub fn replace(ctx: &ThreadContext, expr: &Object, rules: &[Rule]) -> EvalResult<Object> {
    for rule in rules {
        if let Some(result) = rule.apply(ctx, expr)? {
            return Ok(result);
        }
    }
    Ok(expr.clone())
}

/// Rewrite every subexpression of `expr` with the first matching rule,
/// outermost first. Replaced parts are not searched again.
pub fn replace_all(ctx: &ThreadContext, expr: &Object, rules: &[Rule]) -> EvalResult<Object> {
    for rule in rules {
        if let Some(result) = rule.apply(ctx, expr)? {
            return Ok(result);
        }
    }
    let Object::Expr(e) = expr else {
        return Ok(expr.clone());
    };
    let mut changed: Option<Vec<Object>> = None;
    for (i, item) in e.items().iter().enumerate() {
        let new = replace_all(ctx, item, rules)?;
        if changed.is_none() && !new.ptr_eq(item) {
            changed = Some(e.items()[..i].to_vec());
        }
        if let Some(items) = changed.as_mut() {
            items.push(new);
        }
    }
    Ok(match changed {
        Some(items) => Object::Expr(Expr::from_items(items)),
        None => expr.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::kernel::Kernel;
    use crate::backend::symbol::{Attributes, Symbol};

    #[test]
    fn test_literal_rules_bypass_patterns() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let mut list = RuleList::new();
        list.insert(Rule::new(Object::call(&f, vec![sys.blank()]), Object::from("any"), RuleKind::Delayed, sys));
        list.insert(Rule::new(Object::call(&f, vec![Object::Integer(1)]), Object::from("one"), RuleKind::Delayed, sys));

        let one = Object::call(&f, vec![Object::Integer(1)]);
        let two = Object::call(&f, vec![Object::Integer(2)]);
        assert_eq!(list.find(&ctx, &one).unwrap(), Some(Object::from("one")));
        assert_eq!(list.find(&ctx, &two).unwrap(), Some(Object::from("any")));
    }

    #[test]
    fn test_same_lhs_replaces() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let x = k.symbol("x");
        let lhs = Object::call(&f, vec![sys.named_blank(&x)]);
        let mut list = RuleList::new();
        list.insert(Rule::new(lhs.clone(), Object::Integer(1), RuleKind::Delayed, sys));
        list.insert(Rule::new(lhs.clone(), Object::Integer(2), RuleKind::Delayed, sys));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next().map(|r| r.rhs.clone()), Some(Object::Integer(2)));
    }

    #[test]
    fn test_renamed_lhs_replaces() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let by_x = Object::call(&f, vec![sys.named_blank(&k.symbol("x"))]);
        let by_y = Object::call(&f, vec![sys.named_blank(&k.symbol("y"))]);
        let mut list = RuleList::new();
        list.insert(Rule::new(by_x, Object::Integer(1), RuleKind::Delayed, sys));
        list.insert(Rule::new(by_y.clone(), Object::Integer(2), RuleKind::Delayed, sys));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next().map(|r| r.rhs.clone()), Some(Object::Integer(2)));

        // f(x_, y_) and f(y_, x_) are the same pattern; f(x_, x_) is not
        let (x, y) = (k.symbol("x"), k.symbol("y"));
        let rule = |p: &Symbol, q: &Symbol| {
            let lhs = Object::call(&f, vec![sys.named_blank(p), sys.named_blank(q)]);
            Rule::new(lhs, Object::Integer(0), RuleKind::Delayed, sys)
        };
        let (xy, yx, xx) = (rule(&x, &y), rule(&y, &x), rule(&x, &x));
        assert!(xy.same_lhs(&yx));
        assert!(!xy.same_lhs(&xx));

        assert!(list.remove(&by_y, sys));
        assert!(list.is_empty());
    }

    #[test]
    fn test_constant_rule_survives_orderless() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let a = Object::from(&k.symbol("a"));
        let b = Object::from(&k.symbol("b"));
        let mut list = RuleList::new();
        let rule = Rule::new(Object::call(&f, vec![b.clone(), a.clone()]), Object::from("ba"), RuleKind::Delayed, sys);
        assert!(rule.is_literal());
        list.insert(rule);

        let sorted = Object::call(&f, vec![a, b]);
        assert_eq!(list.find(&ctx, &sorted).unwrap(), None);
        k.set_attributes(&f, Attributes::ORDERLESS).unwrap();
        assert_eq!(list.find(&ctx, &sorted).unwrap(), Some(Object::from("ba")), "constant rule re-read as a pattern");
    }

    #[test]
    fn test_conditional_rhs_keeps_both() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let x = k.symbol("x");
        let lhs = Object::call(&f, vec![sys.named_blank(&x)]);
        let mut list = RuleList::new();
        let guarded = sys.condition(Object::Integer(1), Object::from(&sys.false_));
        list.insert(Rule::new(lhs.clone(), guarded, RuleKind::Delayed, sys));
        list.insert(Rule::new(lhs.clone(), Object::Integer(2), RuleKind::Delayed, sys));
        assert_eq!(list.len(), 2);

        let ctx = k.root_context();
        let subject = Object::call(&f, vec![Object::Integer(7)]);
        assert_eq!(list.find(&ctx, &subject).unwrap(), Some(Object::Integer(2)), "failed condition falls through");
    }

    #[test]
    fn test_specific_rules_first() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let mut list = RuleList::new();
        list.insert(Rule::new(Object::call(&f, vec![sys.blank_sequence()]), Object::from("seq"), RuleKind::Delayed, sys));
        list.insert(Rule::new(Object::call(&f, vec![sys.blank()]), Object::from("one"), RuleKind::Delayed, sys));
        let ctx = k.root_context();
        let subject = Object::call(&f, vec![Object::Integer(3)]);
        assert_eq!(list.find(&ctx, &subject).unwrap(), Some(Object::from("one")));
    }

    #[test]
    fn test_table_rebuilt_after_mutation() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let g = k.symbol("g");
        let mut list = RuleList::new();
        list.insert(Rule::new(Object::call(&f, vec![sys.blank()]), Object::Integer(1), RuleKind::Delayed, sys));
        assert_eq!(list.table_generation(), None);

        let subject = Object::call(&g, vec![Object::Integer(0)]);
        assert_eq!(list.find(&ctx, &subject).unwrap(), None, "wrong head is not a candidate");
        let built = list.table_generation();
        assert_eq!(built, Some(list.generation()));

        list.insert(Rule::new(Object::call(&g, vec![sys.blank()]), Object::Integer(2), RuleKind::Delayed, sys));
        assert_eq!(list.table_generation(), None, "mutation drops the table");
        assert_eq!(list.find(&ctx, &subject).unwrap(), Some(Object::Integer(2)));
        assert!(list.table_generation() > built);
    }

    #[test]
    fn test_remove_and_clear() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let lhs = Object::call(&f, vec![Object::Integer(1)]);
        let mut list = RuleList::new();
        list.insert(Rule::new(lhs.clone(), Object::Integer(1), RuleKind::Immediate, sys));
        list.insert(Rule::new(Object::call(&f, vec![sys.blank()]), Object::Integer(2), RuleKind::Delayed, sys));
        assert!(list.remove(&lhs, sys));
        assert!(!list.remove(&lhs, sys));
        assert_eq!(list.len(), 1);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_replace_all_outermost_first() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let a = k.symbol("a");
        let b = k.symbol("b");
        let rules = [Rule::new(Object::from(&a), Object::from(&b), RuleKind::Immediate, sys)];
        let expr = sys.list(vec![Object::from(&a), Object::call(&f, vec![Object::from(&a)]), Object::Integer(1)]);
        let out = replace_all(&ctx, &expr, &rules).unwrap();
        let expected = sys.list(vec![Object::from(&b), Object::call(&f, vec![Object::from(&b)]), Object::Integer(1)]);
        assert_eq!(out, expected);

        let untouched = sys.list(vec![Object::Integer(1)]);
        assert!(replace_all(&ctx, &untouched, &rules).unwrap().ptr_eq(&untouched));
        assert_eq!(replace(&ctx, &expr, &rules).unwrap(), expr, "replace only looks at the whole expression");
    }
}
