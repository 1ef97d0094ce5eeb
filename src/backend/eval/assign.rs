//! Definitions
//!
//! The definition entry points live on [`ThreadContext`] because immediate
//! definitions evaluate their right-hand side first. Where a rule goes is
//! read off the left-hand side:
//!
//! | left-hand side | stored as                          |
//! |----------------|------------------------------------|
//! | `x`            | value (immediate) or own rule      |
//! | `f(...)`       | down rule of `f`                   |
//! | `f(...)(...)`  | sub rule of `f`                    |
//!
//! `HoldPattern(...)` and `Condition(..., test)` wrappers are looked through.

use tracing::debug;

use super::errors::EvalResult;
use crate::backend::dispatch::{Rule, RuleKind};
use crate::backend::kernel::SystemSymbols;
use crate::backend::models::Object;
use crate::backend::pattern::{classify, validate_pattern, PatternError, PatternKind};
use crate::backend::symbol::{AccessMode, Attributes, RuleCacheKind, Symbol, SymbolError};
use crate::backend::thread::ThreadContext;

/// The symbol and rule cache a left-hand side defines
fn definition_target(lhs: &Object, sys: &SystemSymbols) -> Result<(Symbol, RuleCacheKind), PatternError> {
    match classify(lhs, sys) {
        PatternKind::Hold(p) | PatternKind::Condition(p, _) => definition_target(p, sys),
        PatternKind::Atom(Object::Symbol(s)) => Ok((s.clone(), RuleCacheKind::Own)),
        PatternKind::Function(e) => match e.head() {
            Object::Symbol(s) => Ok((s.clone(), RuleCacheKind::Down)),
            head => match head.topmost_symbol() {
                Some(s) if !sys.is_pattern_head(s) => Ok((s.clone(), RuleCacheKind::Sub)),
                _ => Err(PatternError::NoTarget(lhs.to_string())),
            },
        },
        _ => Err(PatternError::NoTarget(lhs.to_string())),
    }
}

fn store_rule(sym: &Symbol, cache: RuleCacheKind, mode: AccessMode, rule: Rule) -> EvalResult<()> {
    let Some(mut store) = sym.get_rules(mode)? else {
        return Err(SymbolError::ReadOnly.into());
    };
    debug!(target: "pmath_core::symbol", symbol = %sym, ?cache, lhs = %rule.lhs, "definition");
    store.cache_mut(cache)?.insert(rule);
    Ok(())
}

impl ThreadContext {
    /// `lhs = rhs`: evaluate `rhs` now and define `lhs` to rewrite to it.
    pub fn assign(&self, lhs: Object, rhs: Object) -> EvalResult<()> {
        let rhs = self.evaluate(rhs)?;
        self.define(lhs, rhs, RuleKind::Immediate)
    }

    /// `lhs := rhs`: define `lhs` to rewrite to `rhs`, evaluated on each use.
    pub fn assign_delayed(&self, lhs: Object, rhs: Object) -> EvalResult<()> {
        self.define(lhs, rhs, RuleKind::Delayed)
    }

    fn define(&self, lhs: Object, rhs: Object, kind: RuleKind) -> EvalResult<()> {
        let sys = self.kernel().system();
        validate_pattern(&lhs, sys)?;
        let (sym, cache) = definition_target(&lhs, sys)?;
        if cache == RuleCacheKind::Own && kind == RuleKind::Immediate && lhs.is_symbol(&sym) {
            if sym.has_attribute(Attributes::THREAD_LOCAL) {
                self.set_local(&sym, rhs);
                return Ok(());
            }
            sym.set_value(Some(rhs))?;
            return Ok(());
        }
        store_rule(&sym, cache, AccessMode::Write, Rule::new(lhs, rhs, kind, sys))
    }

    /// `tag /: lhs := rhs`: an up rule attached to `tag`, which must occur
    /// as (the head of) an argument of `lhs`.
    pub fn assign_up(&self, tag: &Symbol, lhs: Object, rhs: Object) -> EvalResult<()> {
        let sys = self.kernel().system();
        validate_pattern(&lhs, sys)?;
        let inner = match classify(&lhs, sys) {
            PatternKind::Hold(p) | PatternKind::Condition(p, _) => p.clone(),
            _ => lhs.clone(),
        };
        let tagged = inner.args().iter().any(|a| {
            let a = match classify(a, sys) {
                PatternKind::Named(_, p) => p,
                _ => a,
            };
            a.topmost_symbol() == Some(tag) || matches!(classify(a, sys), PatternKind::Blank(Some(h)) if h.is_symbol(tag))
        });
        if !tagged {
            return Err(PatternError::NoTarget(lhs.to_string()).into());
        }
        store_rule(tag, RuleCacheKind::Up, AccessMode::Write, Rule::new(lhs, rhs, RuleKind::Delayed, sys))
    }

    /// Numeric approximation rule of `sym`, used by [`approximate`](super::approximate::approximate).
    pub fn assign_approx(&self, sym: &Symbol, lhs: Object, rhs: Object) -> EvalResult<()> {
        let sys = self.kernel().system();
        validate_pattern(&lhs, sys)?;
        store_rule(sym, RuleCacheKind::Approx, AccessMode::Write, Rule::new(lhs, rhs, RuleKind::Delayed, sys))
    }

    /// Display rule of `sym`, used by [`apply_format`](super::approximate::apply_format).
    pub fn assign_format(&self, sym: &Symbol, lhs: Object, rhs: Object) -> EvalResult<()> {
        let sys = self.kernel().system();
        validate_pattern(&lhs, sys)?;
        store_rule(sym, RuleCacheKind::Format, AccessMode::Write, Rule::new(lhs, rhs, RuleKind::Delayed, sys))
    }

    /// Default value for `Optional` slots of `sym`, keyed by `Default(sym[, i[, n]])`.
    /// Allowed on Protected symbols.
    pub fn set_default(&self, sym: &Symbol, lhs: Object, value: Object) -> EvalResult<()> {
        let sys = self.kernel().system();
        store_rule(sym, RuleCacheKind::Default, AccessMode::WriteOptions, Rule::new(lhs, value, RuleKind::Immediate, sys))
    }

    /// Remove the definitions made for exactly `lhs`. Returns whether anything was removed.
    pub fn unassign(&self, lhs: &Object) -> EvalResult<bool> {
        let sys = self.kernel().system();
        let (sym, cache) = definition_target(lhs, sys)?;
        let mut removed = false;
        if cache == RuleCacheKind::Own && lhs.is_symbol(&sym) {
            if sym.has_attribute(Attributes::THREAD_LOCAL) {
                removed |= self.unset_local(&sym).is_some();
            } else if sym.value().is_some() {
                sym.set_value(None)?;
                removed = true;
            }
        }
        if sym.rules_snapshot(cache).is_some() {
            if let Some(mut store) = sym.get_rules(AccessMode::Write)? {
                removed |= store.cache_mut(cache)?.remove(lhs, sys);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::eval::errors::EvalError;
    use crate::backend::kernel::Kernel;

    #[test]
    fn test_targets() {
        let k = Kernel::new_default();
        let sys = k.system();
        let f = k.symbol("f");
        let x = k.symbol("x");
        let down = Object::call(&f, vec![sys.named_blank(&x)]);
        assert_eq!(definition_target(&down, sys).unwrap(), (f.clone(), RuleCacheKind::Down));
        let sub = Object::call(down.clone(), vec![sys.blank()]);
        assert_eq!(definition_target(&sub, sys).unwrap(), (f.clone(), RuleCacheKind::Sub));
        let own = sys.hold_pattern(Object::from(&x));
        assert_eq!(definition_target(&own, sys).unwrap(), (x, RuleCacheKind::Own));
        assert!(definition_target(&sys.blank(), sys).is_err());
    }

    #[test]
    fn test_immediate_symbol_sets_value() {
        let k = Kernel::new_default();
        let ctx = k.root_context();
        let x = k.symbol("x");
        ctx.assign(Object::from(&x), Object::Integer(3)).unwrap();
        assert_eq!(x.value(), Some(Object::Integer(3)));
        assert!(ctx.unassign(&Object::from(&x)).unwrap());
        assert_eq!(x.value(), None);
    }

    #[test]
    fn test_delayed_symbol_is_own_rule() {
        let k = Kernel::new_default();
        let ctx = k.root_context();
        let x = k.symbol("x");
        let y = k.symbol("y");
        ctx.assign_delayed(Object::from(&x), Object::from(&y)).unwrap();
        assert_eq!(x.value(), None);
        assert_eq!(ctx.evaluate(Object::from(&x)).unwrap(), Object::from(&y));
        y.set_value(Some(Object::Integer(2))).unwrap();
        assert_eq!(ctx.evaluate(Object::from(&x)).unwrap(), Object::Integer(2));
    }

    #[test]
    fn test_protected_refuses() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let lhs = sys.list(vec![sys.blank()]);
        let err = ctx.assign_delayed(lhs, Object::Integer(1)).unwrap_err();
        assert!(matches!(err, EvalError::Symbol(SymbolError::Protected(_))));
    }

    #[test]
    fn test_malformed_pattern_refused() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        let lhs = Object::call(&f, vec![sys.repeated(sys.blank_null_sequence())]);
        let err = ctx.assign_delayed(lhs, Object::Integer(1)).unwrap_err();
        assert!(matches!(err, EvalError::Pattern(PatternError::NestedRepeated(_))));
    }

    #[test]
    fn test_up_rule() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let g = k.symbol("g");
        let area = k.symbol("area");
        let lhs = Object::call(&area, vec![Object::call(&g, vec![sys.blank()])]);
        ctx.assign_up(&g, lhs, Object::from("up")).unwrap();
        assert!(area.rules_snapshot(RuleCacheKind::Down).is_none());
        let subject = Object::call(&area, vec![Object::call(&g, vec![Object::Integer(1)])]);
        assert_eq!(ctx.evaluate(subject).unwrap(), Object::from("up"));

        let unrelated = Object::call(&area, vec![sys.blank()]);
        assert!(ctx.assign_up(&g, unrelated, Object::Integer(0)).is_err());
    }

    #[test]
    fn test_default_allowed_on_protected() {
        let k = Kernel::new_default();
        let sys = k.system();
        let ctx = k.root_context();
        let f = k.symbol("f");
        f.store_attributes(Attributes::PROTECTED);
        let key = Object::call(&sys.default, vec![Object::from(&f)]);
        ctx.set_default(&f, key, Object::Integer(0)).unwrap();
        assert!(f.rules_snapshot(RuleCacheKind::Default).is_some());
    }
}
