//! Text form of objects
//!
//! `Display` writes the input-like full form: `f(a, b)`, `{a, b}` for lists,
//! quoted strings with escapes. Formatting rules are not consulted here; see
//! `eval::approximate::apply_format` for the rule-driven path.

use std::fmt;

use super::object::{Magic, Object};
use super::Expr;

const LIST_NAME: &str = "List";

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Object]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self.head(), Object::Symbol(s) if s.name() == LIST_NAME) {
            f.write_str("{")?;
            write_args(f, self.args())?;
            return f.write_str("}");
        }
        match self.head() {
            Object::Expr(_) | Object::Symbol(_) | Object::Magic(_) => write!(f, "{}", self.head())?,
            other => write!(f, "({})", other)?,
        }
        f.write_str("(")?;
        write_args(f, self.args())?;
        f.write_str(")")
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Magic(Magic::Null) => f.write_str("Null"),
            Object::Magic(Magic::Undefined) => f.write_str("Undefined"),
            Object::Magic(Magic::PatternSequence) => f.write_str("PatternSequence"),
            Object::Integer(i) => write!(f, "{}", i),
            Object::Float(x) => write!(f, "{:?}", x),
            Object::String(s) => s.write_escaped(f),
            Object::Symbol(s) => f.write_str(s.name()),
            Object::Expr(e) => write!(f, "{}", e),
            Object::Custom(c) => c.write(f),
        }
    }
}
