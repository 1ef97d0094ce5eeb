//! Evaluation errors
//!
//! A failed match is not an error: matching returns `Option`/`bool`. The
//! variants here are the conditions that unwind evaluation until a catch
//! point or the top level.

use std::fmt;

use crate::backend::models::{AllocError, Object};
use crate::backend::pattern::PatternError;
use crate::backend::symbol::SymbolError;

/// Error type for evaluation
#[derive(Debug, Clone)]
pub enum EvalError {
    /// `Throw(x)` travelling to the nearest `Catch`
    Thrown(Object),

    /// Abort requested, or a time constraint expired
    Aborted,

    /// Nested evaluation exceeded the configured depth
    RecursionLimit { depth: usize },

    /// A constructor could not allocate its storage
    AllocationFailure { requested: usize },

    /// Malformed pattern in a definition
    Pattern(PatternError),

    /// Definition refused by the target symbol
    Symbol(SymbolError),
}

impl EvalError {
    /// True for errors that stop the whole evaluation rather than a single operation
    pub fn is_abort(&self) -> bool {
        matches!(self, EvalError::Aborted)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Thrown(obj) => write!(f, "Uncaught Throw({})", obj),
            EvalError::Aborted => write!(f, "Evaluation aborted"),
            EvalError::RecursionLimit { depth } => write!(f, "Recursion depth of {} exceeded", depth),
            EvalError::AllocationFailure { requested } => {
                write!(f, "Allocation of {} items failed", requested)
            }
            EvalError::Pattern(e) => write!(f, "{}", e),
            EvalError::Symbol(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Pattern(e) => Some(e),
            EvalError::Symbol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for EvalError {
    fn from(e: AllocError) -> Self {
        EvalError::AllocationFailure { requested: e.requested }
    }
}

impl From<PatternError> for EvalError {
    fn from(e: PatternError) -> Self {
        EvalError::Pattern(e)
    }
}

impl From<SymbolError> for EvalError {
    fn from(e: SymbolError) -> Self {
        EvalError::Symbol(e)
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
