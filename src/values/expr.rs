//! # Argument expressions and creation-time resolution.
//!
//! Chain descriptors carry [`ArgExpr`]s rather than plain values: an argument
//! is either a literal or a positional reference into the owning chain. The
//! executor resolves the whole argument list with [`resolve_args`] immediately
//! before creating an instance, so a created instance only ever sees concrete
//! [`Value`]s.
//!
//! ## Rules
//! - References are resolved by **declared position**, never by name search.
//! - A reference must point strictly before the instance being created.
//! - The referenced instance must be `Up` and expose the requested name;
//!   otherwise resolution fails and the instance is never created.

use crate::error::ActionError;
use crate::values::{Value, ValueMap};

/// An argument expression in a chain descriptor.
#[derive(Clone, Debug)]
pub enum ArgExpr {
    /// A literal value, passed through unchanged.
    Lit(Value),
    /// A reference to the value `name` exposed by the instance at `index`
    /// in the same chain.
    Ref {
        /// Position of the referenced instance within the chain.
        index: usize,
        /// Name of the exposed value to read.
        name: String,
    },
}

impl ArgExpr {
    /// Creates a literal argument.
    pub fn lit(v: impl Into<Value>) -> Self {
        ArgExpr::Lit(v.into())
    }

    /// Creates a positional reference to an exposed value.
    pub fn var(index: usize, name: impl Into<String>) -> Self {
        ArgExpr::Ref {
            index,
            name: name.into(),
        }
    }
}

/// Read-only view of a chain's instance array used during resolution.
///
/// Implemented by the chain executor over its slot array. `exposed` returns
/// `None` when the instance at `index` does not exist or is not `Up`.
pub trait ValueScope {
    /// Returns the exposed values of the instance at `index`, if it is `Up`.
    fn exposed(&self, index: usize) -> Option<&ValueMap>;
}

/// Resolves an argument list against the owning chain's instance array.
///
/// Fails with [`ActionError::Unresolved`] on the first reference that cannot
/// be satisfied; the caller treats this as an immediately-failed creation.
pub fn resolve_args(args: &[ArgExpr], scope: &dyn ValueScope) -> Result<Vec<Value>, ActionError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            ArgExpr::Lit(v) => out.push(v.clone()),
            ArgExpr::Ref { index, name } => {
                let map = scope.exposed(*index).ok_or_else(|| ActionError::Unresolved {
                    what: format!("#{index}.{name}"),
                })?;
                let v = map.get(name).ok_or_else(|| ActionError::Unresolved {
                    what: format!("#{index}.{name}"),
                })?;
                out.push(v.clone());
            }
        }
    }
    Ok(out)
}
