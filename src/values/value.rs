//! # Value model for exposed data.
//!
//! [`Value`] is the unit of data an action instance exposes to later
//! instances in its chain and, through a publication, to subscribers in
//! other chains. Values are strings or lists of values; both variants are
//! `Arc`-backed so cloning a value (or a whole [`ValueMap`] snapshot) is cheap.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A string or a list of values.
///
/// ### Properties
/// - **Cheap to clone**: both variants hold `Arc`-backed storage.
/// - **Immutable**: a value never changes after construction; instances that
///   need to change what they expose must tear down and rebuild, which is
///   exactly what the cascade protocol enforces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// A string scalar.
    Str(Arc<str>),
    /// An ordered list of values.
    List(Arc<[Value]>),
}

impl Value {
    /// Creates a string value.
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Creates a list value.
    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Value::List(items.into().into())
    }

    /// Returns the string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Returns the list contents, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::Str(_) => None,
            Value::List(items) => Some(items),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

/// Named values exposed by an instance while it is `Up`.
///
/// Snapshots of this map travel through the dependency registry: a
/// publication stores the publisher's map at registration time, and a bound
/// subscription re-exposes that snapshot to its own chain.
pub type ValueMap = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_list() {
        let v = Value::list(vec![
            Value::str("eth0"),
            Value::list(vec![Value::str("a"), Value::str("b")]),
        ]);
        assert_eq!(v.to_string(), "[eth0, [a, b]]");
    }

    #[test]
    fn accessors() {
        let s = Value::str("x");
        assert_eq!(s.as_str(), Some("x"));
        assert!(s.as_list().is_none());

        let l = Value::list(vec![Value::str("x")]);
        assert!(l.as_str().is_none());
        assert_eq!(l.as_list().map(|items| items.len()), Some(1));
    }
}
