//! # Action descriptor for one chain position.
//!
//! [`ActionSpec`] bundles a factory with the argument expressions resolved at
//! each creation of the position. Descriptors are fixed at load time; only
//! the resolved argument *values* change between incarnations.

use std::sync::Arc;

use crate::actions::FactoryRef;
use crate::values::ArgExpr;

/// Descriptor for one position in a chain.
///
/// ## Example
/// ```
/// use chainvisor::{ActionSpec, ArgExpr, Expose};
///
/// // Expose a literal and a value read from instance #0.
/// let spec: ActionSpec = Expose::spec([
///     ("ifname", ArgExpr::lit("eth0")),
///     ("addr", ArgExpr::var(0, "addr")),
/// ]);
/// assert_eq!(spec.label(), "expose");
/// ```
#[derive(Clone)]
pub struct ActionSpec {
    factory: FactoryRef,
    args: Vec<ArgExpr>,
    label: Arc<str>,
}

impl ActionSpec {
    /// Creates a descriptor with no arguments.
    pub fn new(factory: FactoryRef) -> Self {
        let label: Arc<str> = factory.label().into();
        Self {
            factory,
            args: Vec::new(),
            label,
        }
    }

    /// Sets the argument expressions.
    pub fn with_args(mut self, args: Vec<ArgExpr>) -> Self {
        self.args = args;
        self
    }

    /// Short label for logs and events.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn label_arc(&self) -> Arc<str> {
        Arc::clone(&self.label)
    }

    pub(crate) fn factory(&self) -> &FactoryRef {
        &self.factory
    }

    pub(crate) fn args(&self) -> &[ArgExpr] {
        &self.args
    }
}
