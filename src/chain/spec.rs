//! # Chain specification.
//!
//! [`ChainSpec`] describes one configured process: a unique name and the
//! ordered sequence of action descriptors, fixed at load time. The sequence
//! order *is* the dependency order — instance `i + 1` is created only once
//! instance `i` is `Up`, and torn down before instance `i` may settle a new
//! state.

use std::sync::Arc;

use crate::actions::ActionSpec;
use crate::policies::RetryPolicy;

/// Ordered list of action descriptors for one process.
///
/// ## Example
/// ```
/// use chainvisor::{ArgExpr, ChainSpec, Depend, Expose};
///
/// let chain = ChainSpec::new("lan")
///     .action(Depend::spec(ArgExpr::lit("uplink")))
///     .action(Expose::spec([("addr", ArgExpr::var(0, "addr"))]));
///
/// assert_eq!(chain.name(), "lan");
/// assert_eq!(chain.len(), 2);
/// ```
#[derive(Clone)]
pub struct ChainSpec {
    name: Arc<str>,
    actions: Vec<ActionSpec>,
    retry: Option<RetryPolicy>,
}

impl ChainSpec {
    /// Creates an empty chain with the given process name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            retry: None,
        }
    }

    /// Appends an action descriptor at the next position.
    pub fn action(mut self, spec: ActionSpec) -> Self {
        self.actions.push(spec);
        self
    }

    /// Overrides the creation-retry policy for this chain.
    ///
    /// Without an override the engine's [`Config::retry`](crate::Config)
    /// default applies.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// The process name (unique across the configuration).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of configured positions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the chain has no positions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub(crate) fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }
}
