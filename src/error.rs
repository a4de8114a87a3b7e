//! Error types used by the chainvisor runtime and actions.
//!
//! This module defines three error types:
//!
//! - [`EngineError`] — errors raised by the orchestration runtime itself.
//! - [`ActionError`] — errors raised while creating or starting a single action instance.
//! - [`ChainFault`] — lifecycle-protocol violations that terminate one chain's processing.
//!
//! The first two provide helper methods (`as_label`, `as_message`) for logging/metrics.
//!
//! [`ActionError`]s are recovered locally: the owning chain treats the failed
//! creation as an instance that never existed and re-attempts it per its
//! [`RetryPolicy`](crate::RetryPolicy). A [`ChainFault`] is not recoverable —
//! the affected chain stops processing and is reported on the event bus;
//! other chains continue.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the chainvisor runtime.
///
/// These represent failures in the orchestration system itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Shutdown grace period was exceeded; some chains still held live instances.
    #[error("shutdown grace {grace:?} exceeded; stuck chains: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of chains that did not fully drain in time.
        stuck: Vec<String>,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chainvisor::EngineError;
    /// use std::time::Duration;
    ///
    /// let err = EngineError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "engine_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::GraceExceeded { .. } => "engine_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EngineError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck chains={stuck:?}")
            }
        }
    }
}

/// # Errors produced while creating or starting one action instance.
///
/// A creation-time error means the instance never existed: the chain keeps
/// its current prefix and schedules a re-attempt. A running instance signals
/// loss of its condition through its report handle, not through this type.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ActionError {
    /// An argument expression referenced an exposed value that does not exist
    /// or whose owner is not `Up`.
    #[error("unresolved argument: {what}")]
    Unresolved {
        /// What was looked up (e.g. `#2.ifname`).
        what: String,
    },

    /// An exclusive publication name is already taken.
    #[error("publication name already taken: {name}")]
    DuplicatePublication {
        /// The contested publication name.
        name: String,
    },

    /// The action could not be constructed or started.
    #[error("action failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },
}

impl ActionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chainvisor::ActionError;
    ///
    /// let err = ActionError::Unresolved { what: "#0.addr".into() };
    /// assert_eq!(err.as_label(), "action_unresolved");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ActionError::Unresolved { .. } => "action_unresolved",
            ActionError::DuplicatePublication { .. } => "action_duplicate_publication",
            ActionError::Failed { .. } => "action_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ActionError::Unresolved { what } => format!("unresolved: {what}"),
            ActionError::DuplicatePublication { name } => format!("duplicate publication: {name}"),
            ActionError::Failed { error } => format!("failed: {error}"),
        }
    }
}

/// # Lifecycle-protocol violation (fatal for one chain).
///
/// Raised when an action instance breaks the lifecycle contract: reporting
/// `Up` while already `Up`, `Down` while not `Up`, or termination while not
/// `Dying`. The chain's ordering invariants no longer hold, so its executor
/// stops and publishes [`EventKind::ChainFaulted`](crate::EventKind::ChainFaulted).
/// Other chains are unaffected except through normal dependency teardown.
#[derive(Error, Debug, Clone)]
#[error("chain {chain}: protocol violation at #{index}: {detail}")]
pub struct ChainFault {
    /// Name of the faulted chain.
    pub chain: String,
    /// Index of the offending instance.
    pub index: usize,
    /// What the instance did wrong.
    pub detail: String,
}

impl ChainFault {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "chain_protocol_violation"
    }
}
