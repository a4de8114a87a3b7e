//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized settings for the engine runtime.
//!
//! Config is used in two ways:
//! 1. **Engine creation**: `Engine::builder(config)`
//! 2. **Chain defaults**: chains without their own retry override inherit
//!    [`Config::retry`]

use std::time::Duration;

use crate::policies::RetryPolicy;

/// Global configuration for the engine runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for chains to drain on shutdown (`0s` = no wait)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `retry`: default creation-retry policy (overridable per chain)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for all chains to drain before giving up.
    ///
    /// When shutdown starts, every chain begins a full cascade; the engine
    /// waits up to `grace` and then reports the stuck chains via
    /// [`EngineError::GraceExceeded`](crate::EngineError::GraceExceeded).
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// Default creation-retry policy for chains without an override.
    pub retry: RetryPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `retry = RetryPolicy::default()`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            retry: RetryPolicy::default(),
        }
    }
}
