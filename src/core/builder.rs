//! # Engine builder.
//!
//! Wires the runtime together: event bus, dependency registry, live-instance
//! tracker, and the subscriber fan-out set.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{tracker::ChainTracker, Config, Engine};
use crate::events::Bus;
use crate::registry::DependencyRegistry;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing an [`Engine`].
pub struct EngineBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (instance lifecycle, cascades,
    /// registry changes) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds and returns the engine instance.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// the event bus, the dependency registry, the live-instance tracker,
    /// and the subscriber workers.
    pub fn build(self) -> Arc<Engine> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let registry = Arc::new(DependencyRegistry::new(bus.clone()));
        let tracker = Arc::new(ChainTracker::new());
        let runtime_token = CancellationToken::new();

        Arc::new(Engine::new_internal(
            self.cfg,
            bus,
            subs,
            registry,
            tracker,
            runtime_token,
        ))
    }
}
