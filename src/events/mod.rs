//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the engine, chain
//! executors, the dependency registry, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine`, `ChainExecutor`, `DependencyRegistry`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Engine::subscriber_listener()` (fans out to
//!   `SubscriberSet` and updates `ChainTracker`), plus any external
//!   `Bus::subscribe()` receiver.
//!
//! Events are observability only: the lifecycle protocol itself travels over
//! each chain's private inbox, never over this bus.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
