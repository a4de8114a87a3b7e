//! # Event subscribers for the chainvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery for
//! handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Executor/Registry ── publish(Event) ──► Bus ──► Engine listener
//!                                                        │
//!                                                   SubscriberSet::emit(&Event)
//!                                              ┌─────────┼─────────┐
//!                                              ▼         ▼         ▼
//!                                          [queue S1] [queue S2] [queue SN]
//!                                              │         │         │
//!                                          worker S1 worker S2 worker SN
//!                                              ▼         ▼         ▼
//!                                        sub.on_event(&Event) (per subscriber)
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use async_trait::async_trait;
//! use chainvisor::{Event, EventKind, Subscribe};
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ChainFaulted) {
//!             // increment a counter, page someone, ...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "metrics" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
