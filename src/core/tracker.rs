//! # Live-instance tracker for stuck-chain detection.
//!
//! Maintains the set of currently existing instances per chain by listening
//! to lifecycle events, using event sequence numbers to reject stale
//! deliveries.
//!
//! ## Architecture
//! ```text
//! Executors ──► Bus ──► Engine listener ──► ChainTracker::update()
//!                                                  │
//!                                                  ▼
//!                                 HashMap<chain, {last_seq, HashSet<index>}>
//! ```
//!
//! During shutdown the engine calls [`ChainTracker::snapshot`] after the
//! grace period to name the chains that still hold live instances.
//!
//! ## Rules
//! - Only existence-changing events mutate state (`InstanceCreated`,
//!   `InstanceRemoved`, `ChainDrained`).
//! - Ordering is guarded **per chain**: one executor publishes a chain's
//!   lifecycle events sequentially, so within a chain `seq` is monotonic and
//!   events with `seq <= last_seq` are stale.
//! - Read operations are eventually consistent.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Default)]
struct ChainState {
    last_seq: u64,
    live: HashSet<usize>,
}

/// Thread-safe tracker of live instances per chain.
#[derive(Default)]
pub(crate) struct ChainTracker {
    state: RwLock<HashMap<String, ChainState>>,
}

impl ChainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event if it is newer than the chain's last seen one.
    pub async fn update(&self, ev: &Event) {
        if !matches!(
            ev.kind,
            EventKind::InstanceCreated | EventKind::InstanceRemoved | EventKind::ChainDrained
        ) {
            return;
        }
        let Some(chain) = ev.chain.as_deref() else {
            return;
        };

        let mut state = self.state.write().await;
        let entry = state.entry(chain.to_string()).or_default();
        if ev.seq <= entry.last_seq && entry.last_seq != 0 {
            return;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::InstanceCreated => {
                if let Some(index) = ev.index {
                    entry.live.insert(index);
                }
            }
            EventKind::InstanceRemoved => {
                if let Some(index) = ev.index {
                    entry.live.remove(&index);
                }
            }
            EventKind::ChainDrained => {
                entry.live.clear();
            }
            _ => {}
        }
    }

    /// Returns the sorted names of chains that still hold live instances.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut chains: Vec<String> = state
            .iter()
            .filter(|(_, cs)| !cs.live.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        chains.sort_unstable();
        chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_create_and_remove() {
        let tracker = ChainTracker::new();
        tracker
            .update(&Event::new(EventKind::InstanceCreated).with_chain("a").with_index(0))
            .await;
        tracker
            .update(&Event::new(EventKind::InstanceCreated).with_chain("b").with_index(0))
            .await;
        assert_eq!(tracker.snapshot().await, vec!["a", "b"]);

        tracker
            .update(&Event::new(EventKind::InstanceRemoved).with_chain("a").with_index(0))
            .await;
        assert_eq!(tracker.snapshot().await, vec!["b"]);

        tracker.update(&Event::new(EventKind::ChainDrained).with_chain("b")).await;
        assert!(tracker.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let tracker = ChainTracker::new();
        let created = Event::new(EventKind::InstanceCreated).with_chain("a").with_index(0);
        let removed = Event::new(EventKind::InstanceRemoved).with_chain("a").with_index(0);

        tracker.update(&created).await;
        tracker.update(&removed).await;
        // A re-delivered old event must not resurrect the instance.
        tracker.update(&created).await;
        assert!(tracker.snapshot().await.is_empty());
    }
}
