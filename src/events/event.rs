//! # Runtime events emitted by the engine, executors, and registry.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Instance lifecycle**: per-instance state transitions within a chain
//! - **Chain events**: cascade progress and chain-level terminal states
//! - **Registry events**: publications appearing/withdrawing and selection changes
//! - **Engine events**: shutdown progress and subscriber-worker faults
//!
//! The [`Event`] struct carries additional metadata such as timestamps, chain
//! name, instance index, action label, publication name, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use chainvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::InstanceDown)
//!     .with_chain("lan")
//!     .with_index(2)
//!     .with_action("gate");
//!
//! assert_eq!(ev.kind, EventKind::InstanceDown);
//! assert_eq!(ev.chain.as_deref(), Some("lan"));
//! assert_eq!(ev.index, Some(2));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `action` (subscriber name), `reason`.
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `action` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed or [`Engine::shutdown`](crate::Engine::shutdown) called).
    ShutdownRequested,

    /// All chains drained within the configured grace period.
    AllDrainedWithin,

    /// Grace period exceeded; some chains still held live instances.
    GraceExceeded,

    // === Instance lifecycle events ===
    /// Instance created at the chain's cursor; it starts in `Down`.
    ///
    /// Sets: `chain`, `index`, `action`.
    InstanceCreated,

    /// Instance reported its wait condition satisfied.
    ///
    /// Sets: `chain`, `index`, `action`.
    InstanceUp,

    /// Instance reported loss of its condition while `Up`.
    ///
    /// Sets: `chain`, `index`, `action`.
    InstanceDown,

    /// The executor requested termination of the instance.
    ///
    /// Sets: `chain`, `index`, `action`.
    InstanceDying,

    /// Instance finished dying and was removed from the chain.
    ///
    /// Sets: `chain`, `index`, `action`.
    InstanceRemoved,

    /// Creation at the cursor failed (unresolved argument or factory error).
    ///
    /// Sets: `chain`, `index`, `action`, `reason`.
    SpawnFailed,

    /// A failed creation was scheduled for a re-attempt.
    ///
    /// Sets: `chain`, `index`, `delay_ms`.
    RetryScheduled,

    // === Chain events ===
    /// Forward progress started for a chain.
    ///
    /// Sets: `chain`.
    ChainStarted,

    /// A backward cascade began.
    ///
    /// Sets: `chain`, `index` (lowest index that will remain untouched).
    CascadeStarted,

    /// A backward cascade ran to completion and the chain settled.
    ///
    /// Sets: `chain`, `index`.
    CascadeSettled,

    /// The chain removed its last instance during teardown.
    ///
    /// Sets: `chain`.
    ChainDrained,

    /// The chain's executor stopped due to a lifecycle-protocol violation.
    ///
    /// Sets: `chain`, `index`, `reason`.
    ChainFaulted,

    // === Registry events ===
    /// A publication became active under a name.
    ///
    /// Sets: `chain` (publisher's chain), `name`.
    PublicationAdded,

    /// A publication finished withdrawing (all bound subscribers released it).
    ///
    /// Sets: `chain` (publisher's chain), `name`.
    PublicationWithdrawn,

    /// A subscription bound to a publication, or unbound from one.
    ///
    /// Sets: `chain` (subscriber's chain), `name` (selected publication name,
    /// absent when the subscription dropped to waiting).
    SelectionChanged,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the chain, if applicable.
    pub chain: Option<Arc<str>>,
    /// Instance index within the chain, if applicable.
    pub index: Option<usize>,
    /// Action label (or subscriber name), if applicable.
    pub action: Option<Arc<str>>,
    /// Publication name, if applicable.
    pub name: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Retry delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            chain: None,
            index: None,
            action: None,
            name: None,
            reason: None,
            delay_ms: None,
        }
    }

    /// Attaches a chain name.
    #[inline]
    pub fn with_chain(mut self, chain: impl Into<Arc<str>>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    /// Attaches an instance index.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attaches an action label (or subscriber name).
    #[inline]
    pub fn with_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches a publication name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_action(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_action(subscriber)
            .with_reason(info)
    }
}
