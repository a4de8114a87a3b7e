//! # ChainExecutor: forward/backward protocol for one chain.
//!
//! Drives one process's ordered list of action instances. Forward progress
//! keeps a cursor at the first non-existent instance and creates it whenever
//! the instance immediately before it is `Up`. Backward progress is the
//! cascade: when the instance at index *i* leaves `Up` (or the whole chain is
//! torn down), every instance after *i* is terminated strictly tail-first,
//! one at a time, each waiting for the previous removal to complete.
//!
//! ## Event flow
//! ```text
//! forward:
//!   create(cursor) ──► start(link) ──► [InstanceCreated]
//!        │                               └─ instance reports Up ─► [InstanceUp]
//!        │                                  cursor advances, repeat
//!        └─ creation fails ─► [SpawnFailed] ─► [RetryScheduled] ─► sleep ─► retry
//!
//! backward (Down at i, or drain):
//!   [CascadeStarted]
//!   stop(tail) ─► [InstanceDying] ─► wait terminated ─► [InstanceRemoved]
//!   ... strictly decreasing indexes ...
//!   [CascadeSettled] ─► settled() on the trigger instance
//! ```
//!
//! ## Rules
//! - At most one instance is transitioning at any instant; instances strictly
//!   before the cursor's predecessor are always `Up`.
//! - A cascade, once started on an instance, runs to completion; new `Down`
//!   reports below only lower the boundary of the same cascade — cascades
//!   never run concurrently within one chain.
//! - No instance is ever created at an index scheduled for termination.
//! - Reports from removed incarnations (stale epochs) are dropped silently;
//!   reports that break the lifecycle contract fault the chain.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{self, Sleep};
use tokio_util::sync::CancellationToken;

use crate::actions::{ActionLink, BuildCtx, Report, ReportMsg};
use crate::chain::instance::{InstanceState, Slot};
use crate::chain::ChainSpec;
use crate::error::{ActionError, ChainFault};
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;
use crate::registry::DependencyRegistry;
use crate::values::{resolve_args, ValueMap, ValueScope};

/// One in-progress backward cascade.
///
/// Removes every slot with index `>= keep`, tail-first. `settle` is set for
/// `Up → Down`-triggered cascades: the instance at `keep - 1` gets its
/// `settled()` hook once the tail is gone. `started` tracks whether any
/// teardown was actually requested, so trivial cascades (nothing after the
/// trigger) emit no cascade events.
struct Cascade {
    keep: usize,
    settle: bool,
    started: bool,
}

/// Executes one chain: owns its slots, its inbox, and nothing else.
pub(crate) struct ChainExecutor {
    spec: ChainSpec,
    retry: RetryPolicy,
    bus: Bus,
    registry: Arc<DependencyRegistry>,
    tx: mpsc::UnboundedSender<ReportMsg>,
    rx: Option<mpsc::UnboundedReceiver<ReportMsg>>,

    slots: Vec<Slot>,
    cascade: Option<Cascade>,
    draining: bool,
    attempts: u32,
    retry_sleep: Option<Pin<Box<Sleep>>>,
    next_epoch: u64,
}

/// Resolution view over the built prefix: only `Up` instances expose values.
struct SlotScope<'a>(&'a [Slot]);

impl ValueScope for SlotScope<'_> {
    fn exposed(&self, index: usize) -> Option<&ValueMap> {
        self.0
            .get(index)
            .filter(|s| s.state == InstanceState::Up)
            .and_then(|s| s.values.as_deref())
    }
}

enum Tick {
    Msg(Option<ReportMsg>),
    Cancelled,
    Retry,
}

impl ChainExecutor {
    pub(crate) fn new(
        spec: ChainSpec,
        retry: RetryPolicy,
        bus: Bus,
        registry: Arc<DependencyRegistry>,
        tx: mpsc::UnboundedSender<ReportMsg>,
        rx: mpsc::UnboundedReceiver<ReportMsg>,
    ) -> Self {
        Self {
            spec,
            retry,
            bus,
            registry,
            tx,
            rx: Some(rx),
            slots: Vec::new(),
            cascade: None,
            draining: false,
            attempts: 0,
            retry_sleep: None,
            next_epoch: 0,
        }
    }

    /// Runs the chain until it drains (after cancellation) or faults.
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<(), ChainFault> {
        self.bus
            .publish(Event::new(EventKind::ChainStarted).with_chain(self.spec.name_arc()));

        let mut rx = self.rx.take().expect("executor runs once");
        match self.drive(&mut rx, &token).await {
            Ok(()) => Ok(()),
            Err(fault) => {
                self.bus.publish(
                    Event::new(EventKind::ChainFaulted)
                        .with_chain(self.spec.name_arc())
                        .with_index(fault.index)
                        .with_reason(fault.detail.clone()),
                );
                Err(fault)
            }
        }
    }

    async fn drive(
        &mut self,
        rx: &mut mpsc::UnboundedReceiver<ReportMsg>,
        token: &CancellationToken,
    ) -> Result<(), ChainFault> {
        self.pump().await;

        loop {
            if self.draining && self.cascade.is_none() && self.slots.is_empty() {
                self.bus
                    .publish(Event::new(EventKind::ChainDrained).with_chain(self.spec.name_arc()));
                return Ok(());
            }

            let tick = {
                let retry = self.retry_sleep.as_mut();
                tokio::select! {
                    m = rx.recv() => Tick::Msg(m),
                    _ = token.cancelled(), if !self.draining => Tick::Cancelled,
                    _ = async {
                        match retry {
                            Some(sleep) => sleep.as_mut().await,
                            None => futures::future::pending().await,
                        }
                    } => Tick::Retry,
                }
            };

            match tick {
                Tick::Msg(None) => return Ok(()),
                Tick::Msg(Some(msg)) => self.handle_report(msg).await?,
                Tick::Cancelled => self.begin_drain(),
                Tick::Retry => self.retry_sleep = None,
            }

            if self.cascade.is_some() {
                self.advance_cascade().await;
            }
            if self.cascade.is_none() {
                self.pump().await;
            }
        }
    }

    /// Applies one report from an instance (or the registry on its behalf).
    async fn handle_report(&mut self, msg: ReportMsg) -> Result<(), ChainFault> {
        let Some(slot) = self.slots.get_mut(msg.index) else {
            return Ok(()); // stale: position no longer exists
        };
        if slot.epoch != msg.epoch {
            return Ok(()); // stale: position was rebuilt since
        }

        match (msg.report, slot.state) {
            (Report::Up, InstanceState::Down) => {
                slot.state = InstanceState::Up;
                slot.values = slot.action.values();
                self.publish_instance(EventKind::InstanceUp, msg.index);
            }
            (Report::Down, InstanceState::Up) => {
                slot.state = InstanceState::Down;
                slot.values = None;
                self.publish_instance(EventKind::InstanceDown, msg.index);
                self.start_cascade(msg.index + 1);
            }
            // The teardown decision is irrevocable; only termination matters now.
            (Report::Up | Report::Down, InstanceState::Dying) => {}
            (Report::Terminated, InstanceState::Dying) => {
                if msg.index + 1 != self.slots.len() {
                    return Err(self.fault(msg.index, "terminated out of cascade order"));
                }
                let slot = self.slots.pop().expect("tail exists");
                self.bus.publish(
                    Event::new(EventKind::InstanceRemoved)
                        .with_chain(self.spec.name_arc())
                        .with_index(msg.index)
                        .with_action(slot.label),
                );
            }
            (Report::Up, InstanceState::Up) => {
                return Err(self.fault(msg.index, "reported up while already up"));
            }
            (Report::Down, InstanceState::Down) => {
                return Err(self.fault(msg.index, "reported down while not up"));
            }
            (Report::Terminated, InstanceState::Up | InstanceState::Down) => {
                return Err(self.fault(msg.index, "reported terminated while not dying"));
            }
        }
        Ok(())
    }

    /// Starts (or lowers) the cascade so that slots with index >= `keep` go.
    ///
    /// Forward state is invalidated either way: a pending creation retry is
    /// dropped and its attempt counter reset.
    fn start_cascade(&mut self, keep: usize) {
        self.attempts = 0;
        self.retry_sleep = None;
        match &mut self.cascade {
            None => {
                self.cascade = Some(Cascade {
                    keep,
                    settle: true,
                    started: false,
                });
            }
            Some(c) => {
                if keep < c.keep {
                    c.keep = keep;
                    c.settle = true;
                }
            }
        }
    }

    /// Switches to full-teardown mode: everything including index 0 goes.
    fn begin_drain(&mut self) {
        self.draining = true;
        self.attempts = 0;
        self.retry_sleep = None;
        match &mut self.cascade {
            None => {
                self.cascade = Some(Cascade {
                    keep: 0,
                    settle: false,
                    started: false,
                });
            }
            Some(c) => {
                c.keep = 0;
                c.settle = false;
            }
        }
    }

    /// Tears down the tail, one instance at a time, strictly in decreasing
    /// index order; completes the cascade when the boundary is reached.
    async fn advance_cascade(&mut self) {
        let Some(c) = &self.cascade else { return };
        let keep = c.keep;

        if self.slots.len() > keep {
            let idx = self.slots.len() - 1;
            if self.slots[idx].state == InstanceState::Dying {
                return; // waiting for its termination report
            }
            if !self.cascade.as_ref().expect("cascade active").started {
                self.cascade.as_mut().expect("cascade active").started = true;
                self.bus.publish(
                    Event::new(EventKind::CascadeStarted)
                        .with_chain(self.spec.name_arc())
                        .with_index(keep),
                );
            }
            let slot = &mut self.slots[idx];
            slot.state = InstanceState::Dying;
            slot.values = None;
            self.publish_instance(EventKind::InstanceDying, idx);
            self.slots[idx].action.stop().await;
            return;
        }

        let c = self.cascade.take().expect("cascade active");
        if c.started {
            self.bus.publish(
                Event::new(EventKind::CascadeSettled)
                    .with_chain(self.spec.name_arc())
                    .with_index(c.keep),
            );
        }
        if c.settle && c.keep > 0 {
            // The trigger instance settles into Down only now, with
            // everything after it gone.
            self.slots[c.keep - 1].action.settled().await;
        }
    }

    /// Creates the instance at the cursor if its predecessor allows it.
    async fn pump(&mut self) {
        if self.draining || self.cascade.is_some() || self.retry_sleep.is_some() {
            return;
        }
        let cursor = self.slots.len();
        if cursor >= self.spec.actions().len() {
            return;
        }
        if cursor > 0 && self.slots[cursor - 1].state != InstanceState::Up {
            return;
        }
        if let Err(err) = self.create_at(cursor).await {
            self.schedule_retry(cursor, err);
        }
    }

    async fn create_at(&mut self, cursor: usize) -> Result<(), ActionError> {
        let spec = self.spec.actions()[cursor].clone();
        let args = resolve_args(spec.args(), &SlotScope(&self.slots))?;
        let ctx = BuildCtx {
            chain: self.spec.name_arc(),
            registry: Arc::clone(&self.registry),
        };
        let action = spec.factory().build(&ctx, args)?;

        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let link = ActionLink::new(self.spec.name_arc(), cursor, epoch, self.tx.clone());

        self.slots.push(Slot {
            action,
            state: InstanceState::Down,
            epoch,
            label: spec.label_arc(),
            values: None,
        });

        match self.slots[cursor].action.start(link).await {
            Ok(()) => {
                self.attempts = 0;
                self.publish_instance(EventKind::InstanceCreated, cursor);
                Ok(())
            }
            Err(err) => {
                // Never existed: drop the slot before anyone can observe it.
                self.slots.pop();
                Err(err)
            }
        }
    }

    fn schedule_retry(&mut self, cursor: usize, err: ActionError) {
        self.bus.publish(
            Event::new(EventKind::SpawnFailed)
                .with_chain(self.spec.name_arc())
                .with_index(cursor)
                .with_action(self.spec.actions()[cursor].label_arc())
                .with_reason(err.as_message()),
        );
        let delay = self.retry.next(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.bus.publish(
            Event::new(EventKind::RetryScheduled)
                .with_chain(self.spec.name_arc())
                .with_index(cursor)
                .with_delay(delay),
        );
        self.retry_sleep = Some(Box::pin(time::sleep(delay)));
    }

    fn publish_instance(&self, kind: EventKind, index: usize) {
        self.bus.publish(
            Event::new(kind)
                .with_chain(self.spec.name_arc())
                .with_index(index)
                .with_action(Arc::clone(&self.slots[index].label)),
        );
    }

    fn fault(&self, index: usize, detail: &str) -> ChainFault {
        ChainFault {
            chain: self.spec.name().to_string(),
            index,
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionFn, ActionSpec, Expose, Gate};
    use crate::values::ArgExpr;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, watch, Notify};

    fn harness() -> (Bus, Arc<DependencyRegistry>) {
        let bus = Bus::new(256);
        let registry = Arc::new(DependencyRegistry::new(bus.clone()));
        (bus, registry)
    }

    fn spawn_chain(
        spec: ChainSpec,
        bus: &Bus,
        registry: &Arc<DependencyRegistry>,
    ) -> CancellationToken {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = ChainExecutor::new(
            spec,
            RetryPolicy {
                first: Duration::from_millis(10),
                max: Duration::from_millis(50),
                factor: 2.0,
                jitter: crate::policies::JitterPolicy::None,
            },
            bus.clone(),
            Arc::clone(registry),
            tx,
            rx,
        );
        let token = CancellationToken::new();
        tokio::spawn(executor.run(token.clone()));
        token
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<Event>,
        pred: impl Fn(&Event) -> bool,
    ) -> Event {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus open");
                if pred(&ev) {
                    return ev;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn is(kind: EventKind, index: usize) -> impl Fn(&Event) -> bool {
        move |ev| ev.kind == kind && ev.index == Some(index)
    }

    /// Scenario: [config, gate] — the gate flips the tail up and down with
    /// nothing after it, so no instance is ever torn down.
    #[tokio::test]
    async fn tail_gate_flips_without_teardown() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();
        let (flag, flag_rx) = watch::channel(false);

        let spec = ChainSpec::new("t")
            .action(Expose::spec([("who", ArgExpr::lit("a"))]))
            .action(Gate::spec(flag_rx));
        spawn_chain(spec, &bus, &registry);

        next_matching(&mut rx, is(EventKind::InstanceUp, 0)).await;
        next_matching(&mut rx, is(EventKind::InstanceCreated, 1)).await;

        flag.send(true).unwrap();
        next_matching(&mut rx, is(EventKind::InstanceUp, 1)).await;

        flag.send(false).unwrap();
        next_matching(&mut rx, is(EventKind::InstanceDown, 1)).await;

        // The prefix survives: flipping back up needs no re-creation.
        flag.send(true).unwrap();
        let up = next_matching(&mut rx, is(EventKind::InstanceUp, 1)).await;
        assert_eq!(up.chain.as_deref(), Some("t"));
    }

    /// A mid-chain Down removes everything after it in strictly decreasing
    /// index order, then the chain rebuilds to the same prefix.
    #[tokio::test]
    async fn cascade_is_tail_first_and_rebuilds() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();
        let (flag, flag_rx) = watch::channel(true);

        let spec = ChainSpec::new("t")
            .action(Gate::spec(flag_rx))
            .action(Expose::spec([("n", ArgExpr::lit("1"))]))
            .action(Expose::spec([("n", ArgExpr::lit("2"))]))
            .action(Expose::spec([("n", ArgExpr::lit("3"))]));
        spawn_chain(spec, &bus, &registry);

        next_matching(&mut rx, is(EventKind::InstanceUp, 3)).await;

        flag.send(false).unwrap();
        let mut removed = Vec::new();
        let settled = loop {
            let ev = rx.recv().await.expect("bus open");
            match ev.kind {
                EventKind::InstanceRemoved => removed.push(ev.index.unwrap()),
                EventKind::CascadeSettled => break ev,
                _ => {}
            }
        };
        assert_eq!(removed, vec![3, 2, 1], "strictly decreasing, all of the tail");
        assert_eq!(settled.index, Some(1));

        // Round-trip: identical external conditions rebuild the same prefix.
        flag.send(true).unwrap();
        next_matching(&mut rx, is(EventKind::InstanceUp, 3)).await;
    }

    /// Forward initialization is strictly sequential: `Up` events arrive in
    /// chain order, so the `Up` set is always a contiguous prefix.
    #[tokio::test]
    async fn up_events_follow_chain_order() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();

        let spec = ChainSpec::new("t")
            .action(Expose::spec([("n", ArgExpr::lit("0"))]))
            .action(Expose::spec([("n", ArgExpr::lit("1"))]))
            .action(Expose::spec([("n", ArgExpr::lit("2"))]))
            .action(Expose::spec([("n", ArgExpr::lit("3"))]));
        spawn_chain(spec, &bus, &registry);

        let mut ups = Vec::new();
        while ups.len() < 4 {
            let ev = next_matching(&mut rx, |ev| ev.kind == EventKind::InstanceUp).await;
            ups.push(ev.index.unwrap());
        }
        assert_eq!(ups, vec![0, 1, 2, 3]);
    }

    struct SlowDying {
        release: Arc<Notify>,
        link: Option<ActionLink>,
    }

    #[async_trait]
    impl Action for SlowDying {
        async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
            link.report_up();
            self.link = Some(link);
            Ok(())
        }

        async fn stop(&mut self) {
            let link = self.link.clone().expect("started");
            let release = Arc::clone(&self.release);
            tokio::spawn(async move {
                release.notified().await;
                link.report_terminated();
            });
        }
    }

    fn slow_dying(release: &Arc<Notify>) -> ActionSpec {
        let release = Arc::clone(release);
        ActionSpec::new(ActionFn::arc("slow", move |_ctx, _args| {
            Ok(Box::new(SlowDying {
                release: Arc::clone(&release),
                link: None,
            }) as _)
        }))
    }

    /// While the tail is still dying, termination of the next instance up is
    /// deferred until the tail fully reports removal.
    #[tokio::test]
    async fn termination_waits_for_the_tail() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();
        let (flag, flag_rx) = watch::channel(true);
        let r1 = Arc::new(Notify::new());
        let r2 = Arc::new(Notify::new());

        let spec = ChainSpec::new("t")
            .action(Gate::spec(flag_rx))
            .action(slow_dying(&r1))
            .action(slow_dying(&r2));
        spawn_chain(spec, &bus, &registry);
        next_matching(&mut rx, is(EventKind::InstanceUp, 2)).await;

        flag.send(false).unwrap();
        let dying2 = next_matching(&mut rx, is(EventKind::InstanceDying, 2)).await;

        // Nothing may happen to #1 while #2 is dying.
        r2.notify_one();
        let removed2 = next_matching(&mut rx, is(EventKind::InstanceRemoved, 2)).await;
        let dying1 = next_matching(&mut rx, is(EventKind::InstanceDying, 1)).await;
        assert!(dying2.seq < removed2.seq);
        assert!(removed2.seq < dying1.seq, "#1 must wait for #2's removal");

        r1.notify_one();
        next_matching(&mut rx, is(EventKind::InstanceRemoved, 1)).await;
        next_matching(&mut rx, |ev| ev.kind == EventKind::CascadeSettled).await;
    }

    /// A failed creation keeps the prefix, is retried, and eventually lands.
    #[tokio::test(start_paused = true)]
    async fn creation_failure_is_retried() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();

        let failures = Arc::new(AtomicUsize::new(2));
        let flaky = {
            let failures = Arc::clone(&failures);
            ActionSpec::new(ActionFn::arc("flaky", move |_ctx, _args| {
                if failures.load(Ordering::SeqCst) > 0 {
                    failures.fetch_sub(1, Ordering::SeqCst);
                    return Err(ActionError::Failed {
                        error: "not ready".into(),
                    });
                }
                Ok(Box::new(SlowDying {
                    release: Arc::new(Notify::new()),
                    link: None,
                }) as _)
            }))
        };

        let spec = ChainSpec::new("t")
            .action(Expose::spec([("k", ArgExpr::lit("v"))]))
            .action(flaky);
        spawn_chain(spec, &bus, &registry);

        next_matching(&mut rx, is(EventKind::SpawnFailed, 1)).await;
        next_matching(&mut rx, |ev| ev.kind == EventKind::RetryScheduled).await;
        next_matching(&mut rx, is(EventKind::InstanceUp, 1)).await;
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }

    /// An unresolvable argument reference behaves like any creation failure.
    #[tokio::test(start_paused = true)]
    async fn unresolved_argument_fails_creation() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();

        let spec = ChainSpec::new("t")
            .action(Expose::spec([("k", ArgExpr::lit("v"))]))
            .action(Expose::spec([("copy", ArgExpr::var(0, "missing"))]));
        spawn_chain(spec, &bus, &registry);

        let failed = next_matching(&mut rx, is(EventKind::SpawnFailed, 1)).await;
        assert!(failed.reason.as_deref().unwrap().contains("#0.missing"));
    }

    struct DoubleUp;

    #[async_trait]
    impl Action for DoubleUp {
        async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
            link.report_up();
            link.report_up();
            Ok(())
        }

        async fn stop(&mut self) {}
    }

    /// Breaking the lifecycle contract faults the chain.
    #[tokio::test]
    async fn double_up_is_a_protocol_violation() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();

        let spec = ChainSpec::new("t").action(ActionSpec::new(ActionFn::arc(
            "double",
            |_ctx, _args| Ok(Box::new(DoubleUp) as _),
        )));
        spawn_chain(spec, &bus, &registry);

        let fault = next_matching(&mut rx, |ev| ev.kind == EventKind::ChainFaulted).await;
        assert_eq!(fault.index, Some(0));
        assert!(fault.reason.as_deref().unwrap().contains("already up"));
    }

    /// Cancellation drives a full drain, index 0 last.
    #[tokio::test]
    async fn cancellation_drains_the_chain() {
        let (bus, registry) = harness();
        let mut rx = bus.subscribe();
        let (_flag, flag_rx) = watch::channel(true);

        let spec = ChainSpec::new("t")
            .action(Gate::spec(flag_rx))
            .action(Expose::spec([("n", ArgExpr::lit("1"))]));
        let token = spawn_chain(spec, &bus, &registry);
        next_matching(&mut rx, is(EventKind::InstanceUp, 1)).await;

        token.cancel();
        let removed1 = next_matching(&mut rx, is(EventKind::InstanceRemoved, 1)).await;
        let removed0 = next_matching(&mut rx, is(EventKind::InstanceRemoved, 0)).await;
        assert!(removed1.seq < removed0.seq);
        next_matching(&mut rx, |ev| ev.kind == EventKind::ChainDrained).await;
    }
}
