//! # Engine: owns the chain executors and the dependency registry.
//!
//! The [`Engine`] is the top-level driver. It spawns one executor task per
//! configured chain, shares the single [`DependencyRegistry`] between them,
//! fans runtime events out to subscribers, and drives whole-system shutdown.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<ChainSpec> ──► Engine::run(chains)
//!
//! Spawn executors:
//!   ChainSpec[0]  ChainSpec[1]  ...  ChainSpec[N-1]
//!       │             │                    │
//!       └──► ChainExecutor::new(spec, ..., registry)      (one per chain)
//!                    └──► child CancellationToken = runtime_token.child_token()
//!                         set.spawn(executor.run(child_token))
//!
//! Event flow:
//!   Executors/Registry ── publish(Event) ──► Bus ──► Engine listener
//!                                              ├──► ChainTracker::update()
//!                                              └──► SubscriberSet::emit()
//!
//! Shutdown path (OS signal or Engine::shutdown()):
//!   Bus.publish(ShutdownRequested)
//!   runtime_token.cancel() → every chain begins its full backward cascade
//!   wait_all_with_grace(cfg.grace):
//!     ├─ all drained  → Bus.publish(AllDrainedWithin)
//!     └─ grace passed → Bus.publish(GraceExceeded)
//!                       Err(EngineError::GraceExceeded { stuck })
//! ```
//!
//! ## Example
//! ```no_run
//! use chainvisor::{ArgExpr, ChainSpec, Config, Depend, Engine, Expose, Provide};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(Config::default()).build();
//!
//!     let uplink = ChainSpec::new("uplink")
//!         .action(Provide::spec(ArgExpr::lit("wan"), [("gw", ArgExpr::lit("10.0.0.1"))]));
//!     let lan = ChainSpec::new("lan")
//!         .action(Depend::spec(ArgExpr::lit("wan")))
//!         .action(Expose::spec([("gw", ArgExpr::var(0, "gw"))]));
//!
//!     engine.run(vec![uplink, lan]).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainExecutor, ChainSpec};
use crate::core::{shutdown, tracker::ChainTracker, Config, EngineBuilder};
use crate::error::EngineError;
use crate::events::{Bus, Event, EventKind};
use crate::registry::DependencyRegistry;
use crate::subscribers::SubscriberSet;

/// Coordinates chain executors, the dependency registry, and shutdown.
pub struct Engine {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<DependencyRegistry>,
    tracker: Arc<ChainTracker>,
    runtime_token: CancellationToken,
}

impl Engine {
    /// Starts building an engine with the given configuration.
    pub fn builder(cfg: Config) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<DependencyRegistry>,
        tracker: Arc<ChainTracker>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            tracker,
            runtime_token,
        }
    }

    /// The engine's event bus; subscribe for runtime events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Requests whole-system shutdown.
    ///
    /// Every chain begins its full backward cascade (index 0 last);
    /// [`Engine::run`] returns once all chains drained or the grace period
    /// passed. Idempotent.
    pub fn shutdown(&self) {
        self.runtime_token.cancel();
    }

    /// Runs the configured chains until shutdown.
    ///
    /// Returns when:
    /// - shutdown was requested (OS signal or [`Engine::shutdown`]) and all
    ///   chains drained (or the grace period passed), or
    /// - every executor exited on its own (all chains faulted).
    ///
    /// Call at most once per engine.
    pub async fn run(&self, chains: Vec<ChainSpec>) -> Result<(), EngineError> {
        self.subscriber_listener();

        let mut set = JoinSet::new();
        self.spawn_chain_executors(&mut set, chains);
        self.drive_shutdown(&mut set).await
    }

    /// Subscribes to the bus, updates the tracker, and fans events out.
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                tracker.update(&ev).await;
                subs.emit(&ev);
            }
        });
    }

    /// Spawns one executor per chain into the join set.
    fn spawn_chain_executors(&self, set: &mut JoinSet<()>, chains: Vec<ChainSpec>) {
        for spec in chains {
            let retry = spec.retry().unwrap_or(self.cfg.retry);
            let (tx, rx) = mpsc::unbounded_channel();
            let executor = ChainExecutor::new(
                spec,
                retry,
                self.bus.clone(),
                Arc::clone(&self.registry),
                tx,
                rx,
            );
            let child = self.runtime_token.child_token();
            set.spawn(async move {
                // Faults are reported on the bus; other chains keep running.
                let _ = executor.run(child).await;
            });
        }
    }

    /// Waits until shutdown is requested or all executors finish by themselves.
    async fn drive_shutdown(&self, set: &mut JoinSet<()>) -> Result<(), EngineError> {
        tokio::select! {
            _ = shutdown::wait_for_shutdown_signal() => {}
            _ = self.runtime_token.cancelled() => {}
            _ = async { while set.join_next().await.is_some() {} } => {
                return Ok(());
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        self.wait_all_with_grace(set).await
    }

    /// Waits for all chains to drain within the configured grace period.
    ///
    /// Publishes [`EventKind::AllDrainedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`EngineError::GraceExceeded`] with the list of stuck chains.
    async fn wait_all_with_grace(&self, set: &mut JoinSet<()>) -> Result<(), EngineError> {
        let grace = self.cfg.grace;
        let drained = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, drained).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllDrainedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.tracker.snapshot().await;
                Err(EngineError::GraceExceeded { grace, stuck })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionFn, ActionLink, ActionSpec, Depend, Expose, Gate, Provide};
    use crate::error::ActionError;
    use crate::values::ArgExpr;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::{broadcast, watch};

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

    fn on(chain: &'static str, kind: EventKind, index: usize) -> impl Fn(&Event) -> bool {
        move |ev| ev.kind == kind && ev.chain.as_deref() == Some(chain) && ev.index == Some(index)
    }

    fn start(engine: &Arc<Engine>, chains: Vec<ChainSpec>) -> tokio::task::JoinHandle<Result<(), EngineError>> {
        let engine = Arc::clone(engine);
        tokio::spawn(async move { engine.run(chains).await })
    }

    /// A publisher dying must tear down its subscribers' dependents first:
    /// the subscriber's chain empties behind the subscription before the
    /// publication withdrawal completes, and only then does the publisher's
    /// own instance get removed.
    #[tokio::test]
    async fn publisher_death_tears_down_subscribers_first() {
        let engine = Engine::builder(Config::default()).build();
        let mut rx = engine.bus().subscribe();
        let (flag, flag_rx) = watch::channel(false);

        let provider = ChainSpec::new("p")
            .action(Gate::spec(flag_rx))
            .action(Provide::spec(ArgExpr::lit("X"), [("who", ArgExpr::lit("p"))]));
        let consumer = ChainSpec::new("d")
            .action(Depend::spec(ArgExpr::lit("X")))
            .action(Expose::spec([("copy", ArgExpr::var(0, "who"))]));

        let handle = start(&engine, vec![provider, consumer]);

        // Subscription waits while nothing is published.
        next_matching(&mut rx, on("d", EventKind::InstanceCreated, 0)).await;

        flag.send(true).unwrap();
        next_matching(&mut rx, |ev| {
            ev.kind == EventKind::PublicationAdded && ev.name.as_deref() == Some("X")
        })
        .await;
        next_matching(&mut rx, on("d", EventKind::InstanceUp, 0)).await;
        next_matching(&mut rx, on("d", EventKind::InstanceUp, 1)).await;

        // Publisher's chain collapses; the provide begins dying.
        flag.send(false).unwrap();
        let removed_dependent = next_matching(&mut rx, on("d", EventKind::InstanceRemoved, 1)).await;
        let withdrawn = next_matching(&mut rx, |ev| {
            ev.kind == EventKind::PublicationWithdrawn && ev.name.as_deref() == Some("X")
        })
        .await;
        let removed_provider = next_matching(&mut rx, on("p", EventKind::InstanceRemoved, 1)).await;

        assert!(removed_dependent.seq < withdrawn.seq, "subscribers drain first");
        assert!(withdrawn.seq < removed_provider.seq, "publisher dies last");

        engine.shutdown();
        assert!(handle.await.unwrap().is_ok());
    }

    /// A higher-priority publication appearing forces the subscriber through
    /// Down and a full dependent teardown before the new selection goes Up —
    /// never a silent swap.
    #[tokio::test]
    async fn better_publication_forces_rebuild() {
        let engine = Engine::builder(Config::default()).build();
        let mut rx = engine.bus().subscribe();
        let (flag_a, rx_a) = watch::channel(false);
        let (flag_b, rx_b) = watch::channel(false);

        let eth0 = ChainSpec::new("a")
            .action(Gate::spec(rx_a))
            .action(Provide::shared(ArgExpr::lit("eth0"), [("src", ArgExpr::lit("a"))]));
        let eth1 = ChainSpec::new("b")
            .action(Gate::spec(rx_b))
            .action(Provide::shared(ArgExpr::lit("eth1"), [("src", ArgExpr::lit("b"))]));
        let user = ChainSpec::new("c")
            .action(Depend::priority([ArgExpr::lit("eth1"), ArgExpr::lit("eth0")]))
            .action(Expose::spec([("mark", ArgExpr::var(0, "src"))]));

        let handle = start(&engine, vec![eth0, eth1, user]);

        flag_a.send(true).unwrap();
        let bound_eth0 = next_matching(&mut rx, |ev| {
            ev.kind == EventKind::SelectionChanged
                && ev.chain.as_deref() == Some("c")
                && ev.name.as_deref() == Some("eth0")
        })
        .await;
        next_matching(&mut rx, on("c", EventKind::InstanceUp, 1)).await;

        // The better candidate appears.
        flag_b.send(true).unwrap();
        let went_down = next_matching(&mut rx, on("c", EventKind::InstanceDown, 0)).await;
        let dependent_gone = next_matching(&mut rx, on("c", EventKind::InstanceRemoved, 1)).await;
        let bound_eth1 = next_matching(&mut rx, |ev| {
            ev.kind == EventKind::SelectionChanged
                && ev.chain.as_deref() == Some("c")
                && ev.name.as_deref() == Some("eth1")
        })
        .await;
        next_matching(&mut rx, on("c", EventKind::InstanceUp, 1)).await;

        assert!(bound_eth0.seq < went_down.seq);
        assert!(went_down.seq < dependent_gone.seq, "dependents torn down after Down");
        assert!(dependent_gone.seq < bound_eth1.seq, "reselect only after teardown");

        engine.shutdown();
        assert!(handle.await.unwrap().is_ok());
    }

    /// Shutdown drains every chain and reports within the grace period.
    #[tokio::test]
    async fn shutdown_drains_all_chains() {
        let engine = Engine::builder(Config::default()).build();
        let mut rx = engine.bus().subscribe();
        let (_flag, flag_rx) = watch::channel(true);

        let chains = vec![
            ChainSpec::new("one").action(Gate::spec(flag_rx)),
            ChainSpec::new("two").action(Expose::spec([("k", ArgExpr::lit("v"))])),
        ];
        let handle = start(&engine, chains);
        next_matching(&mut rx, on("one", EventKind::InstanceUp, 0)).await;
        next_matching(&mut rx, on("two", EventKind::InstanceUp, 0)).await;

        engine.shutdown();
        let mut drained = Vec::new();
        loop {
            let ev = next_matching(&mut rx, |ev| {
                matches!(ev.kind, EventKind::ChainDrained | EventKind::AllDrainedWithin)
            })
            .await;
            if ev.kind == EventKind::AllDrainedWithin {
                break;
            }
            drained.push(ev.chain.as_deref().unwrap().to_string());
        }
        drained.sort_unstable();
        assert_eq!(drained, vec!["one", "two"]);
        assert!(handle.await.unwrap().is_ok());
    }

    struct Stuck {
        link: Option<ActionLink>,
    }

    #[async_trait]
    impl Action for Stuck {
        async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
            link.report_up();
            self.link = Some(link);
            Ok(())
        }

        // Never reports termination.
        async fn stop(&mut self) {}
    }

    /// An instance that never finishes dying stalls its chain; the engine
    /// names it when the grace period passes.
    #[tokio::test]
    async fn stuck_chain_is_reported_after_grace() {
        let engine = Engine::builder(Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        })
        .build();
        let mut rx = engine.bus().subscribe();

        let stuck = ChainSpec::new("s").action(ActionSpec::new(ActionFn::arc(
            "stuck",
            |_ctx, _args| Ok(Box::new(Stuck { link: None }) as _),
        )));
        let handle = start(&engine, vec![stuck]);
        next_matching(&mut rx, on("s", EventKind::InstanceUp, 0)).await;

        engine.shutdown();
        next_matching(&mut rx, |ev| ev.kind == EventKind::GraceExceeded).await;
        match handle.await.unwrap() {
            Err(EngineError::GraceExceeded { stuck, .. }) => {
                assert_eq!(stuck, vec!["s".to_string()]);
            }
            other => panic!("expected GraceExceeded, got {other:?}"),
        }
    }
}
