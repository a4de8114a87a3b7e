//! # Process-wide dependency table.
//!
//! [`DependencyRegistry`] maps publication names to active publishers and
//! brokers every cross-chain interaction:
//! - **publish** — immediate and synchronous at publisher creation
//! - **subscribe** — binds to the best available candidate, or waits
//! - **withdraw** — flips bound subscribers `Down` first and completes only
//!   after every one of them has fully torn down its dependents
//! - **preemption** — a strictly better candidate forces a rebuild; a
//!   selection never changes while the subscriber remains `Up`
//!
//! ## Architecture
//! ```text
//! chain "uplink"                    registry                    chain "lan"
//!   Provide("wan") ── register ──► name table ◄── subscribe ── Depend(["wan"])
//!         │                            │ bind: write cell, report_up
//!         │        stop()              ▼
//!         └────── withdraw ──► mark withdrawing
//!                                 report_down to bound subs ──► cascade in "lan"
//!                                      ▲                             │
//!                                      └──────── release ◄── settled │
//!                               all released:
//!                                 report_terminated ──► "uplink" removes Provide
//! ```
//!
//! ## Rules
//! - All operations serialize on one internal lock; notifications are sent
//!   while it is held, so subscribers observe publish/unpublish effects in
//!   the order they occurred.
//! - Among same-name publications, first-registered wins, stable while the
//!   set lives.
//! - Rebinding happens only from the released (fully torn down) state; a
//!   disappearance is always observed before any replacement selection.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::actions::ActionLink;
use crate::error::ActionError;
use crate::events::{Bus, Event, EventKind};
use crate::registry::selection::{BindingCell, Selection};
use crate::values::ValueMap;

/// Handle to a live publication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PubId(u64);

/// Handle to a live subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubId(u64);

struct Publication {
    name: String,
    exclusive: bool,
    values: Arc<ValueMap>,
    chain: Arc<str>,
    link: ActionLink,
    withdrawing: bool,
    /// Subscriptions bound to (or still draining from) this publication.
    bound: BTreeSet<u64>,
}

#[derive(Clone, Copy)]
enum SubState {
    /// No candidate available.
    Waiting,
    /// Bound to a publication; the subscriber is (or is becoming) `Up`.
    Bound(u64),
    /// Signalled `Down`, waiting for the subscriber's cascade to settle.
    Draining { from: Option<u64> },
}

struct Subscription {
    names: Vec<String>,
    chain: Arc<str>,
    link: ActionLink,
    binding: BindingCell,
    state: SubState,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    pubs: HashMap<u64, Publication>,
    /// Publication ids per name, in registration order (first-registered wins).
    by_name: HashMap<String, Vec<u64>>,
    /// BTreeMap so notification sweeps run in registration order.
    subs: BTreeMap<u64, Subscription>,
}

/// Process-wide publish/subscribe table with priority preference.
///
/// Created once per engine; shared by all chains. See the module docs for
/// the teardown-ordering contract.
pub struct DependencyRegistry {
    state: Mutex<RegistryState>,
    bus: Bus,
}

impl DependencyRegistry {
    /// Creates an empty registry publishing observability events to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            bus,
        }
    }

    /// Registers a publication; immediate and synchronous.
    ///
    /// Fails with [`ActionError::DuplicatePublication`] when `exclusive` and
    /// the name is taken, or when the name is held by an exclusive publisher
    /// (including one still withdrawing).
    pub async fn register_publication(
        &self,
        name: &str,
        exclusive: bool,
        values: Arc<ValueMap>,
        chain: Arc<str>,
        link: ActionLink,
    ) -> Result<PubId, ActionError> {
        let mut st = self.state.lock().await;

        if let Some(ids) = st.by_name.get(name) {
            let contested =
                (exclusive && !ids.is_empty()) || ids.iter().any(|id| st.pubs[id].exclusive);
            if contested {
                return Err(ActionError::DuplicatePublication {
                    name: name.to_string(),
                });
            }
        }

        let id = st.alloc_id();
        st.pubs.insert(
            id,
            Publication {
                name: name.to_string(),
                exclusive,
                values,
                chain: Arc::clone(&chain),
                link,
                withdrawing: false,
                bound: BTreeSet::new(),
            },
        );
        st.by_name.entry(name.to_string()).or_default().push(id);

        self.bus.publish(
            Event::new(EventKind::PublicationAdded)
                .with_chain(chain)
                .with_name(name),
        );

        self.resettle_subscriptions(&mut st);
        Ok(PubId(id))
    }

    /// Begins withdrawing a publication.
    ///
    /// Bound subscribers are signalled `Down` before this returns. The
    /// publisher's link receives `report_terminated` once every bound
    /// subscriber has released — immediately if none were bound. Idempotent.
    pub async fn begin_withdraw(&self, id: PubId) {
        let mut st = self.state.lock().await;
        let Some(p) = st.pubs.get_mut(&id.0) else {
            return;
        };
        if p.withdrawing {
            return;
        }
        p.withdrawing = true;

        let waiting_on: Vec<u64> = p.bound.iter().copied().collect();
        for sub_id in waiting_on {
            let Some(sub) = st.subs.get_mut(&sub_id) else {
                continue;
            };
            if let SubState::Bound(cur) = sub.state {
                if cur == id.0 {
                    Self::signal_drain(&self.bus, sub, Some(cur));
                }
            }
            // Draining subscriptions are already on their way; their release
            // still counts against this publication.
        }

        if st.pubs[&id.0].bound.is_empty() {
            self.finalize_withdraw(&mut st, id.0);
        }
    }

    /// Registers a subscription over a priority-ordered candidate list.
    ///
    /// If a candidate is available the subscription binds immediately: the
    /// binding cell is populated and `report_up` is queued before this
    /// returns. Otherwise the subscription waits.
    pub async fn register_subscription(
        &self,
        names: Vec<String>,
        chain: Arc<str>,
        link: ActionLink,
        binding: BindingCell,
    ) -> SubId {
        let mut st = self.state.lock().await;
        let id = st.alloc_id();
        st.subs.insert(
            id,
            Subscription {
                names,
                chain,
                link,
                binding,
                state: SubState::Waiting,
            },
        );
        if let Some(best) = Self::best_for(&st, id) {
            self.bind(&mut st, id, best);
        }
        SubId(id)
    }

    /// Reports that the subscriber's down-cascade has fully settled.
    ///
    /// Releases the previously selected publication (possibly completing its
    /// withdrawal) and then selects the best currently available candidate,
    /// if any.
    pub async fn release(&self, id: SubId) {
        let mut st = self.state.lock().await;
        let Some(sub) = st.subs.get_mut(&id.0) else {
            return;
        };
        let SubState::Draining { from } = sub.state else {
            return;
        };
        sub.state = SubState::Waiting;
        if let Some(pub_id) = from {
            self.detach(&mut st, pub_id, id.0);
        }
        if let Some(best) = Self::best_for(&st, id.0) {
            self.bind(&mut st, id.0, best);
        }
    }

    /// Removes a subscription (the subscriber instance is dying).
    ///
    /// Counts as a release towards any publication the subscription was
    /// bound to or draining from.
    pub async fn unregister_subscription(&self, id: SubId) {
        let mut st = self.state.lock().await;
        let Some(sub) = st.subs.remove(&id.0) else {
            return;
        };
        match sub.state {
            SubState::Bound(pub_id) | SubState::Draining { from: Some(pub_id) } => {
                self.detach(&mut st, pub_id, id.0);
            }
            _ => {}
        }
    }

    // ---------------------------
    // Selection internals
    // ---------------------------

    /// Best candidate for subscription `sub_id`: earliest name in its
    /// priority list with any active publication; first-registered within a
    /// name. Withdrawing publications are not candidates.
    fn best_for(st: &RegistryState, sub_id: u64) -> Option<u64> {
        let sub = st.subs.get(&sub_id)?;
        for name in &sub.names {
            if let Some(ids) = st.by_name.get(name) {
                if let Some(id) = ids.iter().find(|id| !st.pubs[id].withdrawing) {
                    return Some(*id);
                }
            }
        }
        None
    }

    /// Binds `sub_id` to `pub_id`: populate the cell, then signal `Up`.
    fn bind(&self, st: &mut RegistryState, sub_id: u64, pub_id: u64) {
        let (name, values) = {
            let p = st.pubs.get_mut(&pub_id).expect("bind: publication exists");
            p.bound.insert(sub_id);
            (Arc::<str>::from(p.name.as_str()), Arc::clone(&p.values))
        };
        let sub = st.subs.get_mut(&sub_id).expect("bind: subscription exists");
        sub.state = SubState::Bound(pub_id);
        *sub.binding.lock().unwrap_or_else(|e| e.into_inner()) = Some(Selection {
            name: Arc::clone(&name),
            values,
        });
        sub.link.report_up();
        self.bus.publish(
            Event::new(EventKind::SelectionChanged)
                .with_chain(Arc::clone(&sub.chain))
                .with_name(name),
        );
    }

    /// Signals a bound subscription `Down` and marks it draining.
    ///
    /// The publication keeps the subscription in its bound set until the
    /// release arrives, so withdrawal still waits on it.
    fn signal_drain(bus: &Bus, sub: &mut Subscription, from: Option<u64>) {
        sub.state = SubState::Draining { from };
        *sub.binding.lock().unwrap_or_else(|e| e.into_inner()) = None;
        sub.link.report_down();
        bus.publish(Event::new(EventKind::SelectionChanged).with_chain(Arc::clone(&sub.chain)));
    }

    /// Detaches a released/removed subscription from a publication,
    /// completing the publication's withdrawal if it was the last one.
    fn detach(&self, st: &mut RegistryState, pub_id: u64, sub_id: u64) {
        let finalize = match st.pubs.get_mut(&pub_id) {
            Some(p) => {
                p.bound.remove(&sub_id);
                p.withdrawing && p.bound.is_empty()
            }
            None => false,
        };
        if finalize {
            self.finalize_withdraw(st, pub_id);
        }
    }

    /// Removes a fully-released withdrawing publication and lets the
    /// publisher proceed past `Dying`.
    fn finalize_withdraw(&self, st: &mut RegistryState, pub_id: u64) {
        let Some(p) = st.pubs.remove(&pub_id) else {
            return;
        };
        if let Some(ids) = st.by_name.get_mut(&p.name) {
            ids.retain(|id| *id != pub_id);
            if ids.is_empty() {
                st.by_name.remove(&p.name);
            }
        }
        self.bus.publish(
            Event::new(EventKind::PublicationWithdrawn)
                .with_chain(p.chain)
                .with_name(p.name.as_str()),
        );
        p.link.report_terminated();
    }

    /// After a publication appeared: bind waiting subscriptions and force a
    /// rebuild on any subscription whose best candidate changed.
    fn resettle_subscriptions(&self, st: &mut RegistryState) {
        let ids: Vec<u64> = st.subs.keys().copied().collect();
        for sub_id in ids {
            let best = Self::best_for(st, sub_id);
            let sub = st.subs.get_mut(&sub_id).expect("resettle: sub exists");
            match sub.state {
                SubState::Waiting => {
                    if let Some(best) = best {
                        self.bind(st, sub_id, best);
                    }
                }
                SubState::Bound(cur) => {
                    // A better candidate is never ignored while a worse one
                    // stays selected; the swap goes through Down + release.
                    if best != Some(cur) {
                        Self::signal_drain(&self.bus, sub, Some(cur));
                    }
                }
                SubState::Draining { .. } => {}
            }
        }
    }
}

impl RegistryState {
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Report, ReportMsg};
    use crate::registry::new_binding_cell;
    use tokio::sync::mpsc;

    fn link(tx: &mpsc::UnboundedSender<ReportMsg>, index: usize) -> ActionLink {
        ActionLink::new("test".into(), index, index as u64, tx.clone())
    }

    fn values(pairs: &[(&str, &str)]) -> Arc<ValueMap> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), crate::values::Value::str(*v)))
                .collect(),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ReportMsg>) -> Vec<(usize, Report)> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push((msg.index, msg.report));
        }
        out
    }

    #[tokio::test]
    async fn subscription_waits_then_binds() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let cell = new_binding_cell();
        reg.register_subscription(vec!["net".into()], "a".into(), link(&tx, 0), cell.clone())
            .await;
        assert!(drain(&mut rx).is_empty(), "no candidate yet");

        reg.register_publication("net", true, values(&[("if", "eth0")]), "b".into(), link(&tx, 1))
            .await
            .unwrap();
        assert_eq!(drain(&mut rx), vec![(0, Report::Up)]);
        let sel = cell.lock().unwrap().clone().expect("bound");
        assert_eq!(&*sel.name, "net");
        assert_eq!(sel.values.get("if"), Some(&crate::values::Value::str("eth0")));
    }

    #[tokio::test]
    async fn exclusive_name_is_contested() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, _rx) = mpsc::unbounded_channel();

        reg.register_publication("net", true, values(&[]), "a".into(), link(&tx, 0))
            .await
            .unwrap();
        let err = reg
            .register_publication("net", true, values(&[]), "b".into(), link(&tx, 1))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "action_duplicate_publication");

        // A shared publication cannot squat on an exclusive name either.
        assert!(reg
            .register_publication("net", false, values(&[]), "c".into(), link(&tx, 2))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn first_registered_wins_among_shared() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();

        reg.register_publication("pool", false, values(&[("n", "1")]), "a".into(), link(&tx, 1))
            .await
            .unwrap();
        reg.register_publication("pool", false, values(&[("n", "2")]), "b".into(), link(&tx, 2))
            .await
            .unwrap();

        let cell = new_binding_cell();
        reg.register_subscription(vec!["pool".into()], "c".into(), link(&tx, 0), cell.clone())
            .await;
        assert_eq!(drain(&mut rx), vec![(0, Report::Up)]);
        let sel = cell.lock().unwrap().clone().unwrap();
        assert_eq!(sel.values.get("n"), Some(&crate::values::Value::str("1")));
    }

    #[tokio::test]
    async fn better_candidate_forces_rebuild() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();

        reg.register_publication("eth0", false, values(&[]), "a".into(), link(&tx, 1))
            .await
            .unwrap();

        let cell = new_binding_cell();
        let sub = reg
            .register_subscription(
                vec!["eth1".into(), "eth0".into()],
                "c".into(),
                link(&tx, 0),
                cell.clone(),
            )
            .await;
        assert_eq!(drain(&mut rx), vec![(0, Report::Up)], "binds to eth0");

        // Higher-priority candidate appears: Down first, never a silent swap.
        reg.register_publication("eth1", false, values(&[]), "b".into(), link(&tx, 2))
            .await
            .unwrap();
        assert_eq!(drain(&mut rx), vec![(0, Report::Down)]);
        assert!(cell.lock().unwrap().is_none(), "cell cleared while draining");

        // Only after the cascade settles does the new selection go Up.
        reg.release(sub).await;
        assert_eq!(drain(&mut rx), vec![(0, Report::Up)]);
        let sel = cell.lock().unwrap().clone().unwrap();
        assert_eq!(&*sel.name, "eth1");
    }

    #[tokio::test]
    async fn equal_candidate_does_not_preempt() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();

        reg.register_publication("pool", false, values(&[]), "a".into(), link(&tx, 1))
            .await
            .unwrap();
        reg.register_subscription(vec!["pool".into()], "c".into(), link(&tx, 0), new_binding_cell())
            .await;
        drain(&mut rx);

        // Same name, registered later: first-registered stays selected.
        reg.register_publication("pool", false, values(&[]), "b".into(), link(&tx, 2))
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn withdraw_waits_for_release() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pub_tx, mut pub_rx) = mpsc::unbounded_channel();

        let pub_id = reg
            .register_publication("net", true, values(&[]), "p".into(), link(&pub_tx, 9))
            .await
            .unwrap();
        let sub = reg
            .register_subscription(vec!["net".into()], "c".into(), link(&tx, 0), new_binding_cell())
            .await;
        drain(&mut rx);

        reg.begin_withdraw(pub_id).await;
        assert_eq!(drain(&mut rx), vec![(0, Report::Down)], "subscriber told first");
        assert!(drain(&mut pub_rx).is_empty(), "publisher must wait");

        // Idempotent while draining.
        reg.begin_withdraw(pub_id).await;
        assert!(drain(&mut rx).is_empty());

        reg.release(sub).await;
        assert_eq!(drain(&mut pub_rx), vec![(9, Report::Terminated)]);
        assert!(drain(&mut rx).is_empty(), "nothing left to select");
    }

    #[tokio::test]
    async fn withdraw_without_subscribers_completes_immediately() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (pub_tx, mut pub_rx) = mpsc::unbounded_channel();

        let pub_id = reg
            .register_publication("net", true, values(&[]), "p".into(), link(&pub_tx, 0))
            .await
            .unwrap();
        reg.begin_withdraw(pub_id).await;
        assert_eq!(drain(&mut pub_rx), vec![(0, Report::Terminated)]);
    }

    #[tokio::test]
    async fn unregister_counts_as_release() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pub_tx, mut pub_rx) = mpsc::unbounded_channel();

        let pub_id = reg
            .register_publication("net", true, values(&[]), "p".into(), link(&pub_tx, 9))
            .await
            .unwrap();
        let sub = reg
            .register_subscription(vec!["net".into()], "c".into(), link(&tx, 0), new_binding_cell())
            .await;
        drain(&mut rx);

        reg.begin_withdraw(pub_id).await;
        drain(&mut rx);

        // The subscriber instance itself dies instead of settling.
        reg.unregister_subscription(sub).await;
        assert_eq!(drain(&mut pub_rx), vec![(9, Report::Terminated)]);
    }

    #[tokio::test]
    async fn name_is_reusable_after_withdraw_completes() {
        let reg = DependencyRegistry::new(Bus::new(64));
        let (pub_tx, _pub_rx) = mpsc::unbounded_channel();

        let pub_id = reg
            .register_publication("net", true, values(&[]), "p".into(), link(&pub_tx, 0))
            .await
            .unwrap();
        reg.begin_withdraw(pub_id).await;

        assert!(reg
            .register_publication("net", true, values(&[]), "q".into(), link(&pub_tx, 1))
            .await
            .is_ok());
    }
}
