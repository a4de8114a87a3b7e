//! # Report handle connecting an instance to its chain executor.
//!
//! [`ActionLink`] is the only channel through which an action instance (or
//! the dependency registry acting on its behalf) talks back to the core. It
//! is cheap to clone and safe to use from spawned tasks; a link that outlives
//! its instance becomes inert because the executor drops stale-epoch reports.
//!
//! ## Rules
//! - `report_up` is valid while the instance is `Down`.
//! - `report_down` is valid while the instance is `Up`.
//! - `report_terminated` is valid only after the core called `stop()`.
//! - Reports sent while the instance is `Dying` (other than termination) are
//!   ignored; reports that break the contract fault the chain.

use std::sync::Arc;

use tokio::sync::mpsc;

/// What an instance reports to its executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Report {
    /// Wait condition satisfied.
    Up,
    /// Condition lost while `Up`.
    Down,
    /// Cleanup after `stop()` finished; the instance may be removed.
    Terminated,
}

/// One message on a chain's private inbox.
#[derive(Clone, Debug)]
pub(crate) struct ReportMsg {
    /// Index of the reporting instance.
    pub index: usize,
    /// Epoch the link was issued for; stale epochs are dropped.
    pub epoch: u64,
    /// The report itself.
    pub report: Report,
}

/// Report handle given to an instance at `start`.
///
/// Links are bound to one (instance, epoch) pair. Cloning is cheap; sending
/// never blocks and never fails visibly (a send to a finished chain is
/// silently dropped).
#[derive(Clone, Debug)]
pub struct ActionLink {
    chain: Arc<str>,
    index: usize,
    epoch: u64,
    tx: mpsc::UnboundedSender<ReportMsg>,
}

impl ActionLink {
    pub(crate) fn new(
        chain: Arc<str>,
        index: usize,
        epoch: u64,
        tx: mpsc::UnboundedSender<ReportMsg>,
    ) -> Self {
        Self {
            chain,
            index,
            epoch,
            tx,
        }
    }

    /// Name of the owning chain (for logs).
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Position of the instance within its chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reports that the instance's wait condition is satisfied.
    pub fn report_up(&self) {
        self.send(Report::Up);
    }

    /// Reports loss of the instance's condition while `Up`.
    pub fn report_down(&self) {
        self.send(Report::Down);
    }

    /// Reports that cleanup after `stop()` is complete.
    pub fn report_terminated(&self) {
        self.send(Report::Terminated);
    }

    fn send(&self, report: Report) {
        let _ = self.tx.send(ReportMsg {
            index: self.index,
            epoch: self.epoch,
            report,
        });
    }
}
