//! # Gate: wait-type action mirroring an external boolean condition.
//!
//! [`Gate`] tracks a `tokio::sync::watch` flag: `Up` while the flag is true,
//! `Down` while it is false. It is the canonical wait-type action — the
//! external condition (a device appearing, a link coming up) is modeled by
//! whoever owns the `watch::Sender`.
//!
//! ## Rules
//! - The gate reports only on actual flips; redundant writes to the watch
//!   channel never produce duplicate reports.
//! - Termination is immediate: the watcher task is aborted and the gate
//!   reports terminated from `stop()`.

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::actions::{Action, ActionFactory, ActionLink, ActionSpec, BoxAction, BuildCtx};
use crate::error::ActionError;
use crate::values::Value;

/// Wait-type action that is `Up` exactly while a watch flag is true.
pub struct Gate {
    rx: watch::Receiver<bool>,
    watcher: Option<JoinHandle<()>>,
    link: Option<ActionLink>,
}

impl Gate {
    /// Builds a descriptor watching the given flag.
    ///
    /// ## Example
    /// ```
    /// use chainvisor::{ChainSpec, Gate};
    /// use tokio::sync::watch;
    ///
    /// let (_flag, rx) = watch::channel(false);
    /// let chain = ChainSpec::new("wan").action(Gate::spec(rx));
    /// assert_eq!(chain.len(), 1);
    /// ```
    pub fn spec(rx: watch::Receiver<bool>) -> ActionSpec {
        ActionSpec::new(std::sync::Arc::new(GateFactory { rx }))
    }
}

#[async_trait]
impl Action for Gate {
    async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
        let mut rx = self.rx.clone();
        let watcher_link = link.clone();
        self.link = Some(link);

        self.watcher = Some(tokio::spawn(async move {
            let mut up = *rx.borrow_and_update();
            if up {
                watcher_link.report_up();
            }
            loop {
                if rx.changed().await.is_err() {
                    return;
                }
                let now = *rx.borrow_and_update();
                if now == up {
                    continue;
                }
                up = now;
                if up {
                    watcher_link.report_up();
                } else {
                    watcher_link.report_down();
                }
            }
        }));
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(link) = &self.link {
            link.report_terminated();
        }
    }
}

struct GateFactory {
    rx: watch::Receiver<bool>,
}

impl ActionFactory for GateFactory {
    fn label(&self) -> &str {
        "gate"
    }

    fn build(&self, _ctx: &BuildCtx, _args: Vec<Value>) -> Result<BoxAction, ActionError> {
        Ok(Box::new(Gate {
            rx: self.rx.clone(),
            watcher: None,
            link: None,
        }))
    }
}
