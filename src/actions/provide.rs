//! # Provide: publish a named readiness signal.
//!
//! [`Provide`] registers a publication in the dependency registry when it is
//! created and is `Up` immediately (publishers are config-type). Termination
//! is where the cross-chain teardown contract lives: the publication is
//! withdrawn on `stop()`, and the registry reports this instance terminated
//! only after every bound subscriber — and everything transitively depending
//! on it — has fully torn down.

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{Action, ActionFactory, ActionLink, ActionSpec, BoxAction, BuildCtx};
use crate::error::ActionError;
use crate::registry::{DependencyRegistry, PubId};
use crate::values::{ArgExpr, Value, ValueMap};

/// Config-type action publishing a named readiness signal.
///
/// The publication's values are this instance's exposed values: later
/// instances in the publisher's own chain and bound subscribers in other
/// chains read the same snapshot.
pub struct Provide {
    name: String,
    exclusive: bool,
    values: Arc<ValueMap>,
    chain: Arc<str>,
    registry: Arc<DependencyRegistry>,
    id: Option<PubId>,
    link: Option<ActionLink>,
}

impl Provide {
    /// Builds a descriptor for an exclusive publication (`provide`).
    ///
    /// At most one exclusive publication may be active per name; a contested
    /// registration fails the creation, subject to the chain's retry policy.
    pub fn spec<N>(name: ArgExpr, values: impl IntoIterator<Item = (N, ArgExpr)>) -> ActionSpec
    where
        N: Into<String>,
    {
        Self::spec_inner(name, values, true)
    }

    /// Builds a descriptor for a shared publication (`multiprovide`).
    ///
    /// Any number of shared publications may be active under one name;
    /// subscribers select the first-registered one.
    pub fn shared<N>(name: ArgExpr, values: impl IntoIterator<Item = (N, ArgExpr)>) -> ActionSpec
    where
        N: Into<String>,
    {
        Self::spec_inner(name, values, false)
    }

    fn spec_inner<N>(
        name: ArgExpr,
        values: impl IntoIterator<Item = (N, ArgExpr)>,
        exclusive: bool,
    ) -> ActionSpec
    where
        N: Into<String>,
    {
        let (keys, mut args): (Vec<String>, Vec<ArgExpr>) =
            values.into_iter().map(|(n, a)| (n.into(), a)).unzip();
        args.insert(0, name);
        ActionSpec::new(Arc::new(ProvideFactory { keys, exclusive })).with_args(args)
    }
}

#[async_trait]
impl Action for Provide {
    async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
        let id = self
            .registry
            .register_publication(
                &self.name,
                self.exclusive,
                Arc::clone(&self.values),
                Arc::clone(&self.chain),
                link.clone(),
            )
            .await?;
        self.id = Some(id);
        link.report_up();
        self.link = Some(link);
        Ok(())
    }

    async fn stop(&mut self) {
        match self.id.take() {
            // The registry reports termination once all subscribers released.
            Some(id) => self.registry.begin_withdraw(id).await,
            None => {
                if let Some(link) = &self.link {
                    link.report_terminated();
                }
            }
        }
    }

    fn values(&self) -> Option<Arc<ValueMap>> {
        Some(Arc::clone(&self.values))
    }
}

struct ProvideFactory {
    keys: Vec<String>,
    exclusive: bool,
}

impl ActionFactory for ProvideFactory {
    fn label(&self) -> &str {
        if self.exclusive {
            "provide"
        } else {
            "multiprovide"
        }
    }

    fn build(&self, ctx: &BuildCtx, mut args: Vec<Value>) -> Result<BoxAction, ActionError> {
        if args.len() != self.keys.len() + 1 {
            return Err(ActionError::Failed {
                error: format!(
                    "{}: {} names but {} arguments",
                    self.label(),
                    self.keys.len(),
                    args.len().saturating_sub(1)
                ),
            });
        }
        let name = args.remove(0);
        let name = name
            .as_str()
            .ok_or_else(|| ActionError::Failed {
                error: format!("{}: publication name must be a string", self.label()),
            })?
            .to_string();
        let values: ValueMap = self.keys.iter().cloned().zip(args).collect();
        Ok(Box::new(Provide {
            name,
            exclusive: self.exclusive,
            values: Arc::new(values),
            chain: Arc::clone(&ctx.chain),
            registry: Arc::clone(&ctx.registry),
            id: None,
            link: None,
        }))
    }
}
