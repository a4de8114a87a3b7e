//! # Depend: track the best available publication.
//!
//! [`Depend`] binds to a publication by name (`depend`) or to the best
//! available candidate from a priority-ordered name list (`multidepend`).
//! The instance is `Up` while a candidate is selected and re-exposes the
//! selected publication's values to its own chain.
//!
//! Selection changes are never silent swaps: when a strictly better
//! candidate appears, or the selected publication withdraws, the registry
//! flips this instance `Down`, its chain cascades, and only after the
//! cascade fully settles does the registry select again and flip the
//! instance back `Up`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{Action, ActionFactory, ActionLink, ActionSpec, BoxAction, BuildCtx};
use crate::error::ActionError;
use crate::registry::{new_binding_cell, BindingCell, DependencyRegistry, SubId};
use crate::values::{ArgExpr, Value, ValueMap};

/// Wait-type action tracking the best available publication.
pub struct Depend {
    names: Vec<String>,
    chain: Arc<str>,
    registry: Arc<DependencyRegistry>,
    binding: BindingCell,
    id: Option<SubId>,
    link: Option<ActionLink>,
}

impl Depend {
    /// Builds a descriptor binding to a single publication name (`depend`).
    pub fn spec(name: ArgExpr) -> ActionSpec {
        ActionSpec::new(Arc::new(DependFactory { single: true })).with_args(vec![name])
    }

    /// Builds a descriptor with a priority-ordered candidate list
    /// (`multidepend`); earlier names are preferred.
    pub fn priority(names: impl IntoIterator<Item = ArgExpr>) -> ActionSpec {
        ActionSpec::new(Arc::new(DependFactory { single: false }))
            .with_args(names.into_iter().collect())
    }
}

#[async_trait]
impl Action for Depend {
    async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
        let id = self
            .registry
            .register_subscription(
                self.names.clone(),
                Arc::clone(&self.chain),
                link.clone(),
                Arc::clone(&self.binding),
            )
            .await;
        self.id = Some(id);
        self.link = Some(link);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(id) = self.id.take() {
            self.registry.unregister_subscription(id).await;
        }
        if let Some(link) = &self.link {
            link.report_terminated();
        }
    }

    fn values(&self) -> Option<Arc<ValueMap>> {
        let guard = self.binding.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|sel| Arc::clone(&sel.values))
    }

    async fn settled(&mut self) {
        if let Some(id) = self.id {
            self.registry.release(id).await;
        }
    }
}

struct DependFactory {
    single: bool,
}

impl ActionFactory for DependFactory {
    fn label(&self) -> &str {
        if self.single {
            "depend"
        } else {
            "multidepend"
        }
    }

    fn build(&self, ctx: &BuildCtx, args: Vec<Value>) -> Result<BoxAction, ActionError> {
        if args.is_empty() {
            return Err(ActionError::Failed {
                error: format!("{}: at least one name required", self.label()),
            });
        }
        let mut names = Vec::with_capacity(args.len());
        for arg in &args {
            let name = arg.as_str().ok_or_else(|| ActionError::Failed {
                error: format!("{}: candidate names must be strings", self.label()),
            })?;
            names.push(name.to_string());
        }
        Ok(Box::new(Depend {
            names,
            chain: Arc::clone(&ctx.chain),
            registry: Arc::clone(&ctx.registry),
            binding: new_binding_cell(),
            id: None,
            link: None,
        }))
    }
}
