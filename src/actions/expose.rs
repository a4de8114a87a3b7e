//! # Expose: config-type action publishing named values to its chain.
//!
//! [`Expose`] is `Up` immediately on start and exposes its resolved arguments
//! under declared names. Later instances in the chain read them via
//! [`ArgExpr::var`](crate::ArgExpr::var). It is the smallest possible
//! config-type action and doubles as the canonical example of the synchronous
//! `report_up`-inside-`start` path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{Action, ActionFactory, ActionLink, ActionSpec, BoxAction, BuildCtx};
use crate::error::ActionError;
use crate::values::{ArgExpr, Value, ValueMap};

/// Config-type action exposing named values while `Up`.
pub struct Expose {
    values: Arc<ValueMap>,
    link: Option<ActionLink>,
}

impl Expose {
    /// Builds a descriptor exposing the given `(name, expression)` pairs.
    ///
    /// ## Example
    /// ```
    /// use chainvisor::{ArgExpr, ChainSpec, Expose};
    ///
    /// let chain = ChainSpec::new("lan")
    ///     .action(Expose::spec([("ifname", ArgExpr::lit("eth0"))]));
    /// assert_eq!(chain.len(), 1);
    /// ```
    pub fn spec<N>(pairs: impl IntoIterator<Item = (N, ArgExpr)>) -> ActionSpec
    where
        N: Into<String>,
    {
        let (keys, args): (Vec<String>, Vec<ArgExpr>) =
            pairs.into_iter().map(|(n, a)| (n.into(), a)).unzip();
        ActionSpec::new(Arc::new(ExposeFactory { keys })).with_args(args)
    }
}

#[async_trait]
impl Action for Expose {
    async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
        link.report_up();
        self.link = Some(link);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(link) = &self.link {
            link.report_terminated();
        }
    }

    fn values(&self) -> Option<Arc<ValueMap>> {
        Some(Arc::clone(&self.values))
    }
}

struct ExposeFactory {
    keys: Vec<String>,
}

impl ActionFactory for ExposeFactory {
    fn label(&self) -> &str {
        "expose"
    }

    fn build(&self, _ctx: &BuildCtx, args: Vec<Value>) -> Result<BoxAction, ActionError> {
        if args.len() != self.keys.len() {
            return Err(ActionError::Failed {
                error: format!(
                    "expose: {} names but {} arguments",
                    self.keys.len(),
                    args.len()
                ),
            });
        }
        let values: ValueMap = self.keys.iter().cloned().zip(args).collect();
        Ok(Box::new(Expose {
            values: Arc::new(values),
            link: None,
        }))
    }
}
