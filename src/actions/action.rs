//! # Action trait and factory.
//!
//! [`Action`] is the capability contract every concrete behavior implements;
//! [`ActionFactory`] builds a fresh instance per creation, because the same
//! chain position can be created and destroyed many times as conditions
//! change and each incarnation receives freshly resolved arguments.
//!
//! Instances are owned exclusively by their chain executor and are never
//! shared; the executor calls the trait methods, and the instance answers
//! asynchronously through its [`ActionLink`].

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::ActionLink;
use crate::error::ActionError;
use crate::registry::DependencyRegistry;
use crate::values::{Value, ValueMap};

/// Owned action instance, held by the chain executor.
pub type BoxAction = Box<dyn Action>;

/// Shared handle to an action factory.
pub type FactoryRef = Arc<dyn ActionFactory>;

/// # A single executing unit with the `Down`/`Up`/`Dying` lifecycle.
///
/// The executor creates the instance (via its factory), calls
/// [`start`](Action::start), later possibly [`stop`](Action::stop), and
/// removes it once it reports termination. In between, the instance reports
/// condition changes through the [`ActionLink`] it received at `start`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use chainvisor::{Action, ActionError, ActionLink};
///
/// /// Up immediately, nothing to clean up.
/// struct Marker {
///     link: Option<ActionLink>,
/// }
///
/// #[async_trait]
/// impl Action for Marker {
///     async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
///         link.report_up();
///         self.link = Some(link);
///         Ok(())
///     }
///
///     async fn stop(&mut self) {
///         if let Some(link) = &self.link {
///             link.report_terminated();
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + 'static {
    /// Starts the instance.
    ///
    /// The instance keeps `link` for later reports. Config-type actions (ones
    /// that *do* something rather than *wait* for something) may call
    /// `link.report_up()` before returning. An `Err` means the instance never
    /// existed; the chain schedules a re-attempt.
    async fn start(&mut self, link: ActionLink) -> Result<(), ActionError>;

    /// Requests termination.
    ///
    /// The instance must eventually call `link.report_terminated()`; until
    /// then it is `Dying` and its chain waits. Requesting termination is
    /// idempotent from the core's side: the executor calls this at most once
    /// per instance.
    async fn stop(&mut self);

    /// Named values this instance exposes while `Up`.
    ///
    /// Read once by the executor when the instance reaches `Up`; later
    /// instances in the chain resolve their arguments against that snapshot.
    fn values(&self) -> Option<Arc<ValueMap>> {
        None
    }

    /// Called after the down-cascade triggered by this instance completed.
    ///
    /// At this point everything after the instance has been removed and the
    /// instance has settled into `Down`. Most actions ignore this; the
    /// registry-backed [`Depend`](crate::Depend) uses it to release its
    /// previous selection.
    async fn settled(&mut self) {}
}

/// Context available to factories while building an instance.
pub struct BuildCtx {
    /// Name of the owning chain.
    pub chain: Arc<str>,
    /// The engine's dependency registry.
    pub registry: Arc<DependencyRegistry>,
}

/// # Builds action instances for one chain position.
///
/// A factory is shared (it lives in the immutable
/// [`ActionSpec`](crate::ActionSpec) descriptor) and must be cheap to call:
/// creation happens on every forward pass over the position.
pub trait ActionFactory: Send + Sync + 'static {
    /// Short label for logs and events (e.g. `"provide"`, `"gate"`).
    fn label(&self) -> &str;

    /// Builds a fresh instance from resolved argument values.
    ///
    /// An `Err` is an immediate creation failure: the chain keeps its prefix
    /// and re-attempts per its retry policy.
    fn build(&self, ctx: &BuildCtx, args: Vec<Value>) -> Result<BoxAction, ActionError>;
}

/// Function-backed factory.
///
/// Wraps a closure that builds a fresh instance per creation — the analog of
/// defining a one-off action type, useful for embedder glue and tests.
///
/// ## Example
/// ```
/// use chainvisor::{ActionFn, ActionSpec};
/// # use chainvisor::{Action, ActionError, ActionLink};
/// # use async_trait::async_trait;
/// # struct Marker { link: Option<ActionLink> }
/// # #[async_trait]
/// # impl Action for Marker {
/// #     async fn start(&mut self, link: ActionLink) -> Result<(), ActionError> {
/// #         link.report_up();
/// #         self.link = Some(link);
/// #         Ok(())
/// #     }
/// #     async fn stop(&mut self) {
/// #         if let Some(link) = &self.link { link.report_terminated(); }
/// #     }
/// # }
///
/// let spec = ActionSpec::new(ActionFn::arc("marker", |_ctx, _args| {
///     Ok(Box::new(Marker { link: None }) as _)
/// }));
/// assert_eq!(spec.label(), "marker");
/// ```
pub struct ActionFn<F> {
    label: Cow<'static, str>,
    f: F,
}

impl<F> ActionFn<F>
where
    F: Fn(&BuildCtx, Vec<Value>) -> Result<BoxAction, ActionError> + Send + Sync + 'static,
{
    /// Creates a new function-backed factory.
    pub fn new(label: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc(label: impl Into<Cow<'static, str>>, f: F) -> FactoryRef {
        Arc::new(Self::new(label, f))
    }
}

impl<F> ActionFactory for ActionFn<F>
where
    F: Fn(&BuildCtx, Vec<Value>) -> Result<BoxAction, ActionError> + Send + Sync + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn build(&self, ctx: &BuildCtx, args: Vec<Value>) -> Result<BoxAction, ActionError> {
        (self.f)(ctx, args)
    }
}
