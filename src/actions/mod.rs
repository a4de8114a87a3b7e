//! # Action abstractions and built-in actions.
//!
//! This module provides the action-related types:
//! - [`Action`] - trait every concrete behavior implements (the lifecycle contract)
//! - [`ActionFactory`] / [`FactoryRef`] - builds a fresh instance per creation
//! - [`ActionLink`] - report handle instances use to signal `Up`/`Down`/terminated
//! - [`ActionSpec`] - descriptor bundling a factory with argument expressions
//! - Built-ins: [`Expose`], [`Gate`], [`Provide`], [`Depend`]
//!
//! ## Lifecycle contract
//! ```text
//! factory.build(args) ──► instance (slot state: Down)
//!        │
//!        ├─► start(link)      core-driven; config actions may link.report_up()
//!        │                    synchronously inside start
//!        ├─► link.report_up() / link.report_down()
//!        │                    instance-driven, any time while alive
//!        ├─► stop()           core-driven; instance must eventually
//!        │                    link.report_terminated()
//!        └─► settled()        core-driven; the down-cascade triggered by this
//!                             instance has fully completed
//! ```
//!
//! Reports travel over the owning chain's private inbox and carry the
//! instance's epoch; reports from an instance that has since been removed are
//! dropped by the executor. The core never special-cases a built-in: the
//! registry actions below use the same four operations as any embedder action.

mod action;
mod depend;
mod expose;
mod gate;
mod link;
mod provide;
mod spec;

pub use action::{Action, ActionFactory, ActionFn, BoxAction, BuildCtx, FactoryRef};
pub use depend::Depend;
pub use expose::Expose;
pub use gate::Gate;
pub use link::ActionLink;
pub use provide::Provide;
pub use spec::ActionSpec;

pub(crate) use link::{Report, ReportMsg};
