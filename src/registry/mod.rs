//! Dependency registry: publish/subscribe with priority preference.
//!
//! This module provides the process-wide table linking chains together:
//! - [`DependencyRegistry`] — registration, selection, and teardown brokering
//! - [`PubId`] / [`SubId`] — handles to live registrations
//! - [`Selection`] / [`BindingCell`] — what a bound subscription currently sees
//!
//! The registry is the only structure shared between chains. All
//! notifications it emits travel through the owning chain's private inbox
//! (via [`ActionLink`](crate::ActionLink)), so each chain still observes a
//! serialized stream of lifecycle events, in the order the underlying
//! publish/unpublish operations occurred.

mod registry;
mod selection;

pub use registry::{DependencyRegistry, PubId, SubId};
pub use selection::{new_binding_cell, BindingCell, Selection};
