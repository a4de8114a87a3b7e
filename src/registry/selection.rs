//! # Selection state shared between a subscription and its instance.
//!
//! The registry owns selection decisions, but the subscribing instance must
//! answer `values()` synchronously when its executor samples it at the `Up`
//! transition. [`BindingCell`] is the small shared cell bridging the two: the
//! registry writes the [`Selection`] before signalling `Up` and clears it
//! when signalling `Down`, so by the time the executor samples the instance
//! the cell is always populated.

use std::sync::{Arc, Mutex};

use crate::values::ValueMap;

/// The publication a subscription is currently bound to.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Name the selected publication was registered under.
    pub name: Arc<str>,
    /// The selected publication's exposed values (snapshot).
    pub values: Arc<ValueMap>,
}

/// Shared cell holding the current selection, if any.
pub type BindingCell = Arc<Mutex<Option<Selection>>>;

/// Creates an empty binding cell.
pub fn new_binding_cell() -> BindingCell {
    Arc::new(Mutex::new(None))
}
