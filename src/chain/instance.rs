//! # Instance slots.
//!
//! A [`Slot`] is one live action instance plus the executor-side bookkeeping
//! for it: lifecycle state, the epoch its report link was issued for, and the
//! values snapshot taken at the `Up` transition. Slots exist only for the
//! chain's built prefix; positions beyond the cursor have no slot at all
//! (that is the `Uninitialized` state of the lifecycle).

use std::sync::Arc;

use crate::actions::BoxAction;
use crate::values::ValueMap;

/// Lifecycle state of an existing instance.
///
/// `Uninitialized` has no representation here: an uninitialized position
/// simply has no slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InstanceState {
    /// Created, waiting for its condition.
    Down,
    /// Condition satisfied; exposed values are valid.
    Up,
    /// Termination requested; waiting for the instance's final report.
    Dying,
}

/// One live instance owned by the chain executor.
pub(crate) struct Slot {
    pub action: BoxAction,
    pub state: InstanceState,
    /// Epoch of the report link issued to this incarnation; reports carrying
    /// any other epoch are stale and dropped.
    pub epoch: u64,
    /// Action label, for events.
    pub label: Arc<str>,
    /// Values snapshot taken when the instance reached `Up`; cleared on the
    /// way down so later positions can never read stale data.
    pub values: Option<Arc<ValueMap>>,
}
