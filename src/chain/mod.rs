//! Chain model: descriptors and the forward/backward executor.
//!
//! This module contains the per-process half of the runtime:
//! - [`ChainSpec`] — ordered list of action descriptors for one process
//! - `ChainExecutor` — drives one chain through forward initialization and
//!   backward (cascading) teardown; owns exactly the instances in its chain
//!
//! See `chain/executor.rs` for the protocol details and ordering invariants.

mod executor;
mod instance;
mod spec;

pub use spec::ChainSpec;

pub(crate) use executor::ChainExecutor;
