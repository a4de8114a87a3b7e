//! # chainvisor
//!
//! **Chainvisor** is a declarative bring-up/teardown engine for Rust.
//!
//! It keeps a set of long-lived *chains* — ordered sequences of stateful
//! actions — synchronized with external conditions. Forward execution
//! initializes actions one at a time as predecessors come up; any action
//! dropping out of the `Up` state triggers an automatic, strictly ordered,
//! tail-first teardown of everything initialized after it, including across
//! chains via a publish/subscribe dependency registry with priority
//! preference.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  ChainSpec   │   │  ChainSpec   │   │  ChainSpec   │
//!     │ (process #1) │   │ (process #2) │   │ (process #3) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Engine (runtime driver)                                          │
//! │  - Bus (broadcast events)                                         │
//! │  - DependencyRegistry (publications / subscriptions / selection)  │
//! │  - ChainTracker (live instances, for stuck-chain detection)       │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!  │ChainExecutor │  │ChainExecutor │  │ChainExecutor │  one task per chain,
//!  │ fwd/bwd loop │  │ fwd/bwd loop │  │ fwd/bwd loop │  private inbox each
//!  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!         │ owns            │                 │
//!         ▼                 ▼                 ▼
//!   [slot 0..n]        [slot 0..n]       [slot 0..n]      action instances
//! ```
//!
//! ### Lifecycle of one instance
//! ```text
//! (no slot) ──create──► Down ──report_up──► Up
//!                        ▲                   │ report_down
//!                        │    cascade of     ▼
//!                        └─── everything ── Down
//!                             after it
//!     stop() ──► Dying ──report_terminated──► removed (no slot)
//! ```
//!
//! The central ordering invariant: a backward cascade from index *i* removes
//! instances strictly tail-first, and only after it completes does the
//! instance at *i* settle — so no instance ever observes a predecessor value
//! that is stale relative to the predecessor's own re-initialization. The
//! same rule spans chains: a publisher cannot finish dying until everything
//! transitively depending on it has fully torn down.
//!
//! ## Features
//! | Area              | Description                                                          | Key types / traits                     |
//! |-------------------|----------------------------------------------------------------------|----------------------------------------|
//! | **Actions**       | Implement behaviors with the four-operation lifecycle contract.      | [`Action`], [`ActionFactory`], [`ActionLink`] |
//! | **Chains**        | Describe processes as ordered action descriptors.                    | [`ChainSpec`], [`ActionSpec`], [`ArgExpr`] |
//! | **Dependencies**  | Link chains with named publications and priority subscriptions.      | [`Provide`], [`Depend`]                |
//! | **Engine**        | Run chains, route events, drive graceful shutdown.                   | [`Engine`], [`Config`]                 |
//! | **Retry**         | Re-attempt failed instance creations with backoff and jitter.        | [`RetryPolicy`], [`JitterPolicy`]      |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom subscribers).     | [`Subscribe`]                          |
//! | **Errors**        | Typed errors for the runtime, actions, and protocol violations.      | [`EngineError`], [`ActionError`], [`ChainFault`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use chainvisor::{ArgExpr, ChainSpec, Config, Depend, Engine, Expose, Gate, Provide};
//! use tokio::sync::watch;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(Config::default()).build();
//!
//!     // "uplink" publishes `wan` once its device is present.
//!     let (device, device_rx) = watch::channel(false);
//!     let uplink = ChainSpec::new("uplink")
//!         .action(Gate::spec(device_rx))
//!         .action(Provide::spec(ArgExpr::lit("wan"), [("gw", ArgExpr::lit("10.0.0.1"))]));
//!
//!     // "lan" waits for `wan` and re-exposes the gateway it selected.
//!     let lan = ChainSpec::new("lan")
//!         .action(Depend::spec(ArgExpr::lit("wan")))
//!         .action(Expose::spec([("gw", ArgExpr::var(0, "gw"))]));
//!
//!     device.send(true)?;
//!
//!     let runner = {
//!         let engine = engine.clone();
//!         tokio::spawn(async move { engine.run(vec![uplink, lan]).await })
//!     };
//!
//!     // ... later: flipping `device` to false tears "lan" down behind the
//!     // subscription before the publisher may finish dying.
//!     engine.shutdown();
//!     runner.await??;
//!     Ok(())
//! }
//! ```

mod actions;
mod chain;
mod core;
mod error;
mod events;
mod policies;
mod registry;
mod subscribers;
mod values;

// ---- Public re-exports ----

pub use actions::{
    Action, ActionFactory, ActionFn, ActionLink, ActionSpec, BoxAction, BuildCtx, Depend, Expose,
    FactoryRef, Gate, Provide,
};
pub use chain::ChainSpec;
pub use core::{Config, Engine, EngineBuilder};
pub use error::{ActionError, ChainFault, EngineError};
pub use events::{Bus, Event, EventKind};
pub use policies::{JitterPolicy, RetryPolicy};
pub use registry::{new_binding_cell, BindingCell, DependencyRegistry, PubId, Selection, SubId};
pub use subscribers::{Subscribe, SubscriberSet};
pub use values::{ArgExpr, Value, ValueMap};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
