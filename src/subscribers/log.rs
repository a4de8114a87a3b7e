//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and the demos.
//!
//! ## Output format
//! ```text
//! [chain-started] chain=lan
//! [created] chain=lan #1 action=depend
//! [up] chain=lan #1 action=depend
//! [down] chain=lan #1 action=depend
//! [cascade] chain=lan keep=2
//! [publication] chain=uplink name=wan
//! [selection] chain=lan name=wan
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Exported via the `logging` feature. Not intended for production use —
/// implement a custom [`Subscribe`] for structured logging or metrics.
pub struct LogWriter;

fn place(e: &Event) -> String {
    let chain = e.chain.as_deref().unwrap_or("?");
    match (e.index, e.action.as_deref()) {
        (Some(i), Some(a)) => format!("chain={chain} #{i} action={a}"),
        (Some(i), None) => format!("chain={chain} #{i}"),
        _ => format!("chain={chain}"),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ChainStarted => println!("[chain-started] {}", place(e)),
            EventKind::InstanceCreated => println!("[created] {}", place(e)),
            EventKind::InstanceUp => println!("[up] {}", place(e)),
            EventKind::InstanceDown => println!("[down] {}", place(e)),
            EventKind::InstanceDying => println!("[dying] {}", place(e)),
            EventKind::InstanceRemoved => println!("[removed] {}", place(e)),
            EventKind::SpawnFailed => {
                println!("[spawn-failed] {} reason={:?}", place(e), e.reason)
            }
            EventKind::RetryScheduled => {
                println!("[retry] {} delay_ms={:?}", place(e), e.delay_ms)
            }
            EventKind::CascadeStarted => {
                println!("[cascade] {} keep={:?}", place(e), e.index)
            }
            EventKind::CascadeSettled => {
                println!("[cascade-settled] {} keep={:?}", place(e), e.index)
            }
            EventKind::ChainDrained => println!("[chain-drained] {}", place(e)),
            EventKind::ChainFaulted => {
                println!("[chain-faulted] {} reason={:?}", place(e), e.reason)
            }
            EventKind::PublicationAdded => {
                println!("[publication] {} name={:?}", place(e), e.name)
            }
            EventKind::PublicationWithdrawn => {
                println!("[publication-withdrawn] {} name={:?}", place(e), e.name)
            }
            EventKind::SelectionChanged => {
                println!("[selection] {} name={:?}", place(e), e.name)
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::AllDrainedWithin => println!("[all-drained-within-grace]"),
            EventKind::GraceExceeded => println!("[grace-exceeded]"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-issue] sub={:?} reason={:?}",
                    e.action, e.reason
                )
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
