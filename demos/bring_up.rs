//! # Bring-up and teardown across two chains
//!
//! Demonstrates the core protocol:
//! - Forward initialization as predecessors come up
//! - A publication (`wan`) linking two chains
//! - Bottom-up teardown when the external condition disappears
//!
//! Run with:
//! ```text
//! cargo run --example bring_up --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use chainvisor::{
    ArgExpr, ChainSpec, Config, Depend, Engine, Expose, Gate, LogWriter, Provide, Subscribe,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let engine = Engine::builder(Config::default())
        .with_subscribers(subs)
        .build();

    // The "device" the uplink waits for.
    let (device, device_rx) = watch::channel(false);

    // uplink: [wait for device] -> [publish "wan"]
    let uplink = ChainSpec::new("uplink")
        .action(Gate::spec(device_rx))
        .action(Provide::spec(
            ArgExpr::lit("wan"),
            [("gw", ArgExpr::lit("10.0.0.1"))],
        ));

    // lan: [wait for "wan"] -> [use the gateway it exposes]
    let lan = ChainSpec::new("lan")
        .action(Depend::spec(ArgExpr::lit("wan")))
        .action(Expose::spec([("gw", ArgExpr::var(0, "gw"))]));

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(vec![uplink, lan]).await })
    };

    println!("--- device appears ---");
    device.send(true)?;
    sleep(Duration::from_millis(200)).await;

    println!("--- device disappears: lan tears down before the publisher dies ---");
    device.send(false)?;
    sleep(Duration::from_millis(200)).await;

    println!("--- device returns: both chains rebuild ---");
    device.send(true)?;
    sleep(Duration::from_millis(200)).await;

    engine.shutdown();
    runner.await??;
    Ok(())
}
