//! # Priority failover with multidepend
//!
//! Two interfaces publish under different names; a consumer prefers `eth1`
//! over `eth0`. When the preferred interface appears, the consumer is forced
//! through Down — tearing down everything built on the old selection —
//! before rebinding. Selections never swap silently.
//!
//! Run with:
//! ```text
//! cargo run --example failover --features logging
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

    let (eth0_link, eth0_rx) = watch::channel(false);
    let (eth1_link, eth1_rx) = watch::channel(false);

    let eth0 = ChainSpec::new("eth0")
        .action(Gate::spec(eth0_rx))
        .action(Provide::shared(
            ArgExpr::lit("eth0"),
            [("src", ArgExpr::lit("eth0"))],
        ));
    let eth1 = ChainSpec::new("eth1")
        .action(Gate::spec(eth1_rx))
        .action(Provide::shared(
            ArgExpr::lit("eth1"),
            [("src", ArgExpr::lit("eth1"))],
        ));

    // Prefers eth1; falls back to eth0.
    let consumer = ChainSpec::new("consumer")
        .action(Depend::priority([ArgExpr::lit("eth1"), ArgExpr::lit("eth0")]))
        .action(Expose::spec([("using", ArgExpr::var(0, "src"))]));

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(vec![eth0, eth1, consumer]).await })
    };

    println!("--- only eth0 is up: consumer binds to it ---");
    eth0_link.send(true)?;
    sleep(Duration::from_millis(200)).await;

    println!("--- eth1 comes up: forced rebuild onto the better candidate ---");
    eth1_link.send(true)?;
    sleep(Duration::from_millis(200)).await;

    println!("--- eth1 goes away again: fall back to eth0 ---");
    eth1_link.send(false)?;
    sleep(Duration::from_millis(200)).await;

    engine.shutdown();
    runner.await??;
    Ok(())
}
