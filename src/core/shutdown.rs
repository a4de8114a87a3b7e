//! # Cross-platform OS signal handling.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes when
//! the process receives a termination signal.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal, often used for core dumps or hard stop)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners. If listener registration
/// fails, this pends forever instead of resolving — a broken signal hookup
/// must not masquerade as a shutdown request (programmatic
/// [`Engine::shutdown`](crate::Engine::shutdown) still works).
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let listeners = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );
    match listeners {
        (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = sigint.recv() => {},
                _ = sigterm.recv() => {},
                _ = sigquit.recv() => {},
            }
        }
        _ => futures::future::pending().await,
    }
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners. If listener registration
/// fails, this pends forever instead of resolving.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        futures::future::pending::<()>().await;
    }
}
