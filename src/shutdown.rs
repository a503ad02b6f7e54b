//! Graceful-shutdown signal handling.

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Resolves when the process receives SIGINT or SIGTERM.
///
/// Handed to [`axum::serve`]'s graceful shutdown so in-flight requests
/// finish before the listener closes.
pub async fn wait_for_signal() {
    let mut interrupt = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");

    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT, shutting down"),
        _ = terminate.recv() => info!("received SIGTERM, shutting down"),
    }
}
