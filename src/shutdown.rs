use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Install a handler that cancels the returned token on SIGTERM or SIGINT.
///
/// The scheduler loop checks the token between cycles, so a signal never
/// interrupts a cycle halfway through its dispatches.
pub fn install_shutdown_handler() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let cancel = token.clone();
    tokio::spawn(async move {
        let signal_name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = signal_name, "Shutdown requested, finishing current cycle");
        cancel.cancel();
    });

    Ok(token)
}
