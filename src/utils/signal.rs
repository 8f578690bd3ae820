//! Shutdown signals for the host binary

use std::fmt;
use tracing::warn;

/// Which signal asked the host to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM, as sent by service managers
    Terminate,
    /// SIGINT or Ctrl+C
    Interrupt,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Resolve once the process is asked to stop
///
/// If SIGTERM cannot be watched, only Ctrl+C stops the host.
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = sigterm.recv() => ShutdownSignal::Terminate,
                    _ = interrupted() => ShutdownSignal::Interrupt,
                };
            }
            Err(e) => warn!("Cannot watch SIGTERM, stopping on Ctrl+C only: {}", e),
        }
    }

    interrupted().await;
    ShutdownSignal::Interrupt
}

/// Ctrl+C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot watch Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
