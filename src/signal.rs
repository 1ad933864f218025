//! Graceful shutdown on SIGINT / SIGTERM.
//!
//! The first signal flips a `watch` channel that both the poll loop and the
//! consumer observe. A second signal exits the process with status 1.

use tokio::sync::watch;
use tracing::{error, info, warn};

/// Receiving side of the shutdown flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown was requested. A dropped sender counts as a
    /// request.
    pub async fn wait(&mut self) {
        // Err only when the sender is gone.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// A fresh shutdown flag and its trigger.
pub fn channel() -> (watch::Sender<bool>, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (tx, Shutdown { rx })
}

async fn next_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Spawn the signal listener and return the flag it controls.
pub fn install() -> Shutdown {
    let (tx, shutdown) = channel();
    tokio::spawn(async move {
        next_signal().await;
        info!("Received shutdown signal, stopping (press Ctrl+C again to force exit)");
        let _ = tx.send(true);

        next_signal().await;
        warn!("Received second signal, exiting immediately");
        std::process::exit(1);
    });
    shutdown
}
