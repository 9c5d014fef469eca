//! Interrupt handling as an explicit cancellation token

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::console::Console;
use super::session::SessionWriter;

/// Cancellation token observed by the writer and reader loops
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered. Never resolves if the controller
    /// is dropped without triggering.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns the token and closes the session on interrupt
#[derive(Clone)]
pub struct ShutdownController {
    tx: Arc<watch::Sender<bool>>,
    started: Arc<AtomicBool>,
    session: SessionWriter,
    console: Console,
    close_timeout: Duration,
}

impl ShutdownController {
    pub fn new(session: SessionWriter, console: Console, close_timeout: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            started: Arc::new(AtomicBool::new(false)),
            session,
            console,
            close_timeout,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    /// Announce the exit, trigger the token and close the session.
    ///
    /// The token is triggered before the close so the loops stop before the
    /// peer's close reply arrives. The close waits for a send in flight, but
    /// never longer than the close timeout.
    pub async fn shutdown(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.console.exiting() {
            warn!("Failed to write to console: {}", e);
        }
        self.tx.send_replace(true);

        if let Err(e) = self.session.close_within(self.close_timeout).await {
            warn!("Error closing session during shutdown: {}", e);
        }
    }

    /// Wait for Ctrl+C in the background, then shut down
    pub fn spawn_interrupt_listener(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }

            info!("Ctrl+C received, initiating shutdown");
            controller.shutdown().await;
        })
    }
}
