//! Cancellation signal - the one piece of state shared with the interrupt source

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::{debug, warn};

/// Process-wide, set-once cancellation flag
///
/// Cloning yields another handle to the same flag. Once requested it is never
/// cleared.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Create a new, unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    ///
    /// Returns true only for the call that actually flipped the flag.
    pub fn request(&self) -> bool {
        let first = !self.inner.requested.swap(true, Ordering::SeqCst);
        debug!(first, "CancelSignal::request: called");
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Non-blocking read of the flag
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a request in between is not lost
            notified.as_mut().enable();

            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Route OS interrupts to the cancellation signal
///
/// The first SIGINT/SIGTERM requests cancellation; a second one exits the
/// process immediately with `force_exit_code`.
pub fn install_handlers(cancel: CancelSignal, force_exit_code: i32) -> std::io::Result<()> {
    debug!(force_exit_code, "install_handlers: called");

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigint.recv() => debug!("install_handlers: SIGINT received"),
                    _ = sigterm.recv() => debug!("install_handlers: SIGTERM received"),
                }
                if !cancel.request() {
                    warn!("Second interrupt received, exiting immediately");
                    std::process::exit(force_exit_code);
                }
                warn!("Interrupt received, stopping after the current attempt");
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    warn!("Failed to listen for ctrl_c");
                    return;
                }
                debug!("install_handlers: ctrl_c received");
                if !cancel.request() {
                    warn!("Second interrupt received, exiting immediately");
                    std::process::exit(force_exit_code);
                }
                warn!("Interrupt received, stopping after the current attempt");
            }
        });
    }

    Ok(())
}
