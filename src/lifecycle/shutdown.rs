//! Process-wide stop signal.
//!
//! One [`Shutdown`] is created at startup and cloned into whatever needs to
//! stop: the signal handler triggers it, the HTTP server listens on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Cloneable stop signal shared by the signal handler and the server.
#[derive(Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver that yields once the signal fires.
    ///
    /// A receiver taken after the signal fired yields immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        let receiver = self.notify.subscribe();
        if !self.is_triggered() {
            return receiver;
        }
        let (tx, late) = broadcast::channel(1);
        let _ = tx.send(());
        late
    }

    /// Fire the signal. Later calls do nothing.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!(listeners = self.notify.receiver_count(), "Shutdown triggered");
            let _ = self.notify.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
