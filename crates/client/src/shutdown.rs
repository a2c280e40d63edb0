//! Cooperative shutdown signalling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cloneable handle asking the client to close its connection with code
/// 1000 and exit the reconnect loop.
///
/// Cancellation is cooperative: in-flight sends may complete, and
/// receives are abandoned at the next yield point.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<Inner>);

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.0.requested.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown is requested.
    pub(crate) async fn wait(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        loop {
            if self.is_shutdown() {
                return;
            }
            notified.as_mut().enable();
            if self.is_shutdown() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.0.notify.notified());
        }
    }
}
