//! Cancellation token shared between a fetch run and `abort`

use std::sync::Arc;
use tokio::sync::watch;

/// One-shot cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Whether two handles refer to the same token
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
