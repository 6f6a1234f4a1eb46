//! Shutdown coordination.

use tokio::sync::broadcast;

/// Fan-out of a single shutdown notification.
///
/// Every long-running task subscribes before it starts; a trigger reaches
/// all current subscribers.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Triggering twice is harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `rx` sees a trigger or its sender is gone.
pub async fn wait(mut rx: broadcast::Receiver<()>) {
    // Lagged, closed and received all mean the same thing here.
    let _ = rx.recv().await;
}
