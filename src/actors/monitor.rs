//! Liveness-watch primitive
//!
//! A watch is a subscription for a single asynchronous "permanently
//! unreachable" notification: the watched party holds a [`LivenessGuard`]
//! (clone-able), the watcher holds the matching [`LivenessWatch`], and
//! [`LivenessWatch::lost`] resolves once every guard has been dropped —
//! whether by orderly shutdown, a crash unwinding the task, or the process
//! abandoning the connection.

use tokio::sync::mpsc;

/// Held by the watched party. Dropping the last clone fires the watch.
#[derive(Debug, Clone)]
pub struct LivenessGuard {
    _alive: mpsc::Sender<()>,
}

/// Held by the watcher; see [`liveness_pair`].
#[derive(Debug)]
pub struct LivenessWatch {
    expired: mpsc::Receiver<()>,
}

/// Creates a connected guard/watch pair.
pub fn liveness_pair() -> (LivenessGuard, LivenessWatch) {
    let (alive, expired) = mpsc::channel(1);
    (LivenessGuard { _alive: alive }, LivenessWatch { expired })
}

impl LivenessWatch {
    /// Resolves once the peer is permanently unreachable.
    pub async fn lost(mut self) {
        // The guard never sends; recv() returns None when all clones drop.
        while self.expired.recv().await.is_some() {}
    }
}
