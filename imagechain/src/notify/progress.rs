//! Progress observers.

use crate::core::ProgressEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Receives transient progress events from long-running stages.
///
/// Observers are optional; a stage's result never depends on them.
pub trait ProgressObserver: Send + Sync {
    /// Called on every coarse progress step.
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards all progress events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressObserver;

impl ProgressObserver for NoOpProgressObserver {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Logs progress events at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressObserver;

impl ProgressObserver for LoggingProgressObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        debug!(
            stage = %event.stage,
            bytes_done = event.bytes_done,
            bytes_total = event.bytes_total,
            "Progress: {}%",
            event.percent()
        );
    }
}

/// Fans progress events out to any number of subscribers.
///
/// Slow subscribers miss events rather than slow the stage down.
#[derive(Debug, Clone)]
pub struct BroadcastProgressObserver {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgressObserver {
    /// Creates an observer buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastProgressObserver {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ProgressObserver for BroadcastProgressObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}
