//! Handles and status streams for enqueued chains.

use crate::core::ChainStatus;
use crate::errors::ChainError;
use futures::stream::{self, Stream};
use tokio::sync::watch;
use uuid::Uuid;

/// A live view of the latest status of one chain name.
///
/// Only the most recent snapshot is kept; a slow reader sees the newest
/// state rather than every intermediate one.
#[derive(Debug, Clone)]
pub struct StatusStream {
    rx: watch::Receiver<Option<ChainStatus>>,
}

impl StatusStream {
    pub(crate) fn new(rx: watch::Receiver<Option<ChainStatus>>) -> Self {
        Self { rx }
    }

    /// Returns the latest snapshot, if any run was ever enqueued.
    #[must_use]
    pub fn latest(&self) -> Option<ChainStatus> {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the queue that owns the stream is gone.
    pub async fn changed(&mut self) -> Option<ChainStatus> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(status) = self.rx.borrow_and_update().clone() {
                return Some(status);
            }
        }
    }

    /// Waits until the latest snapshot is terminal and returns it.
    ///
    /// Returns `None` once the queue that owns the stream is gone.
    pub async fn wait_terminal(&mut self) -> Option<ChainStatus> {
        if let Some(status) = self.rx.borrow_and_update().clone() {
            if status.is_finished() {
                return Some(status);
            }
        }
        loop {
            let status = self.changed().await?;
            if status.is_finished() {
                return Some(status);
            }
        }
    }

    /// Converts into a stream yielding the current snapshot, if any, and
    /// then every later one.
    pub fn into_stream(mut self) -> impl Stream<Item = ChainStatus> + Send + 'static {
        let current = self.rx.borrow_and_update().clone();
        stream::unfold((self, current), |(mut statuses, pending)| async move {
            if let Some(status) = pending {
                return Some((status, (statuses, None)));
            }
            let status = statuses.changed().await?;
            Some((status, (statuses, None)))
        })
    }
}

/// The result of enqueueing a chain.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    name: String,
    run_id: Uuid,
    statuses: StatusStream,
}

impl ChainHandle {
    pub(crate) fn new(name: impl Into<String>, run_id: Uuid, statuses: StatusStream) -> Self {
        Self {
            name: name.into(),
            run_id,
            statuses,
        }
    }

    /// Returns the unique chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id of the chain instance.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the latest snapshot of this instance, or `None` once another
    /// instance took over the name.
    #[must_use]
    pub fn status(&self) -> Option<ChainStatus> {
        self.statuses.latest().filter(|s| s.run_id == self.run_id)
    }

    /// Returns a stream over the chain name, which also reports later runs.
    #[must_use]
    pub fn statuses(&self) -> StatusStream {
        self.statuses.clone()
    }

    /// Waits for this instance to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Superseded`] if a newer submission replaced this
    /// instance first.
    pub async fn wait(mut self) -> Result<ChainStatus, ChainError> {
        let mut latest = self.statuses.latest();
        loop {
            if let Some(status) = latest {
                if status.run_id != self.run_id {
                    return Err(ChainError::Superseded { chain: self.name });
                }
                if status.is_finished() {
                    return Ok(status);
                }
            }
            latest = Some(self.statuses.changed().await.ok_or_else(|| {
                ChainError::Internal(format!("Status channel of '{}' closed", self.name))
            })?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChainState;
    use futures::StreamExt;

    fn status(run_id: Uuid, state: ChainState) -> Option<ChainStatus> {
        Some(ChainStatus::new("c", run_id, state))
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_status() {
        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(status(run_id, ChainState::Enqueued));
        let handle = ChainHandle::new("c", run_id, StatusStream::new(rx));

        let waiter = tokio::spawn(handle.wait());
        tx.send_replace(status(run_id, ChainState::Running { stage_index: 0, stage: "a".into() }));
        tx.send_replace(status(run_id, ChainState::Succeeded));

        let finished = waiter.await.unwrap().unwrap();
        assert_eq!(finished.state, ChainState::Succeeded);
    }

    #[tokio::test]
    async fn test_wait_reports_superseded() {
        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(status(run_id, ChainState::Enqueued));
        let handle = ChainHandle::new("c", run_id, StatusStream::new(rx));

        tx.send_replace(status(Uuid::new_v4(), ChainState::Enqueued));

        assert!(matches!(handle.wait().await, Err(ChainError::Superseded { .. })));
    }

    #[tokio::test]
    async fn test_wait_errors_when_channel_closes() {
        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(status(run_id, ChainState::Enqueued));
        let handle = ChainHandle::new("c", run_id, StatusStream::new(rx));
        drop(tx);

        assert!(matches!(handle.wait().await, Err(ChainError::Internal(_))));
    }

    #[tokio::test]
    async fn test_stream_starts_with_current_value() {
        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(status(run_id, ChainState::Enqueued));
        let mut stream = Box::pin(StatusStream::new(rx).into_stream());

        assert_eq!(stream.next().await.unwrap().state, ChainState::Enqueued);
        tx.send_replace(status(run_id, ChainState::Cancelled));
        assert_eq!(stream.next().await.unwrap().state, ChainState::Cancelled);
        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_waits_for_first_status() {
        let (tx, rx) = watch::channel(None);
        let mut statuses = StatusStream::new(rx);
        assert!(statuses.latest().is_none());

        let run_id = Uuid::new_v4();
        tx.send_replace(status(run_id, ChainState::Failed));

        let terminal = statuses.wait_terminal().await.unwrap();
        assert_eq!(terminal.state, ChainState::Failed);
    }

    #[test]
    fn test_handle_status_filters_other_runs() {
        let run_id = Uuid::new_v4();
        let (_tx, rx) = watch::channel(status(Uuid::new_v4(), ChainState::Enqueued));
        let handle = ChainHandle::new("c", run_id, StatusStream::new(rx));

        assert!(handle.status().is_none());
        assert_eq!(handle.run_id(), run_id);
        assert_eq!(handle.name(), "c");
    }
}
