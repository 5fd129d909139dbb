//! In-process task queue.

use super::{ChainHandle, ExistingChainPolicy, StatusStream, TaskQueue};
use crate::cancellation::CancellationToken;
use crate::context::WorkData;
use crate::core::{ChainState, ChainStatus};
use crate::errors::ChainError;
use crate::pipeline::{Chain, ChainRunner, RetryConfig, StatusSink};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

/// Runs each chain instance on its own tokio task.
///
/// At most one instance per chain name is current. Only the current
/// instance may publish statuses, so a replaced run can never overwrite the
/// status of its successor.
pub struct InMemoryTaskQueue {
    slots: DashMap<String, Arc<ChainSlot>>,
    runner: ChainRunner,
}

struct ChainSlot {
    tx: watch::Sender<Option<ChainStatus>>,
    current: Mutex<Option<ActiveRun>>,
}

struct ActiveRun {
    run_id: Uuid,
    token: Arc<CancellationToken>,
    finished: bool,
}

impl ChainSlot {
    fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            current: Mutex::new(None),
        }
    }
}

/// Publishes statuses of one instance while it is still current.
struct SlotPublisher {
    slot: Arc<ChainSlot>,
    run_id: Uuid,
}

impl StatusSink for SlotPublisher {
    fn publish(&self, status: ChainStatus) {
        let mut current = self.slot.current.lock();
        match current.as_mut() {
            Some(active) if active.run_id == self.run_id => {
                if status.is_finished() {
                    active.finished = true;
                }
                self.slot.tx.send_replace(Some(status));
            }
            _ => {}
        }
    }
}

impl InMemoryTaskQueue {
    /// Creates a queue with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            runner: ChainRunner::new(),
        }
    }

    /// Sets the retry policy applied to retryable stage failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.runner = self.runner.with_retry(retry);
        self
    }

    /// Returns the latest status of a chain name.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<ChainStatus> {
        self.slots.get(name).and_then(|slot| slot.tx.borrow().clone())
    }

    /// Returns the run id of the instance currently holding a name.
    #[must_use]
    pub fn current_run(&self, name: &str) -> Option<Uuid> {
        let slot = self.slots.get(name)?.clone();
        let current = slot.current.lock();
        current.as_ref().map(|active| active.run_id)
    }

    fn slot(&self, name: &str) -> Arc<ChainSlot> {
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ChainSlot::new()))
            .clone()
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTaskQueue")
            .field("chains", &self.slots.len())
            .field("runner", &self.runner)
            .finish()
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn enqueue(
        &self,
        chain: Chain,
        input: WorkData,
        policy: ExistingChainPolicy,
    ) -> Result<ChainHandle, ChainError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| ChainError::Internal(format!("No async runtime: {err}")))?;

        let name = chain.name().to_string();
        let slot = self.slot(&name);
        let mut current = slot.current.lock();

        if let Some(active) = current.as_ref().filter(|active| !active.finished) {
            match policy {
                ExistingChainPolicy::Keep => {
                    info!(chain = %name, run_id = %active.run_id, "Chain already running, keeping it");
                    return Ok(ChainHandle::new(
                        name,
                        active.run_id,
                        StatusStream::new(slot.tx.subscribe()),
                    ));
                }
                ExistingChainPolicy::Replace => {
                    info!(chain = %name, run_id = %active.run_id, "Replacing running chain");
                    active.token.cancel("Replaced by a newer submission");
                }
            }
        }

        let run_id = Uuid::new_v4();
        let token = Arc::new(CancellationToken::new());
        *current = Some(ActiveRun {
            run_id,
            token: token.clone(),
            finished: false,
        });
        slot.tx.send_replace(Some(
            ChainStatus::new(&name, run_id, ChainState::Enqueued).with_output(Some(input.clone())),
        ));
        let handle = ChainHandle::new(&name, run_id, StatusStream::new(slot.tx.subscribe()));
        drop(current);

        info!(chain = %name, %run_id, stages = chain.stage_count(), "Chain enqueued");

        let publisher = SlotPublisher {
            slot: slot.clone(),
            run_id,
        };
        let runner = self.runner.clone();
        runtime.spawn(async move {
            let run = AssertUnwindSafe(runner.run(&chain, run_id, input, token, &publisher));
            if run.catch_unwind().await.is_err() {
                error!(chain = %chain.name(), %run_id, "Chain task panicked");
                publisher.publish(
                    ChainStatus::new(chain.name(), run_id, ChainState::Failed)
                        .with_error("A stage panicked"),
                );
            }
        });

        Ok(handle)
    }

    fn observe(&self, name: &str) -> StatusStream {
        StatusStream::new(self.slot(name).tx.subscribe())
    }

    fn cancel(&self, name: &str) -> bool {
        let Some(slot) = self.slots.get(name).map(|slot| slot.clone()) else {
            return false;
        };
        let current = slot.current.lock();
        match current.as_ref() {
            Some(active) if !active.finished => {
                info!(chain = %name, run_id = %active.run_id, "Cancelling chain");
                active.token.cancel("Cancelled by request");
                true
            }
            _ => false,
        }
    }
}
