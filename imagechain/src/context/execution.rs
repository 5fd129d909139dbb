//! Per-stage execution context.

use super::WorkData;
use crate::cancellation::CancellationToken;
use crate::core::ProgressEvent;
use crate::notify::{NoOpProgressObserver, ProgressObserver};
use std::sync::Arc;
use uuid::Uuid;

/// Everything a stage sees while it runs.
///
/// The context is rebuilt for every attempt; `input` is the output of the
/// previous stage, or the chain's initial input for the first stage.
#[derive(Clone)]
pub struct StageContext {
    chain_name: String,
    run_id: Uuid,
    stage_name: String,
    stage_index: usize,
    attempt: usize,
    input: WorkData,
    cancel: Arc<CancellationToken>,
    progress: Arc<dyn ProgressObserver>,
}

impl StageContext {
    /// Creates a context for a stage.
    #[must_use]
    pub fn new(
        chain_name: impl Into<String>,
        run_id: Uuid,
        stage_name: impl Into<String>,
        input: WorkData,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            chain_name: chain_name.into(),
            run_id,
            stage_name: stage_name.into(),
            stage_index: 0,
            attempt: 0,
            input,
            cancel,
            progress: Arc::new(NoOpProgressObserver),
        }
    }

    /// Creates a detached context, handy for running a stage on its own.
    #[must_use]
    pub fn standalone(stage_name: impl Into<String>, input: WorkData) -> Self {
        Self::new(
            "standalone",
            Uuid::new_v4(),
            stage_name,
            input,
            Arc::new(CancellationToken::new()),
        )
    }

    /// Sets the stage position within the chain.
    #[must_use]
    pub fn with_stage_index(mut self, index: usize) -> Self {
        self.stage_index = index;
        self
    }

    /// Sets the zero-based attempt counter.
    #[must_use]
    pub fn with_attempt(mut self, attempt: usize) -> Self {
        self.attempt = attempt;
        self
    }

    /// Sets the progress observer.
    #[must_use]
    pub fn with_progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// Returns the unique chain name.
    #[must_use]
    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    /// Returns the chain instance id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the stage position within the chain.
    #[must_use]
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Returns the zero-based attempt counter.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Returns the stage input.
    #[must_use]
    pub fn input(&self) -> &WorkData {
        &self.input
    }

    /// Returns the cancellation token of the chain instance.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns true if the chain instance has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forwards a progress event for this stage to the observer.
    pub fn report_progress(&self, bytes_total: u64, bytes_done: u64) {
        self.progress
            .on_progress(&ProgressEvent::new(self.stage_name.clone(), bytes_total, bytes_done));
    }

    /// Returns the progress observer.
    #[must_use]
    pub fn progress_observer(&self) -> &Arc<dyn ProgressObserver> {
        &self.progress
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("chain_name", &self.chain_name)
            .field("run_id", &self.run_id)
            .field("stage_name", &self.stage_name)
            .field("stage_index", &self.stage_index)
            .field("attempt", &self.attempt)
            .field("input", &self.input)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
