//! Submission, observation and cancellation of the image upload chain.

use crate::config::ChainConfig;
use crate::context::{ImageRef, WorkData};
use crate::errors::ChainError;
use crate::notify::{NoOpNotifier, NoOpProgressObserver, Notifier, ProgressObserver};
use crate::pipeline::{Chain, ChainBuilder};
use crate::queue::{ChainHandle, ExistingChainPolicy, InMemoryTaskQueue, StatusStream, TaskQueue};
use crate::stages::{CleanupStage, OptimizeStage, UploadStage};
use crate::upload::Uploader;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Unique name the upload chain is scheduled under.
pub const CHAIN_NAME: &str = "image_upload_work";

/// Builds the optimize, upload and cleanup chain and drives it through a
/// [`TaskQueue`].
///
/// Every submission replaces whatever instance is still running.
pub struct UploadOrchestrator {
    queue: Arc<dyn TaskQueue>,
    config: ChainConfig,
    uploader: Arc<dyn Uploader>,
    notifier: Arc<dyn Notifier>,
    progress: Arc<dyn ProgressObserver>,
    next_notification_id: AtomicU32,
    current: RwLock<Option<Uuid>>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator over an existing queue.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] if the configuration is invalid.
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        uploader: Arc<dyn Uploader>,
        config: ChainConfig,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self {
            queue,
            config,
            uploader,
            notifier: Arc::new(NoOpNotifier),
            progress: Arc::new(NoOpProgressObserver),
            next_notification_id: AtomicU32::new(1),
            current: RwLock::new(None),
        })
    }

    /// Creates an orchestrator over an [`InMemoryTaskQueue`] retrying with
    /// the configured policy.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] if the configuration is invalid.
    pub fn in_memory(uploader: Arc<dyn Uploader>, config: ChainConfig) -> Result<Self, ChainError> {
        let queue = InMemoryTaskQueue::new().with_retry(config.retry.clone());
        Self::new(Arc::new(queue), uploader, config)
    }

    /// Sets the notifier used by the upload stage.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets the observer receiving upload progress.
    #[must_use]
    pub fn with_progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Builds the three-stage chain.
    ///
    /// # Errors
    ///
    /// Only fails if the stage names collide, which the fixed stages never do.
    pub fn build_chain(&self) -> Result<Chain, ChainError> {
        // Error notifications use id + 1, so ids advance in steps of two.
        let notification_id = self.next_notification_id.fetch_add(2, Ordering::Relaxed);
        let upload = UploadStage::from_config(self.uploader.clone(), &self.config)
            .with_notifier(self.notifier.clone(), notification_id);

        let chain = ChainBuilder::new(CHAIN_NAME)
            .then(Arc::new(OptimizeStage::from_config(&self.config)))?
            .then(Arc::new(upload))?
            .then(Arc::new(CleanupStage::from_config(&self.config)))?
            .with_progress_observer(self.progress.clone())
            .build()?;
        Ok(chain)
    }

    /// Submits an image, superseding any chain still in flight.
    ///
    /// An empty or unreadable reference is not rejected here; the chain
    /// reports it as a failed optimize stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot schedule the chain.
    pub fn submit(&self, image: &ImageRef) -> Result<ChainHandle, ChainError> {
        debug!(image = %image, "Submitting image");
        let chain = self.build_chain()?;

        let mut current = self.current.write();
        let handle = self
            .queue
            .enqueue(chain, WorkData::with_image(image), ExistingChainPolicy::Replace)?;
        *current = Some(handle.run_id());

        info!(chain = CHAIN_NAME, run_id = %handle.run_id(), "Image upload submitted");
        Ok(handle)
    }

    /// Observes the latest status of the chain name.
    ///
    /// Progress is not part of this stream; see
    /// [`with_progress_observer`](Self::with_progress_observer).
    #[must_use]
    pub fn observe(&self) -> StatusStream {
        self.queue.observe(CHAIN_NAME)
    }

    /// Requests cancellation of the running chain.
    ///
    /// Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        let cancelled = self.queue.cancel(CHAIN_NAME);
        debug!(chain = CHAIN_NAME, cancelled, "Cancel requested");
        cancelled
    }

    /// Returns the run id of the most recent submission.
    #[must_use]
    pub fn current_run(&self) -> Option<Uuid> {
        *self.current.read()
    }
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("chain", &CHAIN_NAME)
            .field("config", &self.config)
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}
