//! Mock stages, uploaders and notifiers for testing.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::{StageContext, WorkData};
use crate::core::StageOutput;
use crate::errors::ChainError;
use crate::notify::{NotificationProgress, Notifier};
use crate::stages::Stage;
use crate::upload::{UploadBody, UploadResponse, Uploader};

/// A mock stage that records calls and returns fixed data.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    output: Mutex<StageOutput>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<WorkData>>,
}

impl MockStage {
    /// Creates a stage that succeeds with `data`.
    #[must_use]
    pub fn returning(name: impl Into<String>, data: WorkData) -> Self {
        Self::with_output(name, StageOutput::ok(data))
    }

    /// Creates a stage that returns `output` on every call.
    #[must_use]
    pub fn with_output(name: impl Into<String>, output: StageOutput) -> Self {
        Self {
            name: name.into(),
            output: Mutex::new(output),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sets the output to return.
    pub fn set_output(&self, output: StageOutput) {
        *self.output.lock() = output;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the input of each call.
    #[must_use]
    pub fn inputs(&self) -> Vec<WorkData> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().push(ctx.input().clone());
        self.output.lock().clone()
    }
}

/// A stage that fails, optionally recovering after a number of calls.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
    retryable: bool,
    succeed_after: Option<usize>,
    calls: AtomicUsize,
}

impl FailingStage {
    /// Creates a stage failing permanently.
    #[must_use]
    pub fn permanent(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            retryable: false,
            succeed_after: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a stage failing with a retryable error.
    #[must_use]
    pub fn retryable(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::permanent(name, error)
        }
    }

    /// Fails the first `failures` calls and succeeds afterwards.
    #[must_use]
    pub fn succeeding_after(mut self, failures: usize) -> Self {
        self.succeed_after = Some(failures);
        self
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutput {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.succeed_after {
            Some(failures) if previous >= failures => StageOutput::ok_empty(),
            _ if self.retryable => StageOutput::fail_retryable(&self.error),
            _ => StageOutput::fail(&self.error),
        }
    }
}

/// A stage that sleeps until its delay elapses or the chain is cancelled.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
    cancelled: AtomicBool,
}

impl SlowStage {
    /// Creates a stage sleeping for `delay`.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns true if a call observed cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => StageOutput::ok_empty(),
            () = ctx.cancellation().cancelled() => {
                self.cancelled.store(true, Ordering::SeqCst);
                StageOutput::cancel(ctx.cancellation().reason().unwrap_or_default())
            }
        }
    }
}

/// An uploader that drains the body and answers with a fixed response.
#[derive(Debug)]
pub struct RecordingUploader {
    status: u16,
    body: String,
    chunk_delay: Option<Duration>,
    received: Mutex<Vec<Vec<u8>>>,
    chunk_sizes: Mutex<Vec<usize>>,
    content_lengths: Mutex<Vec<u64>>,
}

impl RecordingUploader {
    /// Creates an uploader answering every request with `status` and `body`.
    #[must_use]
    pub fn responding(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            chunk_delay: None,
            received: Mutex::new(Vec::new()),
            chunk_sizes: Mutex::new(Vec::new()),
            content_lengths: Mutex::new(Vec::new()),
        }
    }

    /// Waits this long after each received chunk, simulating a slow link.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Returns the full body of each completed request.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().clone()
    }

    /// Returns the size of every chunk received, across requests.
    #[must_use]
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunk_sizes.lock().clone()
    }

    /// Returns the declared content length of each request.
    #[must_use]
    pub fn content_lengths(&self) -> Vec<u64> {
        self.content_lengths.lock().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, mut body: UploadBody) -> Result<UploadResponse, ChainError> {
        self.content_lengths.lock().push(body.content_length);
        let mut collected = Vec::new();
        while let Some(chunk) = body.stream.next().await {
            let chunk = chunk?;
            self.chunk_sizes.lock().push(chunk.len());
            collected.extend_from_slice(&chunk);
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }
        self.received.lock().push(collected);
        Ok(UploadResponse::new(self.status, self.body.clone()))
    }
}

/// A notification posted to a [`CollectingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedNotification {
    /// Notification id.
    pub id: u32,
    /// Title.
    pub title: String,
    /// Text.
    pub text: String,
    /// Progress indicator, if any.
    pub progress: Option<NotificationProgress>,
}

/// A notifier that records posts and tracks which ids are still shown.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    posts: Mutex<Vec<PostedNotification>>,
    active: Mutex<Vec<u32>>,
}

impl CollectingNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every post in order.
    #[must_use]
    pub fn posts(&self) -> Vec<PostedNotification> {
        self.posts.lock().clone()
    }

    /// Returns the ids posted and not cancelled since, in order of first post.
    #[must_use]
    pub fn active_ids(&self) -> Vec<u32> {
        self.active.lock().clone()
    }
}

impl Notifier for CollectingNotifier {
    fn post(&self, id: u32, title: &str, text: &str, progress: Option<NotificationProgress>) {
        self.posts.lock().push(PostedNotification {
            id,
            title: title.to_string(),
            text: text.to_string(),
            progress,
        });
        let mut active = self.active.lock();
        if !active.contains(&id) {
            active.push(id);
        }
    }

    fn cancel(&self, id: u32) {
        self.active.lock().retain(|active| *active != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;

    fn ctx() -> StageContext {
        StageContext::standalone("s", WorkData::empty())
    }

    #[tokio::test]
    async fn test_failing_stage_recovers() {
        let stage = FailingStage::retryable("s", "boom").succeeding_after(1);
        let first = stage.execute(&ctx()).await;
        assert!(first.is_retryable());
        assert!(stage.execute(&ctx()).await.is_success());
        assert_eq!(stage.calls(), 2);
    }

    #[tokio::test]
    async fn test_slow_stage_observes_cancel() {
        let stage = SlowStage::new("s", Duration::from_secs(30));
        let ctx = ctx();
        ctx.cancellation().cancel("stop");

        let output = stage.execute(&ctx).await;

        assert_eq!(output.status, StageStatus::Cancel);
        assert_eq!(output.cancel_reason.as_deref(), Some("stop"));
        assert!(stage.was_cancelled());
    }

    #[test]
    fn test_collecting_notifier_tracks_active() {
        let notifier = CollectingNotifier::new();
        notifier.post(1, "t", "a", None);
        notifier.post(2, "t", "b", None);
        notifier.post(1, "t", "c", None);
        notifier.cancel(1);

        assert_eq!(notifier.active_ids(), vec![2]);
        assert_eq!(notifier.posts().len(), 3);
    }
}
