//! Upload stage.
//!
//! Streams the optimized file to the upload endpoint in fixed-size chunks.
//! Each chunk is read exactly once, and the cancellation token is checked
//! before every read so a cancelled upload stops sending promptly.

use super::Stage;
use crate::config::ChainConfig;
use crate::context::{ImageRef, StageContext, WorkData};
use crate::core::StageOutput;
use crate::errors::ChainError;
use crate::notify::{NoOpNotifier, Notifier, UploadNotifications};
use crate::upload::{UploadBody, Uploader, JPEG_CONTENT_TYPE};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

/// Uploads the file named by `image_uri`.
///
/// Output: `image_uri` holding the server's response token.
#[derive(Clone)]
pub struct UploadStage {
    uploader: Arc<dyn Uploader>,
    notifier: Arc<dyn Notifier>,
    notification_id: u32,
    chunk_size: usize,
    progress_buckets: u64,
    cancel_poll_interval: Duration,
}

impl UploadStage {
    /// Stage name used in chains.
    pub const NAME: &'static str = "upload";

    /// Creates a stage over an uploader with default settings.
    #[must_use]
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        let defaults = ChainConfig::default();
        Self {
            uploader,
            notifier: Arc::new(NoOpNotifier),
            notification_id: 0,
            chunk_size: defaults.chunk_size,
            progress_buckets: defaults.progress_buckets,
            cancel_poll_interval: defaults.cancel_poll_interval(),
        }
    }

    /// Creates a stage from the chain configuration.
    #[must_use]
    pub fn from_config(uploader: Arc<dyn Uploader>, config: &ChainConfig) -> Self {
        Self::new(uploader)
            .with_chunk_size(config.chunk_size)
            .with_progress_buckets(config.progress_buckets)
            .with_cancel_poll_interval(config.cancel_poll_interval())
    }

    /// Sets the notifier and the id of the progress notification.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, id: u32) -> Self {
        self.notifier = notifier;
        self.notification_id = id;
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the number of progress steps.
    #[must_use]
    pub fn with_progress_buckets(mut self, buckets: u64) -> Self {
        self.progress_buckets = buckets.max(1);
        self
    }

    /// Sets how often a pending request rechecks for cancellation.
    #[must_use]
    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    async fn upload(
        &self,
        ctx: &StageContext,
        notifications: &UploadNotifications,
    ) -> Result<Option<String>, ChainError> {
        let image = ctx
            .input()
            .image()
            .filter(|image| !image.is_empty())
            .ok_or_else(|| ChainError::InputInvalid("Invalid or empty image reference".into()))?;
        let path = image.to_path()?;

        let file = File::open(&path).await?;
        let total = file.metadata().await?.len();
        info!(chain = %ctx.chain_name(), image = %image, bytes_total = total, "Uploading image");

        let reader = ChunkReader {
            file,
            ctx: ctx.clone(),
            notifications: notifications.clone(),
            chunk: self.chunk_size,
            buckets: self.progress_buckets,
            total,
            done: 0,
            current_bucket: 0,
            finished: false,
        };
        let body = UploadBody::new(reader.into_stream(), total, JPEG_CONTENT_TYPE);

        let cancel = ctx.cancellation();
        let request = self.uploader.upload(body);
        tokio::pin!(request);
        let mut poll = tokio::time::interval(self.cancel_poll_interval);

        let response = loop {
            tokio::select! {
                response = &mut request => break response?,
                () = cancel.cancelled() => return Ok(None),
                _ = poll.tick() => {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                }
            }
        };

        // The transport may have finished just as cancellation arrived.
        if cancel.is_cancelled() {
            return Ok(None);
        }

        debug!(status = response.status, "Upload finished");
        response.into_token().map(Some)
    }
}

#[async_trait]
impl Stage for UploadStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let notifications = UploadNotifications::new(self.notifier.clone(), self.notification_id);
        if ctx.is_cancelled() {
            return StageOutput::cancel(ctx.cancellation().reason().unwrap_or_default());
        }

        notifications.started();

        match self.upload(ctx, &notifications).await {
            Ok(Some(token)) => {
                notifications.finished();
                info!(chain = %ctx.chain_name(), "Upload succeeded");
                StageOutput::ok(WorkData::with_image(&ImageRef::new(token)))
            }
            Ok(None) => {
                notifications.cancelled();
                let reason = ctx.cancellation().reason().unwrap_or_default();
                warn!(chain = %ctx.chain_name(), reason = %reason, "Upload cancelled");
                StageOutput::cancel(reason)
            }
            Err(err) if ctx.is_cancelled() => {
                // A body aborted by cancellation surfaces as a transport error.
                debug!(error = %err, "Upload aborted after cancellation");
                notifications.cancelled();
                StageOutput::cancel(ctx.cancellation().reason().unwrap_or_default())
            }
            Err(err) => {
                notifications.error();
                error!(chain = %ctx.chain_name(), error = %err, "Error while attempting to upload image");
                StageOutput::from_error(&err)
            }
        }
    }
}

impl std::fmt::Debug for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStage")
            .field("notification_id", &self.notification_id)
            .field("chunk_size", &self.chunk_size)
            .field("progress_buckets", &self.progress_buckets)
            .field("cancel_poll_interval", &self.cancel_poll_interval)
            .finish_non_exhaustive()
    }
}

/// Reads the payload chunk by chunk and reports coarse progress.
struct ChunkReader {
    file: File,
    ctx: StageContext,
    notifications: UploadNotifications,
    chunk: usize,
    buckets: u64,
    total: u64,
    done: u64,
    current_bucket: u64,
    finished: bool,
}

impl ChunkReader {
    fn into_stream(self) -> futures::stream::BoxStream<'static, io::Result<Bytes>> {
        stream::unfold(self, |mut reader| async move {
            if reader.finished {
                return None;
            }
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), reader)),
                Ok(None) => None,
                Err(err) => {
                    reader.finished = true;
                    Some((Err(err), reader))
                }
            }
        })
        .boxed()
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.ctx.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "upload cancelled"));
        }

        let mut buf = BytesMut::zeroed(self.chunk);
        let read = self.file.read(&mut buf).await?;
        if read == 0 {
            self.finished = true;
            self.report();
            return Ok(None);
        }

        buf.truncate(read);
        self.done += read as u64;

        let bucket = if self.total == 0 {
            self.buckets
        } else {
            self.done.saturating_mul(self.buckets) / self.total
        };
        if bucket != self.current_bucket {
            self.current_bucket = bucket;
            self.report();
        }

        Ok(Some(buf.freeze()))
    }

    fn report(&self) {
        debug!(bytes_done = self.done, bytes_total = self.total, "Upload progress");
        self.ctx.report_progress(self.total, self.done);
        self.notifications.progress(self.total, self.done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::notify::{BroadcastProgressObserver, MockNotifier};
    use crate::testing::{CollectingNotifier, RecordingUploader};
    use crate::upload::UploadResponse;
    use pretty_assertions::assert_eq;

    fn write_payload(dir: &std::path::Path, len: usize) -> ImageRef {
        let path = dir.join("payload.jpg");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, bytes).unwrap();
        ImageRef::from_path(path)
    }

    fn ctx_for(image: &ImageRef) -> StageContext {
        StageContext::standalone(UploadStage::NAME, WorkData::with_image(image))
    }

    #[tokio::test]
    async fn test_token_becomes_output() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 1000);
        let uploader = Arc::new(RecordingUploader::responding(200, "OK"));
        let stage = UploadStage::new(uploader.clone()).with_chunk_size(64);

        let output = stage.execute(&ctx_for(&image)).await;

        assert!(output.is_success());
        assert_eq!(output.data.unwrap().image(), Some(ImageRef::new("OK")));
        assert_eq!(uploader.received(), vec![(0..1000).map(|i| (i % 251) as u8).collect::<Vec<u8>>()]);
    }

    #[tokio::test]
    async fn test_each_chunk_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 1000);
        let uploader = Arc::new(RecordingUploader::responding(200, "OK"));
        let stage = UploadStage::new(uploader.clone()).with_chunk_size(300);

        stage.execute(&ctx_for(&image)).await;

        assert_eq!(uploader.chunk_sizes(), vec![300, 300, 300, 100]);
        assert_eq!(uploader.content_lengths(), vec![1000]);
    }

    #[tokio::test]
    async fn test_progress_is_bucketed() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 1000);
        let observer = Arc::new(BroadcastProgressObserver::new(256));
        let mut rx = observer.subscribe();
        let stage = UploadStage::new(Arc::new(RecordingUploader::responding(200, "OK")))
            .with_chunk_size(10)
            .with_progress_buckets(20);

        stage
            .execute(&ctx_for(&image).with_progress_observer(observer))
            .await;

        let mut done = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.stage, UploadStage::NAME);
            assert_eq!(event.bytes_total, 1000);
            done.push(event.bytes_done);
        }
        // 20 bucket changes plus the final report.
        assert_eq!(done.len(), 21);
        assert_eq!(done.first(), Some(&50));
        assert_eq!(done.last(), Some(&1000));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_failure() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 10);
        let notifier = Arc::new(CollectingNotifier::new());
        let stage = UploadStage::new(Arc::new(RecordingUploader::responding(503, "busy")))
            .with_notifier(notifier.clone(), 7);

        let output = stage.execute(&ctx_for(&image)).await;

        assert_eq!(output.status, StageStatus::Fail);
        assert!(output.is_retryable());
        assert_eq!(notifier.active_ids(), vec![8]);
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 10);
        let stage = UploadStage::new(Arc::new(RecordingUploader::responding(400, "bad")));

        let output = stage.execute(&ctx_for(&image)).await;

        assert!(output.is_failure());
        assert!(!output.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let image = ImageRef::from_path(dir.path().join("gone.jpg"));
        let uploader = Arc::new(RecordingUploader::responding(200, "OK"));

        let output = UploadStage::new(uploader.clone()).execute(&ctx_for(&image)).await;

        assert!(output.is_failure());
        assert!(uploader.received().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_upload() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 10_000);
        let uploader = Arc::new(RecordingUploader::responding(200, "OK").with_chunk_delay(Duration::from_millis(20)));
        let stage = UploadStage::new(uploader.clone())
            .with_chunk_size(100)
            .with_cancel_poll_interval(Duration::from_millis(10));
        let ctx = ctx_for(&image);

        let token = ctx.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel("user");
        });

        let output = stage.execute(&ctx).await;

        assert_eq!(output.status, StageStatus::Cancel);
        assert_eq!(output.cancel_reason.as_deref(), Some("user"));
        let sent: usize = uploader.chunk_sizes().iter().sum();
        assert!(sent < 10_000, "sent {sent} bytes");
    }

    #[tokio::test]
    async fn test_notification_sequence_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 100);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_post()
            .withf(|id, _, text, progress| {
                *id == 3 && text == "Starting upload..." && progress.is_some_and(|p| p.indeterminate)
            })
            .times(1)
            .return_const(());
        notifier
            .expect_post()
            .withf(|id, _, text, _| *id == 3 && text == "Upload in progress")
            .times(1..)
            .return_const(());
        notifier
            .expect_cancel()
            .with(mockall::predicate::eq(3))
            .times(1)
            .return_const(());

        let stage = UploadStage::new(Arc::new(RecordingUploader::responding(200, "OK")))
            .with_notifier(Arc::new(notifier), 3);

        assert!(stage.execute(&ctx_for(&image)).await.is_success());
    }

    #[tokio::test]
    async fn test_transport_mock_sees_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_payload(dir.path(), 5);

        let mut uploader = crate::upload::MockUploader::new();
        uploader
            .expect_upload()
            .withf(|body| body.content_type == JPEG_CONTENT_TYPE && body.content_length == 5)
            .times(1)
            .returning(|_| Ok(UploadResponse::new(201, "token-1")));

        let output = UploadStage::new(Arc::new(uploader)).execute(&ctx_for(&image)).await;

        assert_eq!(
            output.data.and_then(|d| d.image()),
            Some(ImageRef::new("token-1"))
        );
    }
}
