//! Notifier trait and implementations.

use std::sync::Arc;
use tracing::{debug, info};

/// Progress shown on a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationProgress {
    /// Maximum value.
    pub max: u64,
    /// Current value.
    pub current: u64,
    /// Whether the indicator has no known extent.
    pub indeterminate: bool,
}

impl NotificationProgress {
    /// A determinate indicator.
    #[must_use]
    pub fn determinate(max: u64, current: u64) -> Self {
        Self {
            max,
            current,
            indeterminate: false,
        }
    }

    /// An indicator with no known extent.
    #[must_use]
    pub fn indeterminate() -> Self {
        Self {
            max: 100,
            current: 0,
            indeterminate: true,
        }
    }
}

/// Fire-and-forget user notifications.
///
/// Notifications are an observability aid; implementations must never fail
/// the caller.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Posts or updates the notification with the given id.
    fn post(&self, id: u32, title: &str, text: &str, progress: Option<NotificationProgress>);

    /// Removes the notification with the given id.
    fn cancel(&self, id: u32);
}

/// A no-op notifier that discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn post(&self, _id: u32, _title: &str, _text: &str, _progress: Option<NotificationProgress>) {}

    fn cancel(&self, _id: u32) {}
}

/// A notifier that writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn post(&self, id: u32, title: &str, text: &str, progress: Option<NotificationProgress>) {
        let current = progress.map(|p| p.current);
        let max = progress.map(|p| p.max);
        info!(id, title, text, ?current, ?max, "Notification posted");
    }

    fn cancel(&self, id: u32) {
        debug!(id, "Notification cancelled");
    }
}

/// The notification sequence of one upload.
///
/// Progress lives under `id`; an error is posted under `id + 1` so it stays
/// dismissable after the ongoing progress notification is removed.
#[derive(Clone)]
pub struct UploadNotifications {
    notifier: Arc<dyn Notifier>,
    id: u32,
}

impl UploadNotifications {
    const TITLE: &'static str = "Upload";

    /// Creates the sequence for a notification id.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, id: u32) -> Self {
        Self { notifier, id }
    }

    /// Returns the progress notification id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Posts the initial indeterminate notification.
    pub fn started(&self) {
        debug!(id = self.id, "Building upload notification");
        self.notifier.post(
            self.id,
            Self::TITLE,
            "Starting upload...",
            Some(NotificationProgress::indeterminate()),
        );
    }

    /// Updates the progress bar.
    pub fn progress(&self, total: u64, uploaded: u64) {
        self.notifier.post(
            self.id,
            Self::TITLE,
            "Upload in progress",
            Some(NotificationProgress::determinate(total, uploaded)),
        );
    }

    /// Removes the progress notification after a successful upload.
    pub fn finished(&self) {
        self.notifier.cancel(self.id);
    }

    /// Removes the progress notification after cancellation.
    pub fn cancelled(&self) {
        debug!(id = self.id, "Upload has been cancelled");
        self.notifier.cancel(self.id);
    }

    /// Replaces the progress notification with a dismissable error.
    pub fn error(&self) {
        debug!(id = self.id, "An error has occurred while uploading");
        self.notifier.cancel(self.id);
        self.notifier
            .post(self.id.wrapping_add(1), Self::TITLE, "Error while uploading", None);
    }
}

impl std::fmt::Debug for UploadNotifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadNotifications")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;

    #[test]
    fn test_noop_and_logging_do_not_panic() {
        NoOpNotifier.post(1, "t", "x", None);
        NoOpNotifier.cancel(1);

        let logging = LoggingNotifier;
        logging.post(1, "Upload", "text", Some(NotificationProgress::determinate(10, 5)));
        logging.cancel(1);
    }

    #[test]
    fn test_error_replaces_progress_notification() {
        let mut mock = MockNotifier::new();
        let mut seq = Sequence::new();
        mock.expect_cancel()
            .with(eq(7))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_post()
            .with(eq(8), eq("Upload"), eq("Error while uploading"), eq(None::<NotificationProgress>))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        UploadNotifications::new(Arc::new(mock), 7).error();
    }

    #[test]
    fn test_started_is_indeterminate() {
        let mut mock = MockNotifier::new();
        mock.expect_post()
            .with(
                eq(3),
                always(),
                eq("Starting upload..."),
                eq(Some(NotificationProgress::indeterminate())),
            )
            .times(1)
            .return_const(());

        UploadNotifications::new(Arc::new(mock), 3).started();
    }

    #[test]
    fn test_cancelled_and_finished_clear() {
        let mut mock = MockNotifier::new();
        mock.expect_cancel().with(eq(4)).times(2).return_const(());

        let notifications = UploadNotifications::new(Arc::new(mock), 4);
        notifications.cancelled();
        notifications.finished();
    }
}
