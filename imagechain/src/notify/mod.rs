//! Side channels for user-facing feedback.
//!
//! Notifications and progress observers report what a chain is doing. Both
//! are fire-and-forget: a chain behaves identically with the no-op variants.

mod notifier;
mod progress;

pub use notifier::{
    LoggingNotifier, NoOpNotifier, NotificationProgress, Notifier, UploadNotifications,
};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use progress::{
    BroadcastProgressObserver, LoggingProgressObserver, NoOpProgressObserver, ProgressObserver,
};
