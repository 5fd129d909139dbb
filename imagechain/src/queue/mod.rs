//! Task queue abstraction.
//!
//! A queue accepts chains under a unique name, runs them in the background
//! and reports their status. What happens to an instance already holding
//! the name is decided by [`ExistingChainPolicy`].

mod handle;
mod memory;

pub use handle::{ChainHandle, StatusStream};
pub use memory::InMemoryTaskQueue;

use crate::context::WorkData;
use crate::errors::ChainError;
use crate::pipeline::Chain;
use serde::{Deserialize, Serialize};

/// What to do when a chain with the same name is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingChainPolicy {
    /// Cancel the running instance and start the new one.
    #[default]
    Replace,
    /// Leave the running instance alone and drop the new submission.
    Keep,
}

/// Schedules chains by unique name.
pub trait TaskQueue: Send + Sync {
    /// Enqueues a chain under its name with the given initial input.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot schedule work.
    fn enqueue(
        &self,
        chain: Chain,
        input: WorkData,
        policy: ExistingChainPolicy,
    ) -> Result<ChainHandle, ChainError>;

    /// Observes the latest status of a chain name, whether or not anything
    /// was enqueued under it yet.
    fn observe(&self, name: &str) -> StatusStream;

    /// Cancels the running instance of a chain name.
    ///
    /// Returns false if nothing was running.
    fn cancel(&self, name: &str) -> bool;
}
