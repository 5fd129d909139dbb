//! Progress and chain status snapshots.

use super::ChainState;
use crate::context::WorkData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transient progress of a byte-oriented stage.
///
/// Progress events drive indicators only; they are never persisted and are
/// not part of the chain status stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage emitting the event.
    pub stage: String,
    /// Total bytes to process.
    pub bytes_total: u64,
    /// Bytes processed so far.
    pub bytes_done: u64,
}

impl ProgressEvent {
    /// Creates a new progress event.
    #[must_use]
    pub fn new(stage: impl Into<String>, bytes_total: u64, bytes_done: u64) -> Self {
        Self {
            stage: stage.into(),
            bytes_total,
            bytes_done,
        }
    }

    /// Completion percentage in `0..=100`. An empty payload counts as done.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 100;
        }
        let done = self.bytes_done.min(self.bytes_total);
        u8::try_from(done * 100 / self.bytes_total).unwrap_or(100)
    }
}

/// The latest known status of a named chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    /// Unique chain name.
    pub chain_name: String,
    /// Identifier of the chain instance.
    pub run_id: Uuid,
    /// Lifecycle state.
    #[serde(flatten)]
    pub state: ChainState,
    /// Data produced by the last completed stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkData>,
    /// Failure or cancellation message for terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl ChainStatus {
    /// Creates a status snapshot stamped with the current time.
    #[must_use]
    pub fn new(chain_name: impl Into<String>, run_id: Uuid, state: ChainState) -> Self {
        Self {
            chain_name: chain_name.into(),
            run_id,
            state,
            output: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Attaches the data produced so far.
    #[must_use]
    pub fn with_output(mut self, output: Option<WorkData>) -> Self {
        self.output = output;
        self
    }

    /// Attaches an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if the chain instance has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
