//! Stage status and chain state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result status of a single stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Fail,
    /// Stage observed cancellation and stopped.
    Cancel,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns true if the status ends the chain.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel)
    }
}

/// The lifecycle state of one chain instance.
///
/// `Enqueued -> Running(0) -> Running(1) -> ... -> Succeeded | Failed | Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainState {
    /// Accepted by the queue, no stage started yet.
    Enqueued,
    /// A stage is executing.
    Running {
        /// Zero-based position of the stage in the chain.
        stage_index: usize,
        /// Stage name.
        stage: String,
    },
    /// Every stage reported success.
    Succeeded,
    /// A stage failed and retries, if any, were exhausted.
    Failed,
    /// The chain was cancelled before finishing.
    Cancelled,
}

impl ChainState {
    /// Returns true for `Succeeded`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueued => write!(f, "enqueued"),
            Self::Running { stage_index, stage } => write!(f, "running({stage_index}: {stage})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Ok.to_string(), "ok");
        assert_eq!(StageStatus::Fail.to_string(), "fail");
        assert_eq!(StageStatus::Cancel.to_string(), "cancel");
    }

    #[test]
    fn test_stage_status_classes() {
        assert!(StageStatus::Ok.is_success());
        assert!(StageStatus::Cancel.is_failure());
        assert!(!StageStatus::Ok.is_failure());
    }

    #[test]
    fn test_chain_state_terminal() {
        assert!(!ChainState::Enqueued.is_terminal());
        assert!(!ChainState::Running { stage_index: 0, stage: "optimize".into() }.is_terminal());
        assert!(ChainState::Succeeded.is_terminal());
        assert!(ChainState::Failed.is_terminal());
        assert!(ChainState::Cancelled.is_terminal());
    }

    #[test]
    fn test_chain_state_serialize() {
        let state = ChainState::Running { stage_index: 1, stage: "upload".into() };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "state": "running", "stage_index": 1, "stage": "upload" })
        );
        assert_eq!(state.to_string(), "running(1: upload)");
    }
}
