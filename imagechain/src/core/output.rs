//! Stage output type with factory methods.

use super::StageStatus;
use crate::context::WorkData;
use crate::errors::ChainError;
use serde::{Deserialize, Serialize};

/// The output of a stage execution.
///
/// `StageOutput` is immutable once created. A successful output without data
/// forwards the stage's input unchanged to the next stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// The output data (for successful executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WorkData>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Cancel reason (for cancelled executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    /// Whether the failure is transient.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl Default for StageOutput {
    fn default() -> Self {
        Self::ok_empty()
    }
}

impl StageOutput {
    /// Creates a successful output with data.
    #[must_use]
    pub fn ok(data: WorkData) -> Self {
        Self {
            status: StageStatus::Ok,
            data: Some(data),
            error: None,
            cancel_reason: None,
            retryable: false,
        }
    }

    /// Creates a successful output with no data.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            status: StageStatus::Ok,
            data: None,
            error: None,
            cancel_reason: None,
            retryable: false,
        }
    }

    /// Creates a cancel output with a reason.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Cancel,
            data: None,
            error: None,
            cancel_reason: Some(reason.into()),
            retryable: false,
        }
    }

    /// Creates a permanent failure output.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            data: None,
            error: Some(error.into()),
            cancel_reason: None,
            retryable: false,
        }
    }

    /// Creates a retryable failure output.
    #[must_use]
    pub fn fail_retryable(error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::fail(error)
        }
    }

    /// Maps an error onto the matching output.
    #[must_use]
    pub fn from_error(err: &ChainError) -> Self {
        if err.is_cancellation() {
            Self::cancel(err.to_string())
        } else if err.is_retryable() {
            Self::fail_retryable(err.to_string())
        } else {
            Self::fail(err.to_string())
        }
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output indicates failure or cancellation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns true if the output can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<Result<WorkData, ChainError>> for StageOutput {
    fn from(result: Result<WorkData, ChainError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::from_error(&err),
        }
    }
}
