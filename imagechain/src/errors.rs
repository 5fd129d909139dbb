//! Error types for imagechain.
//!
//! Every failure a stage can hit is mapped onto [`ChainError`], which also
//! decides whether the queue's retry policy may run the stage again.

use std::io::ErrorKind;
use thiserror::Error;

/// The main error type for imagechain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The stage input was empty or malformed.
    #[error("Invalid input: {0}")]
    InputInvalid(String),

    /// The source image could not be decoded or encoded.
    #[error("Image decode error: {0}")]
    Decode(String),

    /// Disk or stream I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP transport failed before a response was received.
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// The upload endpoint answered with a non-success status.
    #[error("Upload rejected with status {status}: {body}")]
    Upload {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// A newer submission under the same name replaced this run.
    #[error("Chain '{chain}' was superseded by a newer submission")]
    Superseded {
        /// The unique chain name.
        chain: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A chain definition failed validation.
    #[error("{0}")]
    Validation(#[from] ChainValidationError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Returns true if a later attempt could plausibly succeed.
    ///
    /// Malformed input and corrupt images never recover; transient disk and
    /// network failures, 5xx and 429 responses may.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(err) => !matches!(
                err.kind(),
                ErrorKind::NotFound
                    | ErrorKind::PermissionDenied
                    | ErrorKind::InvalidInput
                    | ErrorKind::InvalidData
                    | ErrorKind::Unsupported
            ),
            Self::Http(_) => true,
            Self::Upload { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error ends a run the way a cancellation does.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

impl From<image::ImageError> for ChainError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => Self::Io(io),
            other => Self::Decode(other.to_string()),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        // Builder errors come from bad URLs or headers and never recover.
        if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Error raised when a chain definition is rejected.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ChainValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl ChainValidationError {
    /// Creates a new chain validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}
