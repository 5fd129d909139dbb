//! Upload transport.
//!
//! The upload stage streams file bytes into an [`Uploader`]. The transport
//! only moves bytes and reports the response; deciding what a status code
//! means is left to the stage.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpUploader;

use crate::errors::ChainError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Content type of optimized images.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// A streamed request body.
pub struct UploadBody {
    /// Chunks of the payload; an `Err` item aborts the request.
    pub stream: BoxStream<'static, std::io::Result<Bytes>>,
    /// Exact payload length in bytes.
    pub content_length: u64,
    /// MIME type of the payload.
    pub content_type: String,
}

impl UploadBody {
    /// Creates a body.
    #[must_use]
    pub fn new(
        stream: BoxStream<'static, std::io::Result<Bytes>>,
        content_length: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            content_length,
            content_type: content_type.into(),
        }
    }
}

impl std::fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBody")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// The server's answer to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl UploadResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx response into an error; the body of a 2xx
    /// response is the server's token.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Upload`] for non-2xx statuses.
    pub fn into_token(self) -> Result<String, ChainError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ChainError::Upload {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Sends one payload to the upload endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Sends the body as a single request and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Http`] or [`ChainError::Io`] when no response
    /// was received.
    async fn upload(&self, body: UploadBody) -> Result<UploadResponse, ChainError>;
}
