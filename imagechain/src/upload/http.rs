//! HTTP upload transport backed by `reqwest`.

use super::{UploadBody, UploadResponse, Uploader};
use crate::config::ChainConfig;
use crate::errors::ChainError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Posts payloads to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpUploader {
    /// Creates an uploader for an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] if the endpoint is not a URL or the
    /// client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ChainError> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            ChainError::Config(format!("endpoint '{endpoint}' is not a URL: {err}"))
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// Creates an uploader from the chain configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] if the endpoint is not a URL or the
    /// client cannot be built.
    pub fn from_config(config: &ChainConfig) -> Result<Self, ChainError> {
        Self::new(&config.endpoint, config.request_timeout())
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, body: UploadBody) -> Result<UploadResponse, ChainError> {
        debug!(
            endpoint = %self.endpoint,
            content_length = body.content_length,
            "Sending upload request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, body.content_type)
            .header(CONTENT_LENGTH, body.content_length)
            .body(reqwest::Body::wrap_stream(body.stream))
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(endpoint = %self.endpoint, status, "Upload response received");

        Ok(UploadResponse::new(status, text))
    }
}
