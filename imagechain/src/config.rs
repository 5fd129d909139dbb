//! Configuration for the image chain.

use crate::errors::ChainError;
use crate::pipeline::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Longest accepted upload request timeout.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings shared by the stages, the queue and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Application-private data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Subdirectory of `data_dir` holding generated images.
    #[serde(default = "default_output_subpath")]
    pub output_subpath: String,
    /// Upload endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Longest allowed side of an optimized image, in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// JPEG quality, 1 to 100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Upload chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of progress steps reported over a whole upload.
    #[serde(default = "default_progress_buckets")]
    pub progress_buckets: u64,
    /// Upload request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
    /// How often waiting code rechecks for cancellation, in milliseconds.
    #[serde(default = "default_cancel_poll_interval")]
    pub cancel_poll_interval_ms: u64,
    /// Retry policy for retryable stage failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_subpath() -> String {
    "image_outputs".to_string()
}

fn default_endpoint() -> String {
    "https://localhost/upload".to_string()
}

fn default_max_dimension() -> u32 {
    2000
}

fn default_jpeg_quality() -> u8 {
    50
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_progress_buckets() -> u64 {
    20
}

fn default_request_timeout() -> f64 {
    30.0
}

fn default_cancel_poll_interval() -> u64 {
    500
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_subpath: default_output_subpath(),
            endpoint: default_endpoint(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            chunk_size: default_chunk_size(),
            progress_buckets: default_progress_buckets(),
            request_timeout_seconds: default_request_timeout(),
            cancel_poll_interval_ms: default_cancel_poll_interval(),
            retry: RetryConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the upload endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the upload chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Directory that receives optimized images.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join(&self.output_subpath)
    }

    /// Upload request timeout, clamped to [`MAX_REQUEST_TIMEOUT`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_seconds.max(0.0))
            .map_or(MAX_REQUEST_TIMEOUT, |timeout| timeout.min(MAX_REQUEST_TIMEOUT))
    }

    /// Cancellation poll interval.
    #[must_use]
    pub fn cancel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_interval_ms)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.output_subpath.trim().is_empty() {
            return Err(ChainError::Config("output_subpath must not be empty".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ChainError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_dimension == 0 {
            return Err(ChainError::Config("max_dimension must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(ChainError::Config("chunk_size must be positive".into()));
        }
        if self.progress_buckets == 0 {
            return Err(ChainError::Config("progress_buckets must be positive".into()));
        }
        if self.cancel_poll_interval_ms == 0 || self.cancel_poll_interval_ms > 1000 {
            return Err(ChainError::Config(format!(
                "cancel_poll_interval_ms must be within 1..=1000, got {}",
                self.cancel_poll_interval_ms
            )));
        }
        match Duration::try_from_secs_f64(self.request_timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() && timeout <= MAX_REQUEST_TIMEOUT => {}
            _ => {
                return Err(ChainError::Config(format!(
                    "request_timeout_seconds must be within (0, {}], got {}",
                    MAX_REQUEST_TIMEOUT.as_secs(),
                    self.request_timeout_seconds
                )))
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(ChainError::Config("retry.max_attempts must be at least 1".into()));
        }
        validate_endpoint(&self.endpoint)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ChainError> {
    let url = Url::parse(endpoint)
        .map_err(|err| ChainError::Config(format!("endpoint '{endpoint}' is not a URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ChainError::Config(format!(
            "endpoint scheme must be http or https, got '{}'",
            url.scheme()
        )));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ChainError::Config(format!("endpoint '{endpoint}' has no host"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.max_dimension, 2000);
        assert_eq!(config.jpeg_quality, 50);
        assert_eq!(config.output_dir(), PathBuf::from("data").join("image_outputs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = ChainConfig::default();
        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = ChainConfig::default();
        config.cancel_poll_interval_ms = 1500;
        assert!(config.validate().is_err());

        let config = ChainConfig::default().with_chunk_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(ChainConfig::default().with_endpoint("ftp://host/x").validate().is_err());
        assert!(ChainConfig::default().with_endpoint("localhost").validate().is_err());
        assert!(ChainConfig::default().with_endpoint("http://").validate().is_err());
        assert!(ChainConfig::default()
            .with_endpoint("http://127.0.0.1:8080/upload")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_rejects_malformed_endpoint() {
        for endpoint in ["http://exa mple.com/up", "http://:80/up", "https://host:notaport/x"] {
            let result = ChainConfig::default().with_endpoint(endpoint).validate();
            assert!(
                matches!(result, Err(ChainError::Config(_))),
                "{endpoint} should be rejected"
            );
        }
    }

    #[test]
    fn test_oversized_timeout_is_rejected() {
        let mut config = ChainConfig::default();
        config.request_timeout_seconds = 1e30;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
        assert_eq!(config.request_timeout(), MAX_REQUEST_TIMEOUT);

        config.request_timeout_seconds = f64::NAN;
        assert!(config.validate().is_err());
        assert_eq!(config.request_timeout(), Duration::ZERO);

        config.request_timeout_seconds = 0.0;
        assert!(config.validate().is_err());

        config.request_timeout_seconds = 2.5;
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"endpoint": "http://example.com/up", "jpeg_quality": 80, "retry": {{"max_attempts": 1}}}}"#
        )
        .unwrap();

        let config = ChainConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.endpoint, "http://example.com/up");
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.chunk_size, 64 * 1024);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"jpeg_quality": 101}}"#).unwrap();

        assert!(matches!(
            ChainConfig::from_json_file(file.path()),
            Err(ChainError::Config(_))
        ));
    }
}
