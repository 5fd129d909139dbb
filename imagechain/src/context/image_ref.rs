//! Opaque image locators.

use crate::errors::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// A locator for image bytes.
///
/// Either a plain filesystem path or a percent-encoded `file://` URI. Each stage consumes one
/// reference and forwards a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wraps a raw locator string without validation.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a `file://` reference for an absolute path.
    ///
    /// Relative paths cannot be expressed as file URIs and are kept as
    /// plain paths.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Url::from_file_path(path) {
            Ok(url) => Self(url.into()),
            Err(()) => Self(path.display().to_string()),
        }
    }

    /// Returns the raw locator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the locator is empty or whitespace-only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Resolves the locator to a local path.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InputInvalid`] for empty references and for
    /// URIs with a scheme other than `file`.
    pub fn to_path(&self) -> Result<PathBuf, ChainError> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return Err(ChainError::InputInvalid("image reference is empty".to_string()));
        }

        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|()| {
                    ChainError::InputInvalid(format!("'{raw}' is not a local file URI"))
                })?;
                if path.file_name().is_none() {
                    return Err(ChainError::InputInvalid(format!("'{raw}' has no file name")));
                }
                Ok(path)
            }
            // Single letters are Windows drive prefixes, not schemes.
            Ok(url) if url.scheme().len() > 1 => Err(ChainError::InputInvalid(format!(
                "unsupported scheme '{}' in '{raw}'",
                url.scheme()
            ))),
            _ => Ok(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
