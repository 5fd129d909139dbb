//! Cleanup stage.

use super::Stage;
use crate::config::ChainConfig;
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::errors::ChainError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const GENERATED_EXTENSION: &str = ".jpg";

/// Deletes every generated `.jpg` in the output directory.
///
/// The input is ignored and the output carries no data, so the previous
/// stage's output reaches the end of the chain. Files that cannot be deleted
/// are logged and skipped; a missing directory is not an error.
#[derive(Debug, Clone)]
pub struct CleanupStage {
    output_dir: PathBuf,
}

impl CleanupStage {
    /// Stage name used in chains.
    pub const NAME: &'static str = "cleanup";

    /// Creates a stage cleaning `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Creates a stage from the chain configuration.
    #[must_use]
    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.output_dir())
    }

    /// Deletes generated files, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Io`] if an existing directory cannot be listed.
    pub async fn clean(&self) -> Result<usize, ChainError> {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.output_dir.display(), "Nothing to clean");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let mut deleted = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(GENERATED_EXTENSION) {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    deleted += 1;
                    info!(file = %name, "Deleted generated file");
                }
                Err(err) => warn!(file = %name, error = %err, "Could not delete generated file"),
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl Stage for CleanupStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        debug!(chain = %ctx.chain_name(), "Cleaning up temporary files");
        match self.clean().await {
            Ok(deleted) => {
                debug!(chain = %ctx.chain_name(), deleted, "Done cleaning");
                StageOutput::ok_empty()
            }
            Err(err) => {
                warn!(chain = %ctx.chain_name(), error = %err, "Error cleaning up");
                StageOutput::from_error(&err)
            }
        }
    }
}
