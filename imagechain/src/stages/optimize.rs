//! Image optimization stage.

use super::Stage;
use crate::config::ChainConfig;
use crate::context::{ImageRef, StageContext, WorkData};
use crate::core::StageOutput;
use crate::errors::ChainError;
use crate::imaging::{optimize_file, OptimizeOptions};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, error, info};
use uuid::Uuid;

/// File name prefix of optimized images.
pub const OPTIMIZED_FILE_PREFIX: &str = "image-optimize-output-";

/// Decodes the input image, scales it so its longer side fits the maximum
/// dimension, and writes it as a JPEG into the output directory.
///
/// Output: `image_uri` of the written file.
#[derive(Debug, Clone)]
pub struct OptimizeStage {
    output_dir: PathBuf,
    options: OptimizeOptions,
}

impl OptimizeStage {
    /// Stage name used in chains.
    pub const NAME: &'static str = "optimize";

    /// Creates a stage writing into `output_dir` with default options.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            options: OptimizeOptions::default(),
        }
    }

    /// Creates a stage from the chain configuration.
    #[must_use]
    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.output_dir()).with_options(OptimizeOptions {
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
        })
    }

    /// Sets the optimization options.
    #[must_use]
    pub fn with_options(mut self, options: OptimizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    async fn optimize(&self, ctx: &StageContext) -> Result<WorkData, ChainError> {
        let image = ctx
            .input()
            .image()
            .filter(|image| !image.is_empty())
            .ok_or_else(|| ChainError::InputInvalid("Invalid or empty image reference".into()))?;
        let source = image.to_path()?;

        info!(chain = %ctx.chain_name(), image = %image, "Optimizing image before uploading");

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let destination = self
            .output_dir
            .join(format!("{OPTIMIZED_FILE_PREFIX}{}.jpg", Uuid::new_v4()));

        let options = self.options;
        let optimized = tokio::task::spawn_blocking(move || {
            optimize_file(&source, &destination, options)
        })
        .await
        .map_err(|err| ChainError::Internal(format!("Optimize task failed: {err}")))??;

        debug!(
            width = optimized.dimensions.0,
            height = optimized.dimensions.1,
            bytes = optimized.bytes,
            "Image re-encoded"
        );

        let result = ImageRef::from_path(&optimized.path);
        info!(chain = %ctx.chain_name(), image = %result, "Image successfully optimized and saved");
        Ok(WorkData::with_image(&result))
    }
}

#[async_trait]
impl Stage for OptimizeStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        if ctx.is_cancelled() {
            return StageOutput::cancel(ctx.cancellation().reason().unwrap_or_default());
        }

        match self.optimize(ctx).await {
            Ok(data) => StageOutput::ok(data),
            Err(err) => {
                error!(chain = %ctx.chain_name(), error = %err, "Image optimization failed");
                StageOutput::from_error(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_test_image, write_test_jpeg_with_orientation};
    use image::ImageReader;

    fn ctx_for(image: &ImageRef) -> StageContext {
        StageContext::standalone(OptimizeStage::NAME, WorkData::with_image(image))
    }

    #[tokio::test]
    async fn test_writes_jpeg_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_image(dir.path(), 64, 32);
        let output_dir = dir.path().join("image_outputs");
        let stage = OptimizeStage::new(&output_dir);

        let output = stage.execute(&ctx_for(&ImageRef::from_path(&source))).await;

        assert!(output.is_success(), "{output:?}");
        let written = output.data.unwrap().image().unwrap().to_path().unwrap();
        assert_eq!(written.parent(), Some(output_dir.as_path()));
        let name = written.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(OPTIMIZED_FILE_PREFIX));
        assert!(name.ends_with(".jpg"));
        assert_eq!(
            ImageReader::open(&written).unwrap().into_dimensions().unwrap(),
            (64, 32)
        );
    }

    #[tokio::test]
    async fn test_plain_path_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_image(dir.path(), 8, 8);
        let stage = OptimizeStage::new(dir.path().join("out"));

        let output = stage
            .execute(&ctx_for(&ImageRef::new(source.to_string_lossy())))
            .await;

        assert!(output.is_success());
    }

    #[tokio::test]
    async fn test_large_image_scaled_down() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_image(dir.path(), 400, 100);
        let stage = OptimizeStage::new(dir.path().join("out")).with_options(OptimizeOptions {
            max_dimension: 200,
            jpeg_quality: 50,
        });

        let output = stage.execute(&ctx_for(&ImageRef::from_path(&source))).await;

        let written = output.data.unwrap().image().unwrap().to_path().unwrap();
        assert_eq!(
            ImageReader::open(&written).unwrap().into_dimensions().unwrap(),
            (200, 50)
        );
    }

    #[tokio::test]
    async fn test_rotated_photo_written_upright() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_jpeg_with_orientation(dir.path(), 3000, 1000, 6);
        let stage = OptimizeStage::new(dir.path().join("out"));

        let output = stage.execute(&ctx_for(&ImageRef::from_path(&source))).await;

        assert!(output.is_success(), "{output:?}");
        let written = output.data.unwrap().image().unwrap().to_path().unwrap();
        assert_eq!(
            ImageReader::open(&written).unwrap().into_dimensions().unwrap(),
            (666, 2000)
        );
    }

    #[tokio::test]
    async fn test_empty_reference_fails_permanently() {
        let dir = tempfile::tempdir().unwrap();
        let stage = OptimizeStage::new(dir.path());

        let missing_key = stage
            .execute(&StageContext::standalone("optimize", WorkData::empty()))
            .await;
        let empty = stage.execute(&ctx_for(&ImageRef::new(""))).await;

        for output in [missing_key, empty] {
            assert!(output.is_failure());
            assert!(!output.is_retryable());
        }
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_permanently() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.bin");
        std::fs::write(&source, b"this is not an image").unwrap();
        let stage = OptimizeStage::new(dir.path().join("out"));

        let output = stage.execute(&ctx_for(&ImageRef::from_path(&source))).await;

        assert!(output.is_failure());
        assert!(!output.is_retryable());
        let leftovers = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(&ImageRef::new("whatever.png"));
        ctx.cancellation().cancel("user");

        let output = OptimizeStage::new(dir.path()).execute(&ctx).await;

        assert_eq!(output.status, crate::core::StageStatus::Cancel);
    }
}
