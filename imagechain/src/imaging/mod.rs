//! Image decoding, orientation correction, scaling and JPEG re-encoding.
//!
//! Everything here is synchronous and CPU bound; callers run it on the
//! blocking pool.

mod orientation;

pub use orientation::Orientation;

use crate::errors::ChainError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Computes the size of an image whose longer side must not exceed
/// `max_dimension`.
///
/// Images already within bounds keep their size. Otherwise the longer side
/// becomes `max_dimension` and the shorter side is scaled down, rounding
/// towards zero and never below one pixel.
#[must_use]
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension || longer == 0 {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(max_dimension) / u64::from(longer);
        u32::try_from(scaled).unwrap_or(max_dimension).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Settings for one optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Longest allowed side in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            jpeg_quality: 50,
        }
    }
}

/// What an optimization produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    /// Written JPEG file.
    pub path: PathBuf,
    /// Stored dimensions of the source.
    pub source_dimensions: (u32, u32),
    /// Dimensions of the written image.
    pub dimensions: (u32, u32),
    /// Orientation that was corrected.
    pub orientation: Orientation,
    /// Size of the written file in bytes.
    pub bytes: u64,
}

/// Decodes `source`, corrects its orientation, scales it and writes a JPEG
/// to `destination`.
///
/// The bounds are read before the full decode so the size decision does not
/// depend on the pixel data. The destination is synced to disk before this
/// returns; on failure no partial file is left behind.
///
/// # Errors
///
/// [`ChainError::Io`] for file system failures and [`ChainError::Decode`]
/// for unsupported or corrupt images.
pub fn optimize_file(
    source: &Path,
    destination: &Path,
    options: OptimizeOptions,
) -> Result<OptimizedImage, ChainError> {
    let source_dimensions = ImageReader::open(source)?
        .with_guessed_format()?
        .into_dimensions()?;
    let orientation = Orientation::from_path(source);
    let (logical_w, logical_h) =
        orientation.logical_dimensions(source_dimensions.0, source_dimensions.1);
    let (target_w, target_h) = target_dimensions(logical_w, logical_h, options.max_dimension);

    debug!(
        source = %source.display(),
        width = source_dimensions.0,
        height = source_dimensions.1,
        ?orientation,
        target_w,
        target_h,
        "Decoding image"
    );

    let decoded = ImageReader::open(source)?.with_guessed_format()?.decode()?;
    let upright = orientation.correct(decoded);
    let scaled = if (upright.width(), upright.height()) == (target_w, target_h) {
        upright
    } else {
        upright.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    if let Err(err) = write_jpeg(&scaled.to_rgb8(), destination, options.jpeg_quality) {
        let _ = fs::remove_file(destination);
        return Err(err);
    }

    let bytes = fs::metadata(destination)?.len();
    Ok(OptimizedImage {
        path: destination.to_path_buf(),
        source_dimensions,
        dimensions: (scaled.width(), scaled.height()),
        orientation,
        bytes,
    })
}

fn write_jpeg(img: &image::RgbImage, destination: &Path, quality: u8) -> Result<(), ChainError> {
    let file = File::create(destination)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(img)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|err| err.into_error())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_test_image, write_test_jpeg_with_orientation};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_small_images_keep_size() {
        assert_eq!(target_dimensions(1000, 1500, 2000), (1000, 1500));
        assert_eq!(target_dimensions(2000, 2000, 2000), (2000, 2000));
        assert_eq!(target_dimensions(1, 1, 2000), (1, 1));
    }

    #[test]
    fn test_large_images_scale_longer_side() {
        assert_eq!(target_dimensions(4000, 3000, 2000), (2000, 1500));
        assert_eq!(target_dimensions(3000, 4000, 2000), (1500, 2000));
        assert_eq!(target_dimensions(4001, 4001, 2000), (2000, 2000));
        assert_eq!(target_dimensions(6000, 1999, 2000), (2000, 666));
    }

    #[test]
    fn test_extreme_aspect_never_zero() {
        assert_eq!(target_dimensions(100_000, 1, 2000), (2000, 1));
        assert_eq!(target_dimensions(1, 100_000, 2000), (1, 2000));
    }

    #[test]
    fn test_aspect_preserved_within_rounding() {
        for (w, h) in [(2001, 1000), (4096, 2731), (2500, 7000), (12_345, 6789)] {
            let (tw, th) = target_dimensions(w, h, 2000);
            assert_eq!(tw.max(th), 2000);
            let source = f64::from(w) / f64::from(h);
            let target = f64::from(tw) / f64::from(th);
            let tolerance = source / f64::from(tw.min(th));
            assert!((source - target).abs() <= tolerance, "{w}x{h} -> {tw}x{th}");
        }
    }

    #[test]
    fn test_optimize_file_scales_and_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_image(dir.path(), 300, 120);
        let destination = dir.path().join("out.jpg");

        let result = optimize_file(
            &source,
            &destination,
            OptimizeOptions {
                max_dimension: 100,
                jpeg_quality: 50,
            },
        )
        .unwrap();

        assert_eq!(result.source_dimensions, (300, 120));
        assert_eq!(result.dimensions, (100, 40));
        assert!(result.bytes > 0);

        let written = ImageReader::open(&destination)
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(written.format(), Some(image::ImageFormat::Jpeg));
        assert_eq!(written.into_dimensions().unwrap(), (100, 40));
    }

    #[test]
    fn test_optimize_file_applies_exif_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_test_jpeg_with_orientation(dir.path(), 300, 100, 6);
        let destination = dir.path().join("upright.jpg");

        let result = optimize_file(
            &source,
            &destination,
            OptimizeOptions {
                max_dimension: 200,
                jpeg_quality: 50,
            },
        )
        .unwrap();

        assert_eq!(result.orientation, Orientation::CW90);
        assert_eq!(result.source_dimensions, (300, 100));
        assert_eq!(result.dimensions, (66, 200));
        assert_eq!(
            ImageReader::open(&destination).unwrap().into_dimensions().unwrap(),
            (66, 200)
        );
    }

    #[test]
    fn test_optimize_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("garbage.png");
        fs::write(&source, b"definitely not an image").unwrap();
        let destination = dir.path().join("out.jpg");

        let err = optimize_file(&source, &destination, OptimizeOptions::default()).unwrap_err();

        assert!(matches!(err, ChainError::Decode(_)), "{err:?}");
        assert!(!destination.exists());
    }

    #[test]
    fn test_optimize_file_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = optimize_file(
            &dir.path().join("missing.png"),
            &dir.path().join("out.jpg"),
            OptimizeOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, ChainError::Io(_)));
        assert!(!err.is_retryable());
    }
}
