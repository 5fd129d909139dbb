//! Test fixtures: sample images and scratch directories.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

/// EXIF tag holding the image orientation.
const ORIENTATION_TAG: u16 = 0x0112;
/// TIFF field type for an unsigned 16-bit value.
const TIFF_SHORT: u16 = 3;

/// Writes a `width` x `height` gradient PNG into `dir` and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
    let path = dir.join(format!("source-{width}x{height}.png"));
    gradient(width, height)
        .save(&path)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
    path
}

/// Writes a `width` x `height` gradient JPEG into `dir` and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn write_test_jpeg(dir: &Path, width: u32, height: u32) -> PathBuf {
    let path = dir.join(format!("source-{width}x{height}.jpg"));
    gradient(width, height)
        .save(&path)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
    path
}

/// Writes a `width` x `height` gradient JPEG carrying an EXIF orientation
/// tag and returns its path.
///
/// `width` and `height` are the stored dimensions; `orientation` is the raw
/// EXIF value, 1 to 8.
///
/// # Panics
///
/// Panics if the image cannot be encoded or written.
#[must_use]
pub fn write_test_jpeg_with_orientation(
    dir: &Path,
    width: u32,
    height: u32,
    orientation: u16,
) -> PathBuf {
    let path = dir.join(format!("source-{width}x{height}-o{orientation}.jpg"));

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 90)
        .encode_image(&gradient(width, height))
        .unwrap_or_else(|err| panic!("failed to encode {}: {err}", path.display()));

    // APP1 goes right after the SOI marker.
    let mut bytes = Vec::with_capacity(jpeg.len() + 64);
    bytes.extend_from_slice(&jpeg[..2]);
    bytes.extend_from_slice(&exif_segment(orientation));
    bytes.extend_from_slice(&jpeg[2..]);

    std::fs::write(&path, bytes)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
    path
}

/// Builds an APP1 segment with a big-endian TIFF block holding a single
/// orientation entry.
fn exif_segment(orientation: u16) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(b"MM");
    payload.extend_from_slice(&42u16.to_be_bytes());
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&ORIENTATION_TAG.to_be_bytes());
    payload.extend_from_slice(&TIFF_SHORT.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_be_bytes());

    let length = u16::try_from(payload.len() + 2).unwrap_or(u16::MAX);
    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(&payload);
    segment
}

#[allow(clippy::cast_possible_truncation)]
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}
