//! EXIF orientation handling.

use image::DynamicImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// How the stored pixels must be transformed for upright display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Stored upright.
    #[default]
    Normal,
    /// Mirrored left to right.
    MirroredHorizontal,
    /// Rotated 90 degrees clockwise.
    CW90,
    /// Mirrored top to bottom.
    MirroredVertical,
    /// Mirrored, then rotated 270 degrees clockwise.
    MirroredHorizontalAnd270CW,
    /// Mirrored, then rotated 90 degrees clockwise.
    MirroredHorizontalAnd90CW,
    /// Rotated 180 degrees.
    CW180,
    /// Rotated 270 degrees clockwise.
    CW270,
}

impl Orientation {
    /// Reads the orientation tag of an image file.
    ///
    /// Files without EXIF data, or with an unreadable tag, count as
    /// [`Orientation::Normal`].
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match read_orientation_tag(path) {
            Ok(Some(value)) => Self::from_exif(value),
            Ok(None) => Self::Normal,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "No usable EXIF orientation");
                Self::Normal
            }
        }
    }

    /// Maps an EXIF orientation value (1..=8) onto an orientation.
    #[must_use]
    pub const fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::CW180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalAnd270CW,
            6 => Self::CW90,
            7 => Self::MirroredHorizontalAnd90CW,
            8 => Self::CW270,
            _ => Self::Normal,
        }
    }

    /// Returns true if the correction swaps width and height.
    #[must_use]
    pub const fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::CW90
                | Self::CW270
                | Self::MirroredHorizontalAnd90CW
                | Self::MirroredHorizontalAnd270CW
        )
    }

    /// Dimensions of the image once displayed upright.
    #[must_use]
    pub const fn logical_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Transforms stored pixels into their upright form.
    #[must_use]
    pub fn correct(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::CW180 => img.rotate180(),
            Self::CW270 => img.rotate270(),
            Self::CW90 => img.rotate90(),
            Self::MirroredHorizontal => img.fliph(),
            Self::MirroredVertical => img.flipv(),
            Self::MirroredHorizontalAnd90CW => img.fliph().rotate90(),
            Self::MirroredHorizontalAnd270CW => img.fliph().rotate270(),
        }
    }
}

fn read_orientation_tag(path: &Path) -> Result<Option<u32>, exif::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;

    Ok(exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0)))
}
