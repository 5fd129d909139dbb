//! Immutable key-value bags passed between stages.

use super::ImageRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The one key stages recognize.
pub const KEY_IMAGE_URI: &str = "image_uri";

/// Input or output of a stage.
///
/// A `WorkData` cannot be modified once built; use [`WorkData::builder`] or
/// [`WorkData::with_image`] to create a new one. Keys other than
/// [`KEY_IMAGE_URI`] are carried along but ignored by the built-in stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkData {
    values: BTreeMap<String, String>,
}

impl WorkData {
    /// Returns an empty bag.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a bag holding only an image reference.
    #[must_use]
    pub fn with_image(image: &ImageRef) -> Self {
        Self::builder().put_image(image).build()
    }

    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> WorkDataBuilder {
        WorkDataBuilder::default()
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the image reference, if present.
    #[must_use]
    pub fn image(&self) -> Option<ImageRef> {
        self.get_string(KEY_IMAGE_URI).map(ImageRef::new)
    }

    /// Returns true if the bag has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Builder for [`WorkData`].
#[derive(Debug, Clone, Default)]
pub struct WorkDataBuilder {
    values: BTreeMap<String, String>,
}

impl WorkDataBuilder {
    /// Puts a string value, replacing any earlier value for the key.
    #[must_use]
    pub fn put_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Puts the image reference.
    #[must_use]
    pub fn put_image(self, image: &ImageRef) -> Self {
        self.put_string(KEY_IMAGE_URI, image.as_str())
    }

    /// Copies every entry of `other` into the builder.
    #[must_use]
    pub fn put_all(mut self, other: &WorkData) -> Self {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Finishes the bag.
    #[must_use]
    pub fn build(self) -> WorkData {
        WorkData { values: self.values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_with_image() {
        let data = WorkData::with_image(&ImageRef::new("/a.png"));
        assert_eq!(data.image(), Some(ImageRef::new("/a.png")));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_builder_keeps_unknown_keys() {
        let base = WorkData::builder().put_string("trace", "abc").build();
        let data = WorkData::builder()
            .put_all(&base)
            .put_image(&ImageRef::new("/b.png"))
            .build();

        assert_eq!(data.get_string("trace"), Some("abc"));
        assert_eq!(data.get_string(KEY_IMAGE_URI), Some("/b.png"));
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let data = WorkData::with_image(&ImageRef::new("OK"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json, serde_json::json!({ "image_uri": "OK" }));

        let back: WorkData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_empty() {
        assert!(WorkData::empty().is_empty());
        assert!(WorkData::empty().image().is_none());
    }
}
