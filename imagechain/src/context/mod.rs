//! Data and context flowing through a chain.
//!
//! This module provides:
//! - Image references, the locators each stage consumes and produces
//! - Immutable work data bags carried between stages
//! - The per-stage execution context

mod data;
mod execution;
mod image_ref;

pub use data::{WorkData, WorkDataBuilder, KEY_IMAGE_URI};
pub use execution::StageContext;
pub use image_ref::ImageRef;
