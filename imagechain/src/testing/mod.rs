//! Testing utilities for image chains.
//!
//! This module provides:
//! - Mock stages, uploaders and notifiers
//! - Sample image fixtures
//! - Assertions for stage outputs and chain statuses

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_chain_output, assert_chain_state, assert_output_cancelled, assert_output_failed,
    assert_output_image, assert_output_succeeded,
};
pub use fixtures::{write_test_image, write_test_jpeg, write_test_jpeg_with_orientation};
pub use mocks::{
    CollectingNotifier, FailingStage, MockStage, PostedNotification, RecordingUploader, SlowStage,
};
