//! Test assertions for stage outputs and chain statuses.

use crate::context::ImageRef;
use crate::core::{ChainState, ChainStatus, StageOutput, StageStatus};

/// Asserts that the output indicates success.
pub fn assert_output_succeeded(output: &StageOutput) {
    assert!(
        output.is_success(),
        "Expected success, got status: {:?} ({:?})",
        output.status,
        output.error
    );
}

/// Asserts that the output indicates failure.
pub fn assert_output_failed(output: &StageOutput) {
    assert_eq!(
        output.status,
        StageStatus::Fail,
        "Expected failure, got status: {:?}",
        output.status
    );
}

/// Asserts that the output indicates cancellation.
pub fn assert_output_cancelled(output: &StageOutput) {
    assert_eq!(
        output.status,
        StageStatus::Cancel,
        "Expected cancellation, got status: {:?}",
        output.status
    );
}

/// Asserts that the output carries the expected image reference.
pub fn assert_output_image(output: &StageOutput, expected: &str) {
    let actual = output.data.as_ref().and_then(|data| data.image());
    assert_eq!(
        actual,
        Some(ImageRef::new(expected)),
        "Expected output image '{expected}', got {actual:?}"
    );
}

/// Asserts that a chain status is in the expected state.
pub fn assert_chain_state(status: &ChainStatus, expected: &ChainState) {
    assert_eq!(
        &status.state, expected,
        "Expected chain '{}' to be {expected}, got {} (error: {:?})",
        status.chain_name, status.state, status.error
    );
}

/// Asserts that a succeeded chain produced the expected image reference.
pub fn assert_chain_output(status: &ChainStatus, expected: &str) {
    assert_chain_state(status, &ChainState::Succeeded);
    let actual = status.output.as_ref().and_then(|data| data.image());
    assert_eq!(
        actual,
        Some(ImageRef::new(expected)),
        "Expected chain output '{expected}', got {actual:?}"
    );
}
