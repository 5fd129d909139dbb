//! Core domain model types for imagechain.
//!
//! This module contains the fundamental types shared by stages, the chain
//! runner and the task queue:
//! - Stage status and chain lifecycle state
//! - Stage output type with factory methods
//! - Progress events and chain status snapshots

mod event;
mod output;
mod status;

pub use event::{ChainStatus, ProgressEvent};
pub use output::StageOutput;
pub use status::{ChainState, StageStatus};
