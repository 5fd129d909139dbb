//! # Imagechain
//!
//! Chained background stages that optimize an image, upload it and clean up
//! the generated files.
//!
//! A chain is an ordered list of stages submitted under a unique name. Each
//! stage receives the previous stage's output as its input, and the chain
//! ends as soon as a stage fails or is cancelled. Submitting a chain under a
//! name that is still running replaces the running instance.
//!
//! - **Stages**: [`stages::OptimizeStage`], [`stages::UploadStage`] and
//!   [`stages::CleanupStage`], each usable on its own
//! - **Task queue**: [`queue::TaskQueue`] schedules chains by name, with an
//!   in-process [`queue::InMemoryTaskQueue`] that retries transient failures
//! - **Orchestrator**: [`orchestrator::UploadOrchestrator`] submits,
//!   observes and cancels the image upload chain
//! - **Side channels**: notifications and progress events that never affect
//!   a chain's result
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imagechain::prelude::*;
//! use std::sync::Arc;
//!
//! let config = ChainConfig::from_json_file("imagechain.json")?;
//! let uploader = Arc::new(HttpUploader::from_config(&config)?);
//! let orchestrator = UploadOrchestrator::in_memory(uploader, config)?;
//!
//! let handle = orchestrator.submit(&ImageRef::from_path("photo.jpg"))?;
//! let status = handle.wait().await?;
//! println!("{}: {:?}", status.state, status.output);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod imaging;
pub mod notify;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod queue;
pub mod stages;
pub mod testing;
pub mod upload;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::ChainConfig;
    pub use crate::context::{ImageRef, StageContext, WorkData, KEY_IMAGE_URI};
    pub use crate::core::{ChainState, ChainStatus, ProgressEvent, StageOutput, StageStatus};
    pub use crate::errors::{ChainError, ChainValidationError};
    pub use crate::notify::{LoggingNotifier, Notifier, ProgressObserver};
    pub use crate::orchestrator::{UploadOrchestrator, CHAIN_NAME};
    pub use crate::pipeline::{Chain, ChainBuilder, ChainRunner, RetryConfig};
    pub use crate::queue::{
        ChainHandle, ExistingChainPolicy, InMemoryTaskQueue, StatusStream, TaskQueue,
    };
    pub use crate::stages::{CleanupStage, OptimizeStage, Stage, UploadStage};
    #[cfg(feature = "http")]
    pub use crate::upload::HttpUploader;
    pub use crate::upload::Uploader;
}
