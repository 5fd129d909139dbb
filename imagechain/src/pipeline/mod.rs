//! Chain building and execution.
//!
//! This module provides:
//! - Stage specifications
//! - A chain builder with validation
//! - The sequential chain runner
//! - Retry policy for transient failures

mod builder;
mod chain;
mod retry;
mod runner;
mod spec;

pub use builder::ChainBuilder;
pub use chain::Chain;
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig};
pub use runner::{ChainRunner, CollectingStatusSink, NoOpStatusSink, StatusSink};
pub use spec::StageSpec;
