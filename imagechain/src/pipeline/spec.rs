//! Stage specifications.

use crate::stages::Stage;
use std::sync::Arc;

/// A named stage within a chain.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage within its chain.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
        }
    }

    /// Creates a specification named after the stage itself.
    #[must_use]
    pub fn from_stage(runner: Arc<dyn Stage>) -> Self {
        let name = runner.name().to_string();
        Self { name, runner }
    }
}
