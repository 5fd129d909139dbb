//! Validated chain definitions.

use super::StageSpec;
use crate::notify::ProgressObserver;
use std::sync::Arc;

/// An ordered, uniquely named list of stages.
///
/// Built by [`super::ChainBuilder`]. A chain is a definition only; every
/// enqueue creates a new instance with its own run id.
#[derive(Clone)]
pub struct Chain {
    name: String,
    stages: Vec<StageSpec>,
    progress: Arc<dyn ProgressObserver>,
}

impl Chain {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageSpec>,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            name,
            stages,
            progress,
        }
    }

    /// Returns the unique chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the progress observer shared by all stages.
    #[must_use]
    pub fn progress_observer(&self) -> &Arc<dyn ProgressObserver> {
        &self.progress
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}
