//! Chain builder with validation.

use super::{Chain, StageSpec};
use crate::errors::ChainValidationError;
use crate::notify::{NoOpProgressObserver, ProgressObserver};
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated chains.
///
/// Stages run in the order they are added.
#[derive(Clone)]
pub struct ChainBuilder {
    /// The unique chain name.
    name: String,
    /// The stage specifications, in execution order.
    stages: Vec<StageSpec>,
    /// Names already taken.
    stage_names: HashSet<String>,
    /// Receives progress events of every stage.
    progress: Arc<dyn ProgressObserver>,
}

impl ChainBuilder {
    /// Creates a new chain builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            stage_names: HashSet::new(),
            progress: Arc::new(NoOpProgressObserver),
        }
    }

    /// Appends a stage under an explicit name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or already used.
    pub fn stage(
        mut self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
    ) -> Result<Self, ChainValidationError> {
        self.add_stage_spec(StageSpec::new(name, runner))?;
        Ok(self)
    }

    /// Appends a stage under its own name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or already used.
    pub fn then(mut self, runner: Arc<dyn Stage>) -> Result<Self, ChainValidationError> {
        self.add_stage_spec(StageSpec::from_stage(runner))?;
        Ok(self)
    }

    /// Appends a stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or already used.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), ChainValidationError> {
        if spec.name.trim().is_empty() {
            return Err(ChainValidationError::new(format!(
                "Stage names in chain '{}' cannot be empty",
                self.name
            )));
        }

        if !self.stage_names.insert(spec.name.clone()) {
            return Err(ChainValidationError::new(format!(
                "Stage '{}' appears twice in chain '{}'",
                spec.name, self.name
            ))
            .with_stages(vec![spec.name.clone()]));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Sets the observer that receives progress events.
    #[must_use]
    pub fn with_progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// Builds the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain name is blank or no stage was added.
    pub fn build(self) -> Result<Chain, ChainValidationError> {
        if self.name.trim().is_empty() {
            return Err(ChainValidationError::new(
                "Chain name cannot be empty or whitespace-only",
            ));
        }

        if self.stages.is_empty() {
            return Err(ChainValidationError::new(format!(
                "Chain '{}' has no stages",
                self.name
            )));
        }

        Ok(Chain::new(self.name, self.stages, self.progress))
    }

    /// Returns the chain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(NoOpStage::new(name))
    }

    #[test]
    fn test_builder_keeps_insertion_order() {
        let chain = ChainBuilder::new("image_upload_work")
            .then(noop("optimize"))
            .unwrap()
            .then(noop("upload"))
            .unwrap()
            .stage("cleanup", noop("anything"))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(chain.name(), "image_upload_work");
        assert_eq!(chain.stage_names(), vec!["optimize", "upload", "cleanup"]);
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = ChainBuilder::new("c")
            .then(noop("upload"))
            .unwrap()
            .then(noop("upload"))
            .unwrap_err();

        assert_eq!(err.stages, vec!["upload".to_string()]);
    }

    #[test]
    fn test_blank_stage_name_rejected() {
        assert!(ChainBuilder::new("c").stage("  ", noop("x")).is_err());
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(ChainBuilder::new("c").build().is_err());
    }

    #[test]
    fn test_blank_chain_name_rejected() {
        let builder = ChainBuilder::new("   ").then(noop("a")).unwrap();
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_stage_count() {
        let builder = ChainBuilder::new("c").then(noop("a")).unwrap();
        assert_eq!(builder.stage_count(), 1);
        assert_eq!(builder.name(), "c");
    }
}
