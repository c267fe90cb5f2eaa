use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

/// Where a run keeps its checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub storage_path: PathBuf,
    pub name: String,
    /// How many of the latest checkpoints to keep, all of them if unset.
    pub keep_checkpoints: Option<NonZeroUsize>,
}

impl RunConfig {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(storage_path: P, name: S) -> Self {
        Self {
            storage_path: storage_path.into(),
            name: name.into(),
            keep_checkpoints: None,
        }
    }

    pub fn with_keep_checkpoints(mut self, keep: NonZeroUsize) -> Self {
        self.keep_checkpoints = Some(keep);
        self
    }

    /// # Errors
    /// `OrchestratorError::InvalidConfig` if the name is empty or is not a single path component.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let single_component = Path::new(&self.name).components().count() == 1;
        if self.name.is_empty() || self.name == "." || self.name == ".." || !single_component {
            return Err(OrchestratorError::InvalidConfig(format!(
                "run name '{}' must be a plain directory name",
                self.name
            )));
        }

        Ok(())
    }

    /// The directory holding everything this run writes.
    pub fn run_dir(&self) -> PathBuf {
        self.storage_path.join(&self.name)
    }

    /// The directory the checkpoint of `epoch` goes to.
    pub fn checkpoint_dir(&self, epoch: usize) -> PathBuf {
        self.run_dir().join(format!("checkpoint_{epoch:06}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_dirs_are_zero_padded() {
        let run = RunConfig::new("runs", "fashion_mnist");
        assert_eq!(
            run.checkpoint_dir(3),
            PathBuf::from("runs/fashion_mnist/checkpoint_000003")
        );
    }

    #[test]
    fn names_must_be_plain() {
        RunConfig::new("runs", "a").validate().unwrap();
        for name in ["", ".", "..", "a/b"] {
            assert!(RunConfig::new("runs", name).validate().is_err(), "{name}");
        }
    }
}
