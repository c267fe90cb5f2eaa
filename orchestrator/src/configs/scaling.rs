use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

/// How many replicas to run and on what hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    pub num_workers: usize,
    pub use_gpu: bool,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            num_workers: 2,
            use_gpu: false,
        }
    }
}

impl ScalingConfig {
    /// Checks the config can be served and returns the world size.
    ///
    /// # Errors
    /// `OrchestratorError::InvalidConfig` if there are no workers or an accelerator is asked for.
    pub fn validate(&self) -> Result<NonZeroUsize, OrchestratorError> {
        if self.use_gpu {
            return Err(OrchestratorError::InvalidConfig(
                "use_gpu is not supported: workers only have a cpu backend".into(),
            ));
        }

        NonZeroUsize::new(self.num_workers).ok_or_else(|| {
            OrchestratorError::InvalidConfig("num_workers must be at least 1".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_workers_and_backend() {
        assert_eq!(ScalingConfig::default().validate().unwrap().get(), 2);

        let no_workers = ScalingConfig { num_workers: 0, use_gpu: false };
        assert!(matches!(no_workers.validate(), Err(OrchestratorError::InvalidConfig(_))));

        let gpu = ScalingConfig { num_workers: 1, use_gpu: true };
        assert!(matches!(gpu.validate(), Err(OrchestratorError::InvalidConfig(_))));
    }
}
