use std::fmt;

use crate::EpochResult;

/// Where a replica's training loop is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverState {
    /// Building the loaders, the model replica and its parameters.
    Initializing,
    /// Training then validating the given epoch.
    RunningEpoch(usize),
    /// Handing the epoch's result and checkpoint to the tracker.
    Reporting(EpochResult),
    Completed,
}

impl DriverState {
    /// The state following a finished report, given the total amount of epochs.
    pub fn after_report(epoch: usize, epochs: usize) -> Self {
        if epoch + 1 < epochs {
            Self::RunningEpoch(epoch + 1)
        } else {
            Self::Completed
        }
    }

    /// The state following initialization, given the total amount of epochs.
    pub fn after_init(epochs: usize) -> Self {
        if epochs == 0 {
            Self::Completed
        } else {
            Self::RunningEpoch(0)
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Initializing => write!(f, "initializing"),
            DriverState::RunningEpoch(epoch) => write!(f, "running epoch {epoch}"),
            DriverState::Reporting(result) => write!(f, "reporting epoch {}", result.epoch),
            DriverState::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        assert_eq!(DriverState::after_init(0), DriverState::Completed);
        assert_eq!(DriverState::after_init(3), DriverState::RunningEpoch(0));
        assert_eq!(DriverState::after_report(0, 3), DriverState::RunningEpoch(1));
        assert_eq!(DriverState::after_report(2, 3), DriverState::Completed);
    }
}
