use std::fmt;

use tokio::task::JoinError;
use worker::WorkerErr;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any replica starts.
    InvalidConfig(String),
    /// The cluster address can't be served by this orchestrator.
    UnsupportedAddress(String),
    /// A worker produced an unrecoverable error during training.
    Worker { worker_id: usize, source: WorkerErr },
    /// The tracker received reports it can't make sense of.
    Tracker(String),
    /// Failed to persist a checkpoint.
    Checkpoint(WorkerErr),
    /// A replica or the tracker panicked.
    Join(JoinError),
    /// An underlying I/O error not covered by the above variants.
    Io(std::io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::UnsupportedAddress(addr) => write!(
                f,
                "unsupported cluster address '{addr}': only local execution is available"
            ),
            Self::Worker { worker_id, source } => write!(f, "worker {worker_id} error: {source}"),
            Self::Tracker(msg) => write!(f, "tracker error: {msg}"),
            Self::Checkpoint(e) => write!(f, "failed to persist checkpoint: {e}"),
            Self::Join(e) => write!(f, "task failed: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Worker { source, .. } => Some(source),
            Self::Checkpoint(e) => Some(e),
            Self::Join(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<walkdir::Error> for OrchestratorError {
    fn from(e: walkdir::Error) -> Self {
        Self::Io(e.into())
    }
}

impl From<JoinError> for OrchestratorError {
    fn from(e: JoinError) -> Self {
        Self::Join(e)
    }
}
