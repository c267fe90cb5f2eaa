use std::{error::Error, fmt, io};

use machine_learning::MlErr;
use safetensors::SafeTensorError;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Ml(MlErr),
    Io(io::Error),
    InvalidConfig(String),
    ReportChannelClosed { rank: usize, epoch: usize },
    Checkpoint(SafeTensorError),
    CorruptCheckpoint(String),
    Json(serde_json::Error),
}

impl WorkerErr {
    /// Whether this error only follows from the tracker or another replica failing first.
    pub fn is_knock_on(&self) -> bool {
        matches!(
            self,
            WorkerErr::ReportChannelClosed { .. } | WorkerErr::Ml(MlErr::SyncAborted)
        )
    }
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Ml(e) => write!(f, "training error: {e}"),
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::InvalidConfig(msg) => write!(f, "invalid training config: {msg}"),
            WorkerErr::ReportChannelClosed { rank, epoch } => write!(
                f,
                "worker {rank} could not report epoch {epoch}: the tracker is gone"
            ),
            WorkerErr::Checkpoint(e) => write!(f, "checkpoint error: {e}"),
            WorkerErr::CorruptCheckpoint(msg) => write!(f, "corrupt checkpoint: {msg}"),
            WorkerErr::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Ml(e) => Some(e),
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Checkpoint(e) => Some(e),
            WorkerErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for WorkerErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(value)
    }
}

impl From<serde_json::Error> for WorkerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
