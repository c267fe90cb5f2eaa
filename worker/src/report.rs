use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Checkpoint, Result, WorkerErr};

/// The metrics of one epoch of one replica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochResult {
    pub epoch: usize,
    /// The mean validation loss, the metric handed to the tracker.
    pub loss: f32,
    /// The fraction of correctly classified validation samples.
    pub accuracy: f32,
    /// The mean training loss.
    pub train_loss: f32,
}

/// What a replica hands the tracker at the end of every epoch.
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub rank: usize,
    pub result: EpochResult,
    pub checkpoint: Checkpoint,
}

/// The sending half of the report channel, one per replica.
///
/// Reporting blocks until the tracker has room for the report, so it must be called from a
/// blocking context, never from inside an async task.
#[derive(Debug, Clone)]
pub struct Reporter {
    rank: usize,
    tx: mpsc::Sender<EpochReport>,
}

impl Reporter {
    pub fn new(rank: usize, tx: mpsc::Sender<EpochReport>) -> Self {
        Self { rank, tx }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Pushes the epoch's result and checkpoint to the tracker, waiting for it to accept them.
    ///
    /// # Errors
    /// `WorkerErr::ReportChannelClosed` if the tracker is gone.
    pub fn report(&self, result: EpochResult, checkpoint: Checkpoint) -> Result<()> {
        let report = EpochReport {
            rank: self.rank,
            result,
            checkpoint,
        };

        self.tx
            .blocking_send(report)
            .map_err(|_| WorkerErr::ReportChannelClosed {
                rank: self.rank,
                epoch: result.epoch,
            })
    }
}
