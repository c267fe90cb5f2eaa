use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One epoch's metrics aggregated over every replica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub mean_loss: f32,
    pub mean_accuracy: f32,
    /// The amount of replicas that reported this epoch.
    pub reports: usize,
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingResult {
    /// One entry per epoch, in order.
    pub metrics: Vec<EpochMetrics>,
    /// The last persisted checkpoint, `None` if no epoch ran.
    pub checkpoint: Option<PathBuf>,
    /// Every replica's validation losses, indexed by rank.
    pub worker_losses: Vec<Vec<f32>>,
}

impl TrainingResult {
    /// The mean validation loss of every epoch.
    pub fn losses(&self) -> Vec<f32> {
        self.metrics.iter().map(|m| m.mean_loss).collect()
    }
}
