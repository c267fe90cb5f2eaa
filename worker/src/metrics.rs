use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters a replica keeps over its whole run.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub train_time: Duration,
    pub validation_time: Duration,
    pub report_time: Duration,

    pub train_passes: u64,
    pub validation_passes: u64,
    pub train_batches: u64,
    pub train_samples: u64,
    pub validation_samples: u64,
    pub reports: u64,
}

impl WorkerMetrics {
    #[inline]
    pub fn add_train_pass(&mut self, batches: usize, samples: usize, elapsed: Duration) {
        self.train_passes += 1;
        self.train_batches += batches as u64;
        self.train_samples += samples as u64;
        self.train_time += elapsed;
    }

    #[inline]
    pub fn add_validation_pass(&mut self, samples: usize, elapsed: Duration) {
        self.validation_passes += 1;
        self.validation_samples += samples as u64;
        self.validation_time += elapsed;
    }

    #[inline]
    pub fn add_report(&mut self, elapsed: Duration) {
        self.reports += 1;
        self.report_time += elapsed;
    }
}
