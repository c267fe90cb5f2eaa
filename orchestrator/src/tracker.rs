use std::{collections::VecDeque, fs, num::NonZeroUsize, path::PathBuf};

use log::{debug, info};
use tokio::sync::mpsc;
use worker::{Checkpoint, EpochReport};

use crate::{EpochMetrics, OrchestratorError, RunConfig, TrainingResult};

/// The file the per epoch metrics are written to, next to the checkpoints.
pub const METRICS_FILE: &str = "metrics.json";

#[derive(Debug, Default, Clone, Copy)]
struct EpochAccumulator {
    loss_sum: f64,
    accuracy_sum: f64,
    reports: usize,
}

/// Consumes the replicas' epoch reports: checks their order, persists the checkpoints of
/// rank 0 and aggregates the metrics of every epoch.
#[derive(Debug)]
pub struct Tracker {
    run: RunConfig,
    next_epoch: Vec<usize>,
    epochs: Vec<EpochAccumulator>,
    persisted: VecDeque<PathBuf>,
    latest: Option<PathBuf>,
}

impl Tracker {
    pub fn new(run: RunConfig, world_size: NonZeroUsize) -> Self {
        Self {
            run,
            next_epoch: vec![0; world_size.get()],
            epochs: Vec::new(),
            persisted: VecDeque::new(),
            latest: None,
        }
    }

    /// Records one report.
    ///
    /// # Errors
    /// `OrchestratorError::Tracker` if the report comes from an unknown rank or out of order,
    /// `OrchestratorError::Checkpoint` if rank 0's checkpoint can't be written.
    pub fn record(&mut self, report: EpochReport) -> Result<(), OrchestratorError> {
        let EpochReport {
            rank,
            result,
            checkpoint,
        } = report;

        let expected = self
            .next_epoch
            .get_mut(rank)
            .ok_or_else(|| OrchestratorError::Tracker(format!("report from unknown rank {rank}")))?;

        if result.epoch != *expected || checkpoint.epoch() != result.epoch {
            return Err(OrchestratorError::Tracker(format!(
                "rank {rank} reported epoch {} (checkpoint {}) but epoch {expected} was next",
                result.epoch,
                checkpoint.epoch()
            )));
        }
        *expected += 1;

        if self.epochs.len() <= result.epoch {
            self.epochs.resize_with(result.epoch + 1, Default::default);
        }

        let acc = &mut self.epochs[result.epoch];
        acc.loss_sum += f64::from(result.loss);
        acc.accuracy_sum += f64::from(result.accuracy);
        acc.reports += 1;

        info!(
            rank = rank,
            epoch = result.epoch,
            loss = result.loss,
            accuracy = result.accuracy;
            "epoch reported"
        );

        if rank == 0 {
            self.persist(&checkpoint)?;
        }

        Ok(())
    }

    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<(), OrchestratorError> {
        let dir = self.run.checkpoint_dir(checkpoint.epoch());
        let path = checkpoint
            .write_to(&dir)
            .map_err(OrchestratorError::Checkpoint)?;
        debug!("persisted checkpoint at {}", path.display());

        self.persisted.push_back(path.clone());
        if let Some(keep) = self.run.keep_checkpoints {
            while self.persisted.len() > keep.get() {
                if let Some(old) = self.persisted.pop_front() {
                    fs::remove_dir_all(&old)?;
                    debug!("pruned checkpoint at {}", old.display());
                }
            }
        }

        self.latest = Some(path);
        Ok(())
    }

    /// Receives reports until every replica hung up.
    ///
    /// Must run on a blocking thread.
    pub fn consume(
        mut self,
        mut rx: mpsc::Receiver<EpochReport>,
    ) -> Result<TrainingResult, OrchestratorError> {
        while let Some(report) = rx.blocking_recv() {
            self.record(report)?;
        }

        self.finish()
    }

    /// Aggregates what was recorded and writes the per epoch metrics next to the checkpoints.
    pub fn finish(self) -> Result<TrainingResult, OrchestratorError> {
        let metrics: Vec<_> = self
            .epochs
            .iter()
            .enumerate()
            .map(|(epoch, acc)| {
                let n = acc.reports.max(1) as f64;
                EpochMetrics {
                    epoch,
                    mean_loss: (acc.loss_sum / n) as f32,
                    mean_accuracy: (acc.accuracy_sum / n) as f32,
                    reports: acc.reports,
                }
            })
            .collect();

        if !metrics.is_empty() {
            let run_dir = self.run.run_dir();
            fs::create_dir_all(&run_dir)?;
            let json = serde_json::to_vec_pretty(&metrics).map_err(std::io::Error::other)?;
            fs::write(run_dir.join(METRICS_FILE), json)?;
        }

        Ok(TrainingResult {
            metrics,
            checkpoint: self.latest,
            worker_losses: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::{ParamLayout, Parameters};
    use worker::EpochResult;

    use super::*;

    fn report(rank: usize, epoch: usize, loss: f32) -> EpochReport {
        let mut layout = ParamLayout::new();
        layout.push("dense_0.bias", vec![2]);
        let params = Parameters::new(layout, vec![rank as f32, epoch as f32]).unwrap();

        let result = EpochResult {
            epoch,
            loss,
            accuracy: 0.5,
            train_loss: loss,
        };

        EpochReport {
            rank,
            result,
            checkpoint: Checkpoint::snapshot(rank, result, &params),
        }
    }

    fn tracker(dir: &std::path::Path, world: usize) -> Tracker {
        Tracker::new(RunConfig::new(dir, "run"), NonZeroUsize::new(world).unwrap())
    }

    #[test]
    fn aggregates_and_persists_rank_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path(), 2);

        tracker.record(report(1, 0, 2.)).unwrap();
        tracker.record(report(0, 0, 1.)).unwrap();
        tracker.record(report(0, 1, 0.5)).unwrap();
        tracker.record(report(1, 1, 1.5)).unwrap();

        let result = tracker.finish().unwrap();
        assert_eq!(result.losses(), vec![1.5, 1.]);
        assert!(result.metrics.iter().all(|m| m.reports == 2));

        let latest = result.checkpoint.unwrap();
        assert_eq!(latest, dir.path().join("run/checkpoint_000001"));
        assert_eq!(Checkpoint::read_from(&latest).unwrap().values(), &[0., 1.]);
        assert!(dir.path().join("run/checkpoint_000000").is_dir());
        assert!(dir.path().join("run").join(METRICS_FILE).is_file());
    }

    #[test]
    fn out_of_order_reports_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(dir.path(), 1);

        assert!(matches!(tracker.record(report(0, 1, 1.)), Err(OrchestratorError::Tracker(_))));
        tracker.record(report(0, 0, 1.)).unwrap();
        assert!(matches!(tracker.record(report(0, 0, 1.)), Err(OrchestratorError::Tracker(_))));
        assert!(matches!(tracker.record(report(3, 0, 1.)), Err(OrchestratorError::Tracker(_))));
    }

    #[test]
    fn keeps_only_the_latest_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunConfig::new(dir.path(), "run").with_keep_checkpoints(NonZeroUsize::MIN);
        let mut tracker = Tracker::new(run, NonZeroUsize::MIN);

        for epoch in 0..3 {
            tracker.record(report(0, epoch, 1.)).unwrap();
        }

        let result = tracker.finish().unwrap();
        assert_eq!(result.checkpoint, Some(dir.path().join("run/checkpoint_000002")));
        assert!(!dir.path().join("run/checkpoint_000000").exists());
        assert!(!dir.path().join("run/checkpoint_000001").exists());
    }

    #[test]
    fn no_reports_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let result = tracker(dir.path(), 2).finish().unwrap();
        assert_eq!(result, TrainingResult::default());
        assert!(!dir.path().join("run").exists());
    }
}
