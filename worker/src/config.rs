use std::{fs, num::NonZeroUsize, path::Path};

use machine_learning::dataset::ShardSpec;
use serde::{Deserialize, Serialize};

use crate::{Result, WorkerErr};

/// The seed used when the config leaves it unset and nobody picked one for it.
pub const DEFAULT_SEED: u64 = 0;

/// The training loop's hyperparameters, shared by every replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainLoopConfig {
    /// The learning rate.
    pub lr: f32,
    /// The total batch size across all replicas.
    pub batch_size: usize,
    /// The amount of training cycles, zero included.
    pub epochs: usize,
    /// The seed for the parameters' initialization.
    pub seed: Option<u64>,
    /// How many batches between progress lines.
    pub log_interval: usize,
}

impl Default for TrainLoopConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            batch_size: 64,
            epochs: 1,
            seed: None,
            log_interval: 100,
        }
    }
}

impl TrainLoopConfig {
    /// Reads and validates a JSON config file; missing fields take their defaults.
    ///
    /// # Errors
    /// `WorkerErr::Io` or `WorkerErr::Json` if the file can't be read or parsed, and
    /// `WorkerErr::InvalidConfig` if it does not pass validation.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.lr.is_finite() || self.lr <= 0. {
            return Err(WorkerErr::InvalidConfig(format!(
                "lr must be a positive number, got {}",
                self.lr
            )));
        }

        if self.batch_size == 0 {
            return Err(WorkerErr::InvalidConfig("batch_size must be at least 1".into()));
        }

        if self.log_interval == 0 {
            return Err(WorkerErr::InvalidConfig("log_interval must be at least 1".into()));
        }

        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    /// The batch size each replica uses: the total one split evenly among the replicas.
    ///
    /// # Errors
    /// `WorkerErr::InvalidConfig` if there are more replicas than samples per batch.
    pub fn worker_batch_size(&self, ctx: &ReplicaContext) -> Result<NonZeroUsize> {
        let world_size = ctx.world_size();
        NonZeroUsize::new(self.batch_size / world_size).ok_or_else(|| {
            WorkerErr::InvalidConfig(format!(
                "batch_size {} is smaller than the {world_size} workers",
                self.batch_size
            ))
        })
    }

    pub fn log_interval(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.log_interval)
            .ok_or_else(|| WorkerErr::InvalidConfig("log_interval must be at least 1".into()))
    }
}

/// What a replica knows about its place in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaContext {
    rank: usize,
    world_size: NonZeroUsize,
}

impl ReplicaContext {
    /// # Errors
    /// `WorkerErr::InvalidConfig` if `rank` is not smaller than `world_size`.
    pub fn new(rank: usize, world_size: NonZeroUsize) -> Result<Self> {
        if rank >= world_size.get() {
            return Err(WorkerErr::InvalidConfig(format!(
                "rank {rank} out of range for {world_size} workers"
            )));
        }

        Ok(Self { rank, world_size })
    }

    /// A lone replica.
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: NonZeroUsize::MIN,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size.get()
    }

    /// The slice of each dataset this replica works on.
    pub fn shard(&self) -> Result<ShardSpec> {
        Ok(ShardSpec::new(self.rank, self.world_size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(rank: usize, world: usize) -> ReplicaContext {
        ReplicaContext::new(rank, NonZeroUsize::new(world).unwrap()).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let config = TrainLoopConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.epochs, 1);
    }

    #[test]
    fn invalid_fields_are_rejected() {
        for config in [
            TrainLoopConfig { lr: 0., ..Default::default() },
            TrainLoopConfig { lr: f32::NAN, ..Default::default() },
            TrainLoopConfig { batch_size: 0, ..Default::default() },
            TrainLoopConfig { log_interval: 0, ..Default::default() },
        ] {
            assert!(matches!(config.validate(), Err(WorkerErr::InvalidConfig(_))));
        }

        let zero_epochs = TrainLoopConfig { epochs: 0, ..Default::default() };
        zero_epochs.validate().unwrap();
    }

    #[test]
    fn json_fills_missing_fields_and_rejects_unknown_ones() {
        let config: TrainLoopConfig = serde_json::from_str(r#"{"lr": 0.01, "epochs": 3}"#).unwrap();
        assert_eq!(config.lr, 0.01);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 64);

        assert!(serde_json::from_str::<TrainLoopConfig>(r#"{"learning_rate": 0.1}"#).is_err());
    }

    #[test]
    fn from_json_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"batch_size": 0}"#).unwrap();
        assert!(matches!(
            TrainLoopConfig::from_json_file(&path),
            Err(WorkerErr::InvalidConfig(_))
        ));

        fs::write(&path, r#"{"batch_size": 32, "seed": 9}"#).unwrap();
        let config = TrainLoopConfig::from_json_file(&path).unwrap();
        assert_eq!(config.seed(), 9);
    }

    #[test]
    fn batch_size_is_split_among_workers() {
        let config = TrainLoopConfig::default();
        assert_eq!(config.worker_batch_size(&ctx(0, 2)).unwrap().get(), 32);
        assert_eq!(config.worker_batch_size(&ctx(2, 3)).unwrap().get(), 21);

        let tiny = TrainLoopConfig { batch_size: 1, ..Default::default() };
        assert!(tiny.worker_batch_size(&ctx(0, 2)).is_err());
    }

    #[test]
    fn rank_must_fit_the_world() {
        assert!(ReplicaContext::new(2, NonZeroUsize::new(2).unwrap()).is_err());
        assert_eq!(ctx(1, 2).shard().unwrap().range(10), 5..10);
    }
}
