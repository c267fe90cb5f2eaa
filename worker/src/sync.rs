use std::{
    num::NonZeroUsize,
    sync::{Arc, Condvar, Mutex, MutexGuard},
};

use machine_learning::{MlErr, Result as MlResult, training::GradSync};

#[derive(Debug, Default)]
struct Round {
    /// Each rank's gradient of the current round, summed in rank order once everyone arrived.
    grads: Vec<Vec<f32>>,
    samples: Vec<usize>,
    arrived: usize,
    generation: u64,
    mean: Vec<f32>,
    aborted: bool,
}

#[derive(Debug)]
struct Group {
    world_size: usize,
    round: Mutex<Round>,
    condvar: Condvar,
}

impl Group {
    fn new(world_size: usize) -> Arc<Self> {
        Arc::new(Self {
            world_size,
            round: Mutex::new(Round {
                grads: vec![Vec::new(); world_size],
                samples: vec![0; world_size],
                ..Default::default()
            }),
            condvar: Condvar::new(),
        })
    }

    fn lock(&self) -> MlResult<MutexGuard<'_, Round>> {
        self.round.lock().map_err(|_| MlErr::SyncAborted)
    }
}

/// Averages the gradients of every replica of a run before each optimizer step.
///
/// Every replica blocks in `all_reduce` until the whole group arrived, then all of them leave
/// with the same gradient: the mean over every sample the group saw that step. Replicas that
/// start from the same parameters thus stay identical.
#[derive(Debug)]
pub struct BarrierSync {
    rank: usize,
    group: Arc<Group>,
}

impl BarrierSync {
    /// Creates one handle per rank of a group of `world_size` replicas.
    pub fn group(world_size: NonZeroUsize) -> Vec<Self> {
        let group = Group::new(world_size.get());

        (0..world_size.get())
            .map(|rank| Self {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// The handle of a lone replica, which never waits.
    pub fn single() -> Self {
        Self {
            rank: 0,
            group: Group::new(1),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.group.world_size
    }

    /// Gives up on the run, waking every replica waiting on the group with an error.
    pub fn abort(&self) {
        if let Ok(mut round) = self.group.round.lock() {
            round.aborted = true;
        }
        self.group.condvar.notify_all();
    }
}

impl GradSync for BarrierSync {
    fn all_reduce(&mut self, grad: &mut [f32], samples: usize) -> MlResult<()> {
        let group = &*self.group;
        if group.world_size == 1 {
            return Ok(());
        }

        let mut round = group.lock()?;
        if round.aborted {
            return Err(MlErr::SyncAborted);
        }

        let slot = &mut round.grads[self.rank];
        slot.clear();
        slot.extend_from_slice(grad);
        round.samples[self.rank] = samples;
        round.arrived += 1;

        let generation = round.generation;
        if round.arrived == group.world_size {
            if let Err(e) = reduce(&mut round) {
                round.aborted = true;
                group.condvar.notify_all();
                return Err(e);
            }
            round.arrived = 0;
            round.generation = round.generation.wrapping_add(1);
            group.condvar.notify_all();
        } else {
            while round.generation == generation && !round.aborted {
                round = group.condvar.wait(round).map_err(|_| MlErr::SyncAborted)?;
            }

            if round.generation == generation {
                return Err(MlErr::SyncAborted);
            }
        }

        grad.copy_from_slice(&round.mean);
        Ok(())
    }
}

/// Writes the sample weighted mean of every rank's gradient into `round.mean`.
fn reduce(round: &mut Round) -> MlResult<()> {
    let size = round.grads[0].len();
    if let Some(bad) = round.grads.iter().find(|g| g.len() != size) {
        return Err(MlErr::SizeMismatch {
            what: "replica gradient",
            got: bad.len(),
            expected: size,
        });
    }

    let total: usize = round.samples.iter().sum();
    round.mean.clear();
    round.mean.resize(size, 0.);
    if total == 0 {
        return Ok(());
    }

    for (grad, &samples) in round.grads.iter().zip(&round.samples) {
        if samples == 0 {
            continue;
        }

        let weight = samples as f32 / total as f32;
        for (mean, g) in round.mean.iter_mut().zip(grad) {
            *mean += g * weight;
        }
    }

    Ok(())
}
