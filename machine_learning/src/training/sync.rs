use crate::Result;

/// Combines the gradients of every replica before each optimizer step.
///
/// Every replica of a run must call `all_reduce` the same amount of times, otherwise the ones
/// ahead wait forever for the missing calls.
pub trait GradSync {
    /// Replaces `grad`, the mean gradient over `samples` local samples, with the mean gradient
    /// over the samples of every replica.
    ///
    /// # Arguments
    /// * `grad` - This replica's gradient, overwritten with the combined one.
    /// * `samples` - How many samples `grad` was averaged over, zero if this replica had no batch.
    ///
    /// # Errors
    /// `MlErr::SyncAborted` if another replica gave up on the run.
    fn all_reduce(&mut self, grad: &mut [f32], samples: usize) -> Result<()>;
}

/// A lone replica, whose gradient is already the whole batch's.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSync;

impl GradSync for NoSync {
    fn all_reduce(&mut self, _grad: &mut [f32], _samples: usize) -> Result<()> {
        Ok(())
    }
}
