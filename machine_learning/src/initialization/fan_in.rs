use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::{MlErr, ParamTensor, Result};

/// Draws every tensor of a dense layer from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
///
/// A weight tensor of shape `(fan_in, fan_out)` sets the fan-in, which the bias tensor that
/// follows it reuses.
pub struct FanInUniform<R: Rng> {
    rng: R,
    fan_in: Option<usize>,
}

impl<R: Rng> FanInUniform<R> {
    /// Creates a new `FanInUniform` drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng, fan_in: None }
    }
}

impl<R: Rng> ParamGen for FanInUniform<R> {
    fn fill(&mut self, tensor: &ParamTensor, values: &mut [f32]) -> Result<()> {
        let fan_in = match tensor.shape.as_slice() {
            &[fan_in, _] => {
                self.fan_in = Some(fan_in);
                fan_in
            }
            &[_] => self
                .fan_in
                .ok_or(MlErr::InvalidInput("a bias needs its layer's weights before it"))?,
            _ => return Err(MlErr::InvalidInput("only matrices and vectors can be initialized")),
        };

        let bound = 1. / (fan_in as f32).sqrt();
        let distribution = Uniform::new(-bound, bound)?;
        for (value, sample) in values.iter_mut().zip(distribution.sample_iter(&mut self.rng)) {
            *value = sample;
        }

        Ok(())
    }
}
