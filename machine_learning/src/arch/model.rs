use ndarray::{Array2, ArrayView2};

use crate::{ParamLayout, Result};

/// A differentiable function of a flat parameter buffer.
///
/// The model never owns its parameters, it only keeps whatever scratch state it needs between a
/// forward and a backward pass.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Describes how the flat parameter buffer splits into named tensors.
    fn layout(&self) -> ParamLayout;

    /// Computes the model's output for a batch of inputs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch, one sample per row.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>>;

    /// Writes the gradient of the loss into `grad` given the derivative of the loss with respect to
    /// the output of the last forward pass.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, the same used in the last forward pass.
    /// * `grad` - The gradient buffer, as large as `params`.
    /// * `d` - The derivative of the loss with respect to the model's output.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<()>;
}
