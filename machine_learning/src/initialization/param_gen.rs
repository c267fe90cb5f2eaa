use crate::{ParamTensor, Result};

/// A `ParamGen` draws the initial values of a model's parameters, one named tensor at a time.
pub trait ParamGen {
    /// Fills the values of `tensor`.
    ///
    /// Tensors are visited in layout order, so a generator may carry what it learned from one
    /// tensor over to the next, e.g. a layer's fan-in from its weights to its biases.
    ///
    /// # Arguments
    /// * `tensor` - The tensor being initialized.
    /// * `values` - Its slice of the flat buffer, `tensor.len()` long.
    fn fill(&mut self, tensor: &ParamTensor, values: &mut [f32]) -> Result<()>;
}
