use ndarray::{Array2, ArrayView2};

use crate::{ParamLayout, Result, arch::activations::ActFn};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(super::Dense),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(super::Dense::new(dim, act_fn))
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
        }
    }

    /// The amount of features this layer expects per sample.
    pub fn input_size(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().0,
        }
    }

    /// The amount of features this layer produces per sample.
    pub fn output_size(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().1,
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
        propagate: bool,
    ) -> Result<Option<Array2<f32>>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d, propagate),
        }
    }

    /// Appends this layer's named tensors to `layout`.
    ///
    /// # Arguments
    /// * `index` - The position of the layer in its model.
    /// * `layout` - The layout being built.
    pub fn describe(&self, index: usize, layout: &mut ParamLayout) {
        match self {
            Self::Dense(l) => {
                let (n, m) = l.dim();
                layout.push(format!("dense_{index}.weight"), vec![n, m]);
                layout.push(format!("dense_{index}.bias"), vec![m]);
            }
        }
    }
}
