use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, initialization::ParamGen, optimization::Optimizer};

/// A named tensor living inside the model's flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub offset: usize,
}

impl ParamTensor {
    /// The amount of scalars in this tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The range this tensor occupies in the flat buffer.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// Maps a flat parameter buffer into named tensors, in order and without gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamLayout {
    tensors: Vec<ParamTensor>,
}

impl ParamLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tensor right after the last one.
    ///
    /// # Arguments
    /// * `name` - The tensor's name, e.g. `dense_0.weight`.
    /// * `shape` - The tensor's shape.
    pub fn push<S: Into<String>>(&mut self, name: S, shape: Vec<usize>) {
        let offset = self.size();
        self.tensors.push(ParamTensor {
            name: name.into(),
            shape,
            offset,
        });
    }

    /// The total amount of parameters described by this layout.
    pub fn size(&self) -> usize {
        self.tensors.last().map_or(0, |t| t.offset + t.len())
    }

    pub fn tensors(&self) -> &[ParamTensor] {
        &self.tensors
    }

    /// Looks up a tensor by name.
    pub fn get(&self, name: &str) -> Option<&ParamTensor> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Checks the tensors are contiguous and exactly cover a buffer of `total` parameters.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if a tensor does not start where the previous one ended or the
    /// layout does not cover the whole buffer.
    pub fn validate(&self, total: usize) -> Result<()> {
        let mut cursor = 0;
        for tensor in &self.tensors {
            if tensor.offset != cursor {
                return Err(MlErr::SizeMismatch {
                    what: "tensor offset",
                    got: tensor.offset,
                    expected: cursor,
                });
            }
            cursor += tensor.len();
        }

        if cursor != total {
            return Err(MlErr::SizeMismatch {
                what: "parameter layout",
                got: cursor,
                expected: total,
            });
        }

        Ok(())
    }

    /// Iterates the tensors alongside their slice of `values`.
    pub fn split<'a>(
        &'a self,
        values: &'a [f32],
    ) -> impl Iterator<Item = (&'a ParamTensor, &'a [f32])> + 'a {
        self.tensors.iter().map(|t| (t, &values[t.range()]))
    }
}

/// The model's parameters: a flat buffer of values, its gradient buffer and the layout that
/// names them.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    values: Vec<f32>,
    grad: Vec<f32>,
    layout: ParamLayout,
}

impl Parameters {
    /// Creates a new `Parameters` from already known values.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if the values do not match the layout.
    pub fn new(layout: ParamLayout, values: Vec<f32>) -> Result<Self> {
        layout.validate(values.len())?;

        Ok(Self {
            grad: vec![0.; values.len()],
            values,
            layout,
        })
    }

    /// Creates a new `Parameters` drawing the initial values of every tensor of `layout`, in
    /// order, from a generator.
    ///
    /// # Errors
    /// Whatever the generator fails with.
    pub fn generate<G: ParamGen>(layout: ParamLayout, param_gen: &mut G) -> Result<Self> {
        let mut values = vec![0.; layout.size()];
        for tensor in layout.tensors() {
            param_gen.fill(tensor, &mut values[tensor.range()])?;
        }

        Self::new(layout, values)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows the values immutably and the gradient mutably, as backpropagation needs.
    pub fn split_grad(&mut self) -> (&[f32], &mut [f32]) {
        (&self.values, &mut self.grad)
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Applies one optimizer step with the current gradient.
    pub fn step<O: Optimizer>(&mut self, optimizer: &mut O) {
        optimizer.update_params(&mut self.values, &self.grad);
    }

    /// Iterates the named tensors and their values.
    pub fn named(&self) -> impl Iterator<Item = (&ParamTensor, &[f32])> {
        self.layout.split(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::GradientDescent;

    fn layout() -> ParamLayout {
        let mut layout = ParamLayout::new();
        layout.push("dense_0.weight", vec![2, 3]);
        layout.push("dense_0.bias", vec![3]);
        layout
    }

    #[test]
    fn layout_offsets_are_contiguous() {
        let layout = layout();
        assert_eq!(layout.size(), 9);
        assert_eq!(layout.get("dense_0.bias").unwrap().range(), 6..9);
        layout.validate(9).unwrap();
        assert!(layout.validate(10).is_err());
    }

    /// Fills every tensor with its own index in the layout.
    struct TensorIndex(f32);

    impl ParamGen for TensorIndex {
        fn fill(&mut self, _tensor: &ParamTensor, values: &mut [f32]) -> Result<()> {
            values.fill(self.0);
            self.0 += 1.;
            Ok(())
        }
    }

    #[test]
    fn generate_visits_every_tensor_in_order() {
        let params = Parameters::generate(layout(), &mut TensorIndex(0.)).unwrap();
        assert_eq!(params.values(), &[0., 0., 0., 0., 0., 0., 1., 1., 1.]);
        assert_eq!(params.grad(), &[0.; 9]);
    }

    #[test]
    fn step_then_zero_grad() {
        let mut params = Parameters::new(layout(), vec![1.; 9]).unwrap();
        let (_, grad) = params.split_grad();
        grad.fill(2.);

        params.step(&mut GradientDescent::new(0.25));
        params.zero_grad();

        assert_eq!(params.values(), &[0.5; 9]);
        assert_eq!(params.grad(), &[0.; 9]);
    }

    #[test]
    fn named_tensors_slice_the_values() {
        let values: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let params = Parameters::new(layout(), values).unwrap();
        let named: Vec<_> = params.named().map(|(t, v)| (t.name.clone(), v.len())).collect();
        assert_eq!(
            named,
            vec![("dense_0.weight".to_string(), 6), ("dense_0.bias".to_string(), 3)]
        );
    }
}
