use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, activations::ActFn, layers::Layer};
use crate::{MlErr, ParamLayout, Parameters, Result, initialization::FanInUniform};

/// The layer sizes of the fashion mnist classifier: 28x28 grayscale pixels in, 10 classes out.
pub const FASHION_MNIST_SIZES: [usize; 4] = [784, 512, 512, 10];

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Creates a stack of dense layers, one per consecutive pair of `sizes`, all of them
    /// followed by the same activation.
    ///
    /// # Errors
    /// `MlErr::InvalidInput` if fewer than two sizes are given or any of them is zero.
    pub fn feedforward(sizes: &[usize], act_fn: Option<ActFn>) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(MlErr::InvalidInput("a feedforward needs at least two sizes"));
        }

        if sizes.contains(&0) {
            return Err(MlErr::InvalidInput("layer sizes must be positive"));
        }

        let layers = sizes
            .windows(2)
            .map(|dim| Layer::dense((dim[0], dim[1]), act_fn));

        Ok(Self::new(layers))
    }

    /// The fashion mnist classifier, `784 -> 512 -> 512 -> 10` with a ReLU after every layer,
    /// the last one included.
    pub fn fashion_mnist() -> Self {
        let layers = FASHION_MNIST_SIZES
            .windows(2)
            .map(|dim| Layer::dense((dim[0], dim[1]), Some(ActFn::relu())));

        Self::new(layers)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The amount of features per input sample, if the model has any layer.
    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(Layer::input_size)
    }

    /// The amount of features per output sample, if the model has any layer.
    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(Layer::output_size)
    }

    /// Draws a fresh set of parameters for this model, each layer uniformly from
    /// `±1/sqrt(fan_in)`.
    ///
    /// Two calls with equally seeded generators produce the same parameters.
    pub fn init_params<R: Rng>(&self, rng: R) -> Result<Parameters> {
        Parameters::generate(self.layout(), &mut FanInUniform::new(rng))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    fn layout(&self) -> ParamLayout {
        let mut layout = ParamLayout::new();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.describe(i, &mut layout);
        }

        layout
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        self.check_len("model parameters", params.len())?;

        let mut layers = self.layers.iter_mut();
        let Some(first) = layers.next() else {
            return Err(MlErr::InvalidInput("the model has no layers"));
        };

        let mut offset = first.size();
        let mut out = first.forward(&params[..offset], x)?;

        for layer in layers {
            let size = layer.size();
            out = layer.forward(&params[offset..offset + size], out)?;
            offset += size;
        }

        Ok(out)
    }

    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<()> {
        self.check_len("model parameters", params.len())?;
        self.check_len("model gradient", grad.len())?;

        let mut end = params.len();
        let mut d = d;

        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            let start = end - layer.size();
            match layer.backward(&params[start..end], &mut grad[start..end], d, i > 0)? {
                Some(next) => d = next,
                None => break,
            }
            end = start;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn fashion_mnist_topology() {
        let model = Sequential::fashion_mnist();

        assert_eq!(model.layers().len(), 3);
        assert_eq!(model.input_size(), Some(784));
        assert_eq!(model.output_size(), Some(10));
        assert_eq!(model.size(), 785 * 512 + 513 * 512 + 513 * 10);

        let layout = model.layout();
        assert_eq!(layout.size(), model.size());
        assert_eq!(layout.get("dense_2.bias").unwrap().shape, vec![10]);
        assert_eq!(layout.get("dense_1.weight").unwrap().shape, vec![512, 512]);
    }

    #[test]
    fn feedforward_rejects_degenerate_sizes() {
        assert!(Sequential::feedforward(&[3], None).is_err());
        assert!(Sequential::feedforward(&[3, 0, 1], None).is_err());
    }

    #[test]
    fn init_params_is_seeded_and_bounded() {
        let model = Sequential::feedforward(&[4, 3, 2], Some(ActFn::relu())).unwrap();

        let a = model.init_params(StdRng::seed_from_u64(7)).unwrap();
        let b = model.init_params(StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.values(), b.values());
        assert_eq!(a.len(), model.size());

        let (first, second) = a.values().split_at(15);
        assert!(first.iter().all(|w| w.abs() <= 0.5));
        assert!(second.iter().all(|w| w.abs() <= 1. / 3f32.sqrt()));
    }

    #[test]
    fn forward_chains_layers() {
        // 2 -> 2 identity, then 2 -> 1 summing
        let mut model = Sequential::feedforward(&[2, 2, 1], None).unwrap();
        let params = [1., 0., 0., 1., 0., 0., 1., 1., 0.5];

        let y = model.forward(&params, array![[1., 2.]].view()).unwrap();
        assert_eq!(y, array![[3.5]]);

        assert!(model.forward(&params[..8], array![[1., 2.]].view()).is_err());
    }

    #[test]
    fn backward_fills_every_layer() {
        let mut model = Sequential::feedforward(&[2, 2, 1], None).unwrap();
        let params = [1., 0., 0., 1., 0., 0., 1., 1., 0.5];
        let mut grad = [0.; 9];

        model.forward(&params, array![[1., 2.]].view()).unwrap();
        model
            .backward(&params, &mut grad, Array2::from_elem((1, 1), 1.))
            .unwrap();

        assert_eq!(grad, [1., 1., 2., 2., 1., 1., 1., 2., 1.]);
    }
}
