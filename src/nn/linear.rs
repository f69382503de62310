//! Fully connected layer

use crate::autograd::{ops, Context, Graph, Variable};
use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::IxDyn;
use rand::{Rng, SeedableRng};

/// Affine layer `y = x @ W + b`
///
/// `weight` has shape `[in_features, out_features]` and `bias` has shape
/// `[1, out_features]`, so the bias broadcasts over the batch axis and its
/// gradient is summed back over the batch by the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    weight: Variable,
    bias: Variable,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a layer whose parameters live in `graph`
    ///
    /// Weights use Xavier uniform initialization from a seeded `StdRng`, so
    /// the same seed always gives the same layer. Biases start at zero.
    pub fn new(graph: &mut Graph, in_features: usize, out_features: usize, seed: u64) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(Error::InvalidParameter(format!(
                "Linear layer dimensions must be non-zero, got {in_features}x{out_features}"
            )));
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let limit = (6.0 / (in_features + out_features) as f32).sqrt();
        let weight = Tensor::from_shape_simple_fn(IxDyn(&[in_features, out_features]), || {
            rng.random_range(-limit..limit)
        });
        let bias = Tensor::zeros(IxDyn(&[1, out_features]));

        let weight = graph.leaf(weight, Some("linear.weight"), true);
        let bias = graph.leaf(bias, Some("linear.bias"), true);
        Ok(Self {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    /// Apply the layer to a `[batch, in_features]` input
    pub fn forward(&self, graph: &mut Graph, ctx: &Context, x: Variable) -> Result<Variable> {
        let h = ops::matmul(graph, ctx, x, self.weight)?;
        ops::add(graph, ctx, h, self.bias)
    }

    /// Trainable parameters, weight first
    pub fn parameters(&self) -> Vec<Variable> {
        vec![self.weight, self.bias]
    }

    pub fn weight(&self) -> Variable {
        self.weight
    }

    pub fn bias(&self) -> Variable {
        self.bias
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}
