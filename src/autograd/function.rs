//! Differentiable operation trait

use crate::error::Result;
use crate::Tensor;
use std::fmt::Debug;

/// A differentiable operation
///
/// `forward` maps input values to output values and must not touch the
/// inputs. `backward` maps the output gradients to one gradient per input,
/// in input order; `None` means "no gradient flows into this input" and the
/// scheduler skips it.
///
/// Gradients returned by `backward` may have a broadcast of the input's
/// shape. The scheduler sums them back down before accumulating.
pub trait Function: Debug {
    /// Human-readable name used in errors and logs
    fn name(&self) -> &'static str;

    /// Number of inputs this operation requires
    fn arity(&self) -> usize;

    /// Compute the output values from the input values
    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>>;

    /// Compute input gradients from output gradients
    ///
    /// `grad_outputs` has one entry per output. Outputs that received no
    /// gradient are passed as zeros.
    fn backward(
        &self,
        inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>>;
}
