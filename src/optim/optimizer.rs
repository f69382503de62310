//! Optimizer trait

use crate::autograd::{Graph, Variable};
use crate::error::Result;

/// Trait for optimization algorithms
///
/// Parameters are graph handles; the optimizer reads each one's gradient and
/// writes the updated value back. Parameters without a gradient are left
/// alone. Per-parameter state is kept by position in `params`.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, graph: &mut Graph, params: &[Variable]) -> Result<()>;

    /// Reset all gradients to absent
    fn zero_grad(&mut self, graph: &mut Graph, params: &[Variable]) -> Result<()> {
        for &param in params {
            graph.clear_grad(param)?;
        }
        Ok(())
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
