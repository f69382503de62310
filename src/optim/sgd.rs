//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::autograd::{Graph, Variable};
use crate::error::Result;
use crate::Tensor;

/// SGD optimizer with optional momentum
#[derive(Debug)]
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Tensor>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    /// Initialize velocities if needed
    fn ensure_velocities(&mut self, params: &[Variable]) {
        if self.velocities.len() != params.len() {
            self.velocities = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, graph: &mut Graph, params: &[Variable]) -> Result<()> {
        self.ensure_velocities(params);

        for (i, &param) in params.iter().enumerate() {
            let Some(grad) = graph.grad(param)? else {
                continue;
            };

            let updated = if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match &self.velocities[i] {
                    Some(v) if v.shape() == grad.shape() => v * self.momentum - grad * self.lr,
                    _ => grad * (-self.lr),
                };

                let updated = graph.value(param)? + &velocity;
                self.velocities[i] = Some(velocity);
                updated
            } else {
                // Simple SGD: param -= lr * grad
                graph.value(param)? - &(grad * self.lr)
            };

            graph.set_value(param, updated)?;
        }
        Ok(())
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
