//! Adam optimizer

use super::Optimizer;
use crate::autograd::{Graph, Variable};
use crate::error::Result;
use crate::Tensor;

/// Adam optimizer (Adaptive Moment Estimation)
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Tensor>>, // First moment
    v: Vec<Option<Tensor>>, // Second moment
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with default parameters
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Initialize moments if needed
    fn ensure_moments(&mut self, params: &[Variable]) {
        if self.m.len() != params.len() {
            self.m = params.iter().map(|_| None).collect();
            self.v = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, graph: &mut Graph, params: &[Variable]) -> Result<()> {
        self.ensure_moments(params);
        self.t += 1;

        // Bias correction factors
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, &param) in params.iter().enumerate() {
            let Some(grad) = graph.grad(param)? else {
                continue;
            };

            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = match &self.m[i] {
                Some(m) if m.shape() == grad.shape() => m * self.beta1 + grad * (1.0 - self.beta1),
                _ => grad * (1.0 - self.beta1),
            };

            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = grad * grad;
            let v_t = match &self.v[i] {
                Some(v) if v.shape() == grad.shape() => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
                _ => &grad_sq * (1.0 - self.beta2),
            };

            // θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
            let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
            let updated = graph.value(param)? - &update;
            graph.set_value(param, updated)?;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
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
