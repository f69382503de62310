//! Build optimizers from configuration

use super::schema::OptimSpec;
use crate::error::{Error, Result};
use crate::optim::{Adam, Optimizer, SGD};

/// Build optimizer from configuration
pub fn build_optimizer(spec: &OptimSpec) -> Result<Box<dyn Optimizer>> {
    match spec.name.to_lowercase().as_str() {
        "sgd" => {
            let momentum = spec.param_or("momentum", 0.0);
            Ok(Box::new(SGD::new(spec.lr, momentum)))
        }
        "adam" => {
            let beta1 = spec.param_or("beta1", 0.9);
            let beta2 = spec.param_or("beta2", 0.999);
            let eps = spec.param_or("eps", 1e-8);
            Ok(Box::new(Adam::new(spec.lr, beta1, beta2, eps)))
        }
        other => Err(Error::ConfigError(format!("Unknown optimizer: {}", other))),
    }
}
