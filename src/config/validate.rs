//! Configuration validation

use super::schema::EngineConfig;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid max_recursion_depth: {0} (must be > 0)")]
    InvalidRecursionDepth(usize),

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid momentum: {0} (must be in [0.0, 1.0))")]
    InvalidMomentum(f32),

    #[error("Invalid optimizer: {0} (must be one of: adam, sgd)")]
    InvalidOptimizer(String),
}

/// Validate an engine configuration
///
/// Checks:
/// - The recursion depth limit is positive
/// - Optimizer name, learning rate and momentum are in range
pub fn validate_config(config: &EngineConfig) -> Result<(), ValidationError> {
    let depth = config.context.max_recursion_depth();
    if depth == 0 {
        return Err(ValidationError::InvalidRecursionDepth(depth));
    }

    if let Some(optimizer) = &config.optimizer {
        let name = optimizer.name.to_lowercase();
        if !matches!(name.as_str(), "adam" | "sgd") {
            return Err(ValidationError::InvalidOptimizer(optimizer.name.clone()));
        }

        if optimizer.lr <= 0.0 || !optimizer.lr.is_finite() {
            return Err(ValidationError::InvalidLearningRate(optimizer.lr));
        }

        let momentum = optimizer.param_or("momentum", 0.0);
        if !(0.0..1.0).contains(&momentum) {
            return Err(ValidationError::InvalidMomentum(momentum));
        }
    }

    Ok(())
}
