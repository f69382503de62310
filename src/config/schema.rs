//! YAML schema definitions

use crate::autograd::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Graph construction and backward settings
    pub context: Context,

    /// Optional optimizer configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimSpec>,
}

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSpec {
    /// Optimizer name: "sgd" | "adam"
    pub name: String,

    /// Learning rate
    pub lr: f32,

    /// Optimizer-specific parameters (momentum, beta1, beta2, eps)
    #[serde(flatten)]
    pub params: HashMap<String, serde_yaml::Value>,
}

impl OptimSpec {
    /// Numeric parameter by name, or `default` when absent
    pub(crate) fn param_or(&self, key: &str, default: f32) -> f32 {
        self.params
            .get(key)
            .and_then(serde_yaml::Value::as_f64)
            .map_or(default, |v| v as f32)
    }
}
