//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! context:
//!   training: true
//!   strategy: recursive
//!   max_recursion_depth: 8192
//!
//! optimizer:
//!   name: sgd
//!   lr: 0.05
//!   momentum: 0.9
//! ```
//!
//! Every section is optional; missing fields take their defaults.

mod builder;
mod loader;
mod schema;
mod validate;

#[cfg(test)]
mod tests;


pub use builder::build_optimizer;
pub use loader::{load_config, parse_config};
pub use schema::{EngineConfig, OptimSpec};
pub use validate::{validate_config, ValidationError};
