//! Execution context for graph construction and backward passes

use serde::{Deserialize, Serialize};

/// How the backward scheduler walks the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackwardStrategy {
    /// Explicit generation-ordered worklist, no recursion
    #[default]
    Iterative,
    /// Depth-first recursive discovery, bounded by `max_recursion_depth`
    Recursive,
}

/// Context threaded through every `apply` and `backward` call
///
/// Replaces a process-wide training flag: two graphs on two threads can
/// run with different modes without sharing any state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    training: bool,
    strategy: BackwardStrategy,
    max_recursion_depth: usize,
}

impl Context {
    /// Create a new context in training mode
    pub fn new() -> Self {
        Self {
            training: true,
            strategy: BackwardStrategy::Iterative,
            max_recursion_depth: 4096,
        }
    }

    /// Create a context in inference mode (no graph is recorded)
    pub fn inference() -> Self {
        Self {
            training: false,
            ..Self::new()
        }
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn with_strategy(mut self, strategy: BackwardStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn strategy(&self) -> BackwardStrategy {
        self.strategy
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_training_iterative() {
        let ctx = Context::default();
        assert!(ctx.is_training());
        assert_eq!(ctx.strategy(), BackwardStrategy::Iterative);
        assert_eq!(ctx.max_recursion_depth(), 4096);
    }

    #[test]
    fn test_train_eval_toggle() {
        let mut ctx = Context::new();
        ctx.eval();
        assert!(!ctx.is_training());
        ctx.train();
        assert!(ctx.is_training());
        assert!(!Context::inference().is_training());
    }

    #[test]
    fn test_yaml_partial_fields_use_defaults() {
        let ctx: Context = serde_yaml::from_str("strategy: recursive\n").unwrap();
        assert!(ctx.is_training());
        assert_eq!(ctx.strategy(), BackwardStrategy::Recursive);
        assert_eq!(ctx.max_recursion_depth(), 4096);
    }
}
