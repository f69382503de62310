//! Pass-local gradient staging
//!
//! A backward pass accumulates into a `GradStore` and only writes into the
//! graph once every function has been differentiated, so a failing pass
//! leaves the graph's gradients as they were.

use super::Variable;
use crate::Tensor;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct GradStore {
    grads: HashMap<Variable, Tensor>,
}

impl GradStore {
    pub(crate) fn new() -> Self {
        Self {
            grads: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, var: Variable) -> Option<&Tensor> {
        self.grads.get(&var)
    }

    pub(crate) fn contains(&self, var: Variable) -> bool {
        self.grads.contains_key(&var)
    }

    pub(crate) fn insert(&mut self, var: Variable, grad: Tensor) {
        self.grads.insert(var, grad);
    }

    pub(crate) fn remove(&mut self, var: Variable) -> Option<Tensor> {
        self.grads.remove(&var)
    }

    /// Add `grad` to the staged gradient of `var`, or stage it if none exists
    ///
    /// `grad` must already have the shape of `var`'s value.
    pub(crate) fn accumulate(&mut self, var: Variable, grad: Tensor) {
        match self.grads.get_mut(&var) {
            Some(existing) => *existing += &grad,
            None => {
                self.grads.insert(var, grad);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.grads.len()
    }

    pub(crate) fn into_inner(self) -> HashMap<Variable, Tensor> {
        self.grads
    }
}
