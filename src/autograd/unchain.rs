//! Graph lifecycle: cutting creator links and freeing unreachable nodes

use super::{FunctionId, Graph, Variable};
use crate::error::Result;
use log::debug;
use std::collections::HashSet;

impl Graph {
    /// Cut `var` off from its creator; the value is kept and `var` becomes a leaf
    ///
    /// The creator's slot is freed once none of its outputs link to it.
    pub fn unchain(&mut self, var: Variable) -> Result<()> {
        let node = self.node_mut(var)?;
        let Some(creator) = node.creator.take() else {
            return Ok(());
        };
        node.generation = 0;
        self.release_if_orphaned(creator);
        Ok(())
    }

    fn release_if_orphaned(&mut self, id: FunctionId) {
        let Some(func) = self.functions.get(id.0) else {
            return;
        };
        let linked = func.outputs.iter().any(|&output| {
            self.variables
                .get(output.0)
                .is_some_and(|node| node.creator == Some(id))
        });
        if !linked {
            self.functions.remove(id.0);
        }
    }

    /// Unchain every function reachable backward from `var`, `var` included
    ///
    /// Afterwards no variable upstream of `var` has a creator. Each function
    /// is visited once, however many paths lead to it. Returns the number of
    /// functions released.
    pub fn unchain_backward(&mut self, var: Variable) -> Result<usize> {
        let Some(start) = self.node(var)?.creator else {
            return Ok(0);
        };

        let mut candidates = vec![start];
        let mut seen = HashSet::from([start]);
        let mut released = 0;

        while let Some(id) = candidates.pop() {
            let Some(func) = self.functions.remove(id.0) else {
                continue;
            };

            for &input in &func.inputs {
                if let Some(creator) = self.variables.get(input.0).and_then(|node| node.creator) {
                    if seen.insert(creator) {
                        candidates.push(creator);
                    }
                }
            }

            for &output in &func.outputs {
                if let Some(node) = self.variables.get_mut(output.0) {
                    if node.creator == Some(id) {
                        node.creator = None;
                        node.generation = 0;
                    }
                }
            }
            released += 1;
        }

        debug!("unchain_backward from {var} released {released} functions");
        Ok(released)
    }

    /// Free every node not reachable from `live`
    ///
    /// Reachability follows creator links and function inputs and outputs,
    /// so everything needed to backpropagate from a live variable is kept.
    /// Handles to freed nodes become stale. Returns the number of freed
    /// slots (variables plus functions).
    pub fn collect_garbage(&mut self, live: &[Variable]) -> usize {
        let mut live_vars = HashSet::new();
        let mut live_funcs = HashSet::new();
        let mut stack: Vec<Variable> = live
            .iter()
            .copied()
            .filter(|var| self.variables.get(var.0).is_some())
            .collect();

        while let Some(var) = stack.pop() {
            if !live_vars.insert(var) {
                continue;
            }
            let Some(creator) = self.variables.get(var.0).and_then(|node| node.creator) else {
                continue;
            };
            if !live_funcs.insert(creator) {
                continue;
            }
            if let Some(func) = self.functions.get(creator.0) {
                stack.extend(func.inputs.iter().chain(&func.outputs).copied());
            }
        }

        let mut freed = 0;
        for key in self.functions.keys() {
            if !live_funcs.contains(&FunctionId(key)) {
                self.functions.remove(key);
                freed += 1;
            }
        }
        for key in self.variables.keys() {
            if !live_vars.contains(&Variable(key)) {
                self.variables.remove(key);
                freed += 1;
            }
        }

        debug!(
            "collect_garbage kept {} variables, {} functions; freed {freed} slots",
            live_vars.len(),
            live_funcs.len()
        );
        freed
    }
}
