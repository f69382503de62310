//! Backward pass implementation
//!
//! Functions are differentiated in descending generation order. A variable's
//! generation is one more than its creator's, and a function's generation is
//! the max over its inputs, so every function that can still add to a
//! variable's gradient has a strictly higher generation than the variable's
//! creator. By the time the creator is reached the gradient is complete.
//!
//! Two realizations share the per-function step:
//! - iterative: a max-heap worklist, safe for arbitrarily deep graphs
//! - recursive: depth-first discovery bounded by the context's depth limit
//!
//! Ties in generation are broken by creation order, so both variants process
//! exactly the same sequence and produce bit-identical gradients.

use super::grad_store::GradStore;
use super::shape::sum_to;
use super::{BackwardStrategy, Context, FunctionId, Graph, Variable};
use crate::error::{Error, Result};
use crate::Tensor;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Options for a single backward pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardOptions {
    /// Keep gradients of intermediate variables (and the terminal's seed)
    pub retain_graph: bool,
    /// Override the context's strategy for this pass
    pub strategy: Option<BackwardStrategy>,
}

impl BackwardOptions {
    pub fn retain() -> Self {
        Self {
            retain_graph: true,
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: BackwardStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Worklist entry ordered by generation, then earliest creation first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    generation: u32,
    sequence: u64,
    id: FunctionId,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.generation
            .cmp(&other.generation)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Graph {
    /// Backpropagate from `var` using the context's strategy
    ///
    /// `var` is seeded with its current gradient if one was set, otherwise
    /// with ones shaped like its value. Gradients accumulate into leaves
    /// that require them; intermediate gradients are kept only with
    /// `retain_graph`.
    ///
    /// # Errors
    ///
    /// - `NoGraph` if the context is in inference mode or `var` has no creator
    /// - `BroadcastReduction` if a gradient cannot be summed to its target shape
    /// - `RecursionLimit` if the recursive strategy exceeds its depth limit
    ///
    /// On error no gradient in the graph is modified.
    pub fn backward(&mut self, ctx: &Context, var: Variable, retain_graph: bool) -> Result<()> {
        self.backward_with(
            ctx,
            var,
            BackwardOptions {
                retain_graph,
                strategy: None,
            },
        )
    }

    pub fn backward_with(
        &mut self,
        ctx: &Context,
        var: Variable,
        options: BackwardOptions,
    ) -> Result<()> {
        if !ctx.is_training() {
            return Err(Error::NoGraph(format!(
                "backward() on {var} with graph construction disabled"
            )));
        }

        let node = self.node(var)?;
        let creator = node
            .creator
            .ok_or_else(|| Error::NoGraph(format!("{var} has no creator")))?;
        let seed = match &node.grad {
            Some(grad) => grad.clone(),
            None => Tensor::ones(node.value.raw_dim()),
        };

        let strategy = options.strategy.unwrap_or(ctx.strategy());
        debug!("backward from {var} ({strategy:?}, retain_graph={})", options.retain_graph);

        let mut store = GradStore::new();
        store.insert(var, seed.clone());

        let processed = match strategy {
            BackwardStrategy::Iterative => {
                self.run_iterative(creator, &mut store, options.retain_graph)?
            }
            BackwardStrategy::Recursive => self.run_recursive(
                creator,
                ctx.max_recursion_depth(),
                &mut store,
                options.retain_graph,
            )?,
        };

        debug!("backward processed {processed} functions, {} staged gradients", store.len());
        self.commit(var, seed, store, options.retain_graph)
    }

    fn candidate(&self, id: FunctionId) -> Result<Candidate> {
        let func = self.function(id)?;
        Ok(Candidate {
            generation: func.generation,
            sequence: func.sequence,
            id,
        })
    }

    fn run_iterative(
        &self,
        start: FunctionId,
        store: &mut GradStore,
        retain_graph: bool,
    ) -> Result<usize> {
        let mut heap = BinaryHeap::new();
        let mut seen = HashSet::new();
        heap.push(self.candidate(start)?);
        seen.insert(start);

        let mut processed = 0;
        while let Some(candidate) = heap.pop() {
            for next in self.differentiate(candidate.id, store, retain_graph)? {
                if seen.insert(next) {
                    heap.push(self.candidate(next)?);
                }
            }
            processed += 1;
        }
        Ok(processed)
    }

    fn run_recursive(
        &self,
        start: FunctionId,
        limit: usize,
        store: &mut GradStore,
        retain_graph: bool,
    ) -> Result<usize> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.discover(start, 1, limit, &mut visited, &mut order)?;

        // Descending, same order the heap pops in
        order.sort_by(|a, b| b.cmp(a));
        for candidate in &order {
            self.differentiate(candidate.id, store, retain_graph)?;
        }
        Ok(order.len())
    }

    fn discover(
        &self,
        id: FunctionId,
        depth: usize,
        limit: usize,
        visited: &mut HashSet<FunctionId>,
        order: &mut Vec<Candidate>,
    ) -> Result<()> {
        if depth > limit {
            return Err(Error::RecursionLimit { limit });
        }
        if !visited.insert(id) {
            return Ok(());
        }

        let candidate = self.candidate(id)?;
        order.push(candidate);

        for &input in &self.function(id)?.inputs {
            let Some(creator) = self.node(input)?.creator else {
                continue;
            };
            if visited.contains(&creator) {
                continue;
            }
            let child = self.candidate(creator)?;
            if child.generation >= candidate.generation {
                return Err(Error::BackwardFailed(format!(
                    "{creator} (generation {}) feeds {id} (generation {})",
                    child.generation, candidate.generation
                )));
            }
            self.discover(creator, depth + 1, limit, visited, order)?;
        }
        Ok(())
    }

    /// Differentiate one function and stage its input gradients
    ///
    /// Returns the creators of inputs that received a gradient. A function
    /// none of whose attached outputs has a staged gradient is skipped.
    fn differentiate(
        &self,
        id: FunctionId,
        store: &mut GradStore,
        retain_graph: bool,
    ) -> Result<Vec<FunctionId>> {
        let func = self.function(id)?;
        let name = func.op.name();

        let mut outputs = Vec::with_capacity(func.outputs.len());
        let mut attached = Vec::with_capacity(func.outputs.len());
        for &output in &func.outputs {
            let node = self.node(output)?;
            outputs.push(&node.value);
            attached.push(node.creator == Some(id));
        }

        if !func
            .outputs
            .iter()
            .zip(&attached)
            .any(|(&output, &linked)| linked && store.contains(output))
        {
            trace!("skipping {name} ({id}): no gradient reached its outputs");
            return Ok(Vec::new());
        }

        let grad_outputs: Vec<Tensor> = func
            .outputs
            .iter()
            .zip(&attached)
            .zip(&outputs)
            .map(|((&output, &linked), value)| {
                let staged = if !linked {
                    None
                } else if retain_graph {
                    store.get(output).cloned()
                } else {
                    store.remove(output)
                };
                staged.unwrap_or_else(|| Tensor::zeros(value.raw_dim()))
            })
            .collect();
        let grad_refs: Vec<&Tensor> = grad_outputs.iter().collect();

        let mut inputs = Vec::with_capacity(func.inputs.len());
        for &input in &func.inputs {
            inputs.push(&self.node(input)?.value);
        }

        trace!("differentiating {name} ({id}, generation {})", func.generation);
        let input_grads = func.op.backward(&inputs, &outputs, &grad_refs)?;
        if input_grads.len() != func.inputs.len() {
            return Err(Error::BackwardFailed(format!(
                "{name}: returned {} gradients for {} inputs",
                input_grads.len(),
                func.inputs.len()
            )));
        }

        let mut discovered = Vec::new();
        for (&input, grad) in func.inputs.iter().zip(input_grads) {
            let Some(grad) = grad else {
                continue;
            };
            let node = self.node(input)?;
            if node.creator.is_none() && !node.requires_grad {
                continue;
            }
            store.accumulate(input, sum_to(&grad, node.value.shape())?);
            if let Some(creator) = node.creator {
                discovered.push(creator);
            }
        }
        Ok(discovered)
    }

    /// Write staged gradients into the graph
    fn commit(
        &mut self,
        terminal: Variable,
        seed: Tensor,
        store: GradStore,
        retain_graph: bool,
    ) -> Result<()> {
        let mut updates = Vec::new();
        for (var, grad) in store.into_inner() {
            if var == terminal {
                continue;
            }
            let node = self.node(var)?;
            if node.creator.is_some() && !retain_graph {
                continue;
            }
            if let Some(existing) = &node.grad {
                if existing.shape() != grad.shape() {
                    return Err(Error::ShapeMismatch {
                        op: "accumulate_grad",
                        expected: existing.shape().to_vec(),
                        got: grad.shape().to_vec(),
                    });
                }
            }
            updates.push((var, grad));
        }

        for (var, grad) in updates {
            let node = self.node_mut(var)?;
            match node.grad.as_mut() {
                Some(existing) => *existing += &grad,
                None => node.grad = Some(grad),
            }
        }

        if retain_graph {
            self.node_mut(terminal)?.grad = Some(seed);
        }
        Ok(())
    }
}
