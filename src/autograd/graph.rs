//! Define-by-run computation graph
//!
//! The graph owns every variable and every recorded function application.
//! Functions refer to their inputs and outputs by handle and variables refer
//! to their creator by handle, so there are no reference cycles and cutting
//! a link is a handle write.

use super::variable::{Arena, FunctionNode, VariableNode};
use super::{Context, Function, FunctionId, Variable};
use crate::error::{Error, Result};
use crate::Tensor;
use log::trace;

/// Arena holding variables and function applications
#[derive(Debug)]
pub struct Graph {
    pub(crate) variables: Arena<VariableNode>,
    pub(crate) functions: Arena<FunctionNode>,
    next_sequence: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            variables: Arena::new(),
            functions: Arena::new(),
            next_sequence: 0,
        }
    }

    /// Create a leaf variable
    pub fn leaf(&mut self, value: Tensor, name: Option<&str>, requires_grad: bool) -> Variable {
        let node = VariableNode::leaf(value, name.map(str::to_owned), requires_grad);
        Variable(self.variables.insert(node))
    }

    /// Create a leaf that requires gradients
    pub fn param(&mut self, value: Tensor) -> Variable {
        self.leaf(value, None, true)
    }

    /// Create a constant leaf (no gradient is ever accumulated into it)
    pub fn constant(&mut self, value: Tensor) -> Variable {
        self.leaf(value, None, false)
    }

    /// Apply a single-output function
    pub fn apply<F: Function + 'static>(
        &mut self,
        ctx: &Context,
        op: F,
        inputs: &[Variable],
    ) -> Result<Variable> {
        let mut outputs = self.apply_inner(ctx, op, inputs, true)?;
        outputs
            .pop()
            .ok_or_else(|| Error::InvalidParameter("apply() produced no output".to_owned()))
    }

    /// Apply a function and return all of its outputs
    ///
    /// In training mode, with at least one input that requires gradients or
    /// has a creator, the application is recorded and the outputs link back
    /// to it. Otherwise the outputs are detached constants and no input
    /// handle is kept.
    pub fn apply_multi<F: Function + 'static>(
        &mut self,
        ctx: &Context,
        op: F,
        inputs: &[Variable],
    ) -> Result<Vec<Variable>> {
        self.apply_inner(ctx, op, inputs, false)
    }

    /// Every check runs before the first arena insertion, so a failed
    /// application leaves the graph as it was.
    fn apply_inner<F: Function + 'static>(
        &mut self,
        ctx: &Context,
        mut op: F,
        inputs: &[Variable],
        expect_single: bool,
    ) -> Result<Vec<Variable>> {
        let name = op.name();
        if inputs.len() != op.arity() {
            return Err(Error::InputArity {
                op: name,
                expected: op.arity(),
                got: inputs.len(),
            });
        }

        let mut record = false;
        let mut generation = 0;
        let values = {
            let mut nodes = Vec::with_capacity(inputs.len());
            for &input in inputs {
                let node = self.node(input)?;
                record |= node.is_graph_eligible();
                generation = generation.max(node.generation);
                nodes.push(&node.value);
            }
            op.forward(&nodes)?
        };

        if values.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "{name}: forward produced no outputs"
            )));
        }
        if expect_single && values.len() != 1 {
            return Err(Error::InvalidParameter(format!(
                "{name}: apply() expects one output, got {}; use apply_multi()",
                values.len()
            )));
        }

        if !ctx.is_training() || !record {
            return Ok(values
                .into_iter()
                .map(|value| Variable(self.variables.insert(VariableNode::leaf(value, None, false))))
                .collect());
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let id = FunctionId(self.functions.insert(FunctionNode {
            op: Box::new(op),
            inputs: inputs.to_vec(),
            outputs: Vec::new(),
            generation,
            sequence,
        }));

        let outputs: Vec<Variable> = values
            .into_iter()
            .map(|value| {
                Variable(self.variables.insert(VariableNode {
                    value,
                    grad: None,
                    creator: Some(id),
                    generation: generation + 1,
                    requires_grad: true,
                    name: None,
                }))
            })
            .collect();

        if let Some(func) = self.functions.get_mut(id.0) {
            func.outputs = outputs.clone();
        }

        trace!("recorded {name} as {id} (generation {generation}, {} outputs)", outputs.len());
        Ok(outputs)
    }

    pub(crate) fn node(&self, var: Variable) -> Result<&VariableNode> {
        self.variables
            .get(var.0)
            .ok_or_else(|| Error::StaleHandle(var.to_string()))
    }

    pub(crate) fn node_mut(&mut self, var: Variable) -> Result<&mut VariableNode> {
        self.variables
            .get_mut(var.0)
            .ok_or_else(|| Error::StaleHandle(var.to_string()))
    }

    pub(crate) fn function(&self, id: FunctionId) -> Result<&FunctionNode> {
        self.functions
            .get(id.0)
            .ok_or_else(|| Error::StaleHandle(id.to_string()))
    }

    /// Get reference to the value
    pub fn value(&self, var: Variable) -> Result<&Tensor> {
        Ok(&self.node(var)?.value)
    }

    /// Replace the value, keeping grad and creator
    ///
    /// A free leaf may change shape. A variable with a creator, or one that
    /// is an input of a recorded function, keeps its shape because the
    /// recorded backward ops were built against it.
    pub fn set_value(&mut self, var: Variable, value: Tensor) -> Result<()> {
        let node = self.node(var)?;
        if value.shape() != node.value.shape() && (node.creator.is_some() || self.is_linked(var)) {
            return Err(Error::ShapeMismatch {
                op: "set_value",
                expected: node.value.shape().to_vec(),
                got: value.shape().to_vec(),
            });
        }
        self.node_mut(var)?.value = value;
        Ok(())
    }

    /// Whether any live function reads or produced `var`
    fn is_linked(&self, var: Variable) -> bool {
        self.functions.keys().into_iter().any(|key| {
            self.functions
                .get(key)
                .is_some_and(|func| func.inputs.contains(&var) || func.outputs.contains(&var))
        })
    }

    /// Get gradient (if any has been accumulated)
    pub fn grad(&self, var: Variable) -> Result<Option<&Tensor>> {
        Ok(self.node(var)?.grad.as_ref())
    }

    /// Set gradient, which must have the shape of the value
    pub fn set_grad(&mut self, var: Variable, grad: Tensor) -> Result<()> {
        let node = self.node_mut(var)?;
        if grad.shape() != node.value.shape() {
            return Err(Error::ShapeMismatch {
                op: "set_grad",
                expected: node.value.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        node.grad = Some(grad);
        Ok(())
    }

    /// Reset the gradient to absent (not to zeros)
    pub fn clear_grad(&mut self, var: Variable) -> Result<()> {
        self.node_mut(var)?.grad = None;
        Ok(())
    }

    /// Reset every gradient in the graph
    pub fn clear_grads(&mut self) {
        for key in self.variables.keys() {
            if let Some(node) = self.variables.get_mut(key) {
                node.grad = None;
            }
        }
    }

    /// Function that produced this variable, `None` for leaves
    pub fn creator(&self, var: Variable) -> Result<Option<FunctionId>> {
        Ok(self.node(var)?.creator)
    }

    pub fn generation(&self, var: Variable) -> Result<u32> {
        Ok(self.node(var)?.generation)
    }

    pub fn requires_grad(&self, var: Variable) -> Result<bool> {
        Ok(self.node(var)?.requires_grad)
    }

    pub fn set_requires_grad(&mut self, var: Variable, requires_grad: bool) -> Result<()> {
        self.node_mut(var)?.requires_grad = requires_grad;
        Ok(())
    }

    pub fn name(&self, var: Variable) -> Result<Option<&str>> {
        Ok(self.node(var)?.name.as_deref())
    }

    pub fn set_name(&mut self, var: Variable, name: &str) -> Result<()> {
        self.node_mut(var)?.name = Some(name.to_owned());
        Ok(())
    }

    /// Operation name of a recorded function
    pub fn function_name(&self, id: FunctionId) -> Result<&'static str> {
        Ok(self.function(id)?.op.name())
    }

    pub fn function_inputs(&self, id: FunctionId) -> Result<&[Variable]> {
        Ok(&self.function(id)?.inputs)
    }

    pub fn function_outputs(&self, id: FunctionId) -> Result<&[Variable]> {
        Ok(&self.function(id)?.outputs)
    }

    pub fn function_generation(&self, id: FunctionId) -> Result<u32> {
        Ok(self.function(id)?.generation)
    }

    /// Number of live variables
    pub fn len_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of live function applications
    pub fn len_functions(&self) -> usize {
        self.functions.len()
    }

    /// Free every node; all outstanding handles become stale
    pub fn clear(&mut self) {
        for key in self.functions.keys() {
            self.functions.remove(key);
        }
        for key in self.variables.keys() {
            self.variables.remove(key);
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
