//! Autograd operations with backward passes
//!
//! Each operation is a [`Function`] struct plus a free function that applies
//! it to a graph. Binary elementwise operations broadcast NumPy-style; their
//! backward returns gradients in the broadcast shape and the scheduler sums
//! them back to each input's shape.

use super::shape::{broadcast_shape, broadcast_to, sum_to};
use super::{Context, Function, Graph, Variable};
use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::{ArrayD, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn, Slice, Zip};

fn expand<'a>(op: &'static str, t: &'a Tensor, shape: &[usize]) -> Result<ArrayViewD<'a, f32>> {
    t.broadcast(IxDyn(shape)).ok_or_else(|| Error::ShapeMismatch {
        op,
        expected: shape.to_vec(),
        got: t.shape().to_vec(),
    })
}

fn same_shape(op: &'static str, a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            op,
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }
    Ok(())
}

fn scalar(value: f32) -> Tensor {
    ArrayD::from_elem(IxDyn(&[]), value)
}

fn as_matrix<'a>(op: &'static str, t: &'a Tensor) -> Result<ArrayView2<'a, f32>> {
    t.view().into_dimensionality::<Ix2>().map_err(|_| {
        Error::InvalidParameter(format!("{op}: expected a 2-D tensor, got shape {:?}", t.shape()))
    })
}

fn reshape(op: &'static str, t: &Tensor, shape: &[usize]) -> Result<Tensor> {
    let mismatch = || Error::ShapeMismatch {
        op,
        expected: shape.to_vec(),
        got: t.shape().to_vec(),
    };
    if shape.iter().product::<usize>() != t.len() {
        return Err(mismatch());
    }
    t.as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(shape))
        .map_err(|_| mismatch())
}

/// Broadcast both operands to their common shape
fn broadcast_pair<'a>(
    op: &'static str,
    a: &'a Tensor,
    b: &'a Tensor,
) -> Result<(ArrayViewD<'a, f32>, ArrayViewD<'a, f32>)> {
    let shape = broadcast_shape(op, a.shape(), b.shape())?;
    Ok((expand(op, a, &shape)?, expand(op, b, &shape)?))
}

// ---------------------------------------------------------------------------
// Binary elementwise
// ---------------------------------------------------------------------------

/// Elementwise addition with broadcasting
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Function for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let (a, b) = broadcast_pair(self.name(), inputs[0], inputs[1])?;
        Ok(vec![&a + &b])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂L/∂a = ∂L/∂b = ∂L/∂out
        let grad = grad_outputs[0];
        Ok(vec![Some(grad.clone()), Some(grad.clone())])
    }
}

/// Elementwise subtraction with broadcasting
#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

impl Function for Sub {
    fn name(&self) -> &'static str {
        "sub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let (a, b) = broadcast_pair(self.name(), inputs[0], inputs[1])?;
        Ok(vec![&a - &b])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = grad_outputs[0];
        Ok(vec![Some(grad.clone()), Some(grad.mapv(|g| -g))])
    }
}

/// Elementwise multiplication with broadcasting
#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

impl Function for Mul {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let (a, b) = broadcast_pair(self.name(), inputs[0], inputs[1])?;
        Ok(vec![&a * &b])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = grad_outputs[0];
        let a = expand(self.name(), inputs[0], grad.shape())?;
        let b = expand(self.name(), inputs[1], grad.shape())?;

        // ∂L/∂a = ∂L/∂out * b, ∂L/∂b = ∂L/∂out * a
        Ok(vec![Some(grad * &b), Some(grad * &a)])
    }
}

/// Elementwise division with broadcasting
#[derive(Debug, Clone, Copy, Default)]
pub struct Div;

impl Function for Div {
    fn name(&self) -> &'static str {
        "div"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let (a, b) = broadcast_pair(self.name(), inputs[0], inputs[1])?;
        Ok(vec![&a / &b])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = grad_outputs[0];
        let a = expand(self.name(), inputs[0], grad.shape())?;
        let b = expand(self.name(), inputs[1], grad.shape())?;

        let grad_a = Zip::from(grad).and(&b).map_collect(|&g, &b| g / b);
        // ∂(a/b)/∂b = -a / b²
        let grad_b = Zip::from(grad)
            .and(&a)
            .and(&b)
            .map_collect(|&g, &a, &b| -g * a / (b * b));
        Ok(vec![Some(grad_a), Some(grad_b)])
    }
}

// ---------------------------------------------------------------------------
// Unary elementwise
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct Neg;

impl Function for Neg {
    fn name(&self) -> &'static str {
        "neg"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| -x)])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(grad_outputs[0].mapv(|g| -g))])
    }
}

/// Multiply by a constant factor
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub factor: f32,
}

impl Function for Scale {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0] * self.factor])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂L/∂a = ∂L/∂out * factor
        Ok(vec![Some(grad_outputs[0] * self.factor)])
    }
}

/// Add a constant to every element
#[derive(Debug, Clone, Copy)]
pub struct AddScalar {
    pub value: f32,
}

impl Function for AddScalar {
    fn name(&self) -> &'static str {
        "add_scalar"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0] + self.value])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(grad_outputs[0].clone())])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Square;

impl Function for Square {
    fn name(&self) -> &'static str {
        "square"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| x * x)])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = Zip::from(inputs[0])
            .and(grad_outputs[0])
            .map_collect(|&x, &g| 2.0 * x * g);
        Ok(vec![Some(grad)])
    }
}

/// Raise every element to a constant power
#[derive(Debug, Clone, Copy)]
pub struct Pow {
    pub exponent: f32,
}

impl Function for Pow {
    fn name(&self) -> &'static str {
        "pow"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let p = self.exponent;
        Ok(vec![inputs[0].mapv(|x| x.powf(p))])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let p = self.exponent;
        let grad = Zip::from(inputs[0])
            .and(grad_outputs[0])
            .map_collect(|&x, &g| p * x.powf(p - 1.0) * g);
        Ok(vec![Some(grad)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Exp;

impl Function for Exp {
    fn name(&self) -> &'static str {
        "exp"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(f32::exp)])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(outputs[0] * grad_outputs[0])])
    }
}

/// Natural logarithm
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl Function for Log {
    fn name(&self) -> &'static str {
        "log"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(f32::ln)])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(grad_outputs[0] / inputs[0])])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Function for Tanh {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(f32::tanh)])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = Zip::from(outputs[0])
            .and(grad_outputs[0])
            .map_collect(|&y, &g| (1.0 - y * y) * g);
        Ok(vec![Some(grad)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Function for Sigmoid {
    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| 1.0 / (1.0 + (-x).exp()))])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = Zip::from(outputs[0])
            .and(grad_outputs[0])
            .map_collect(|&y, &g| y * (1.0 - y) * g);
        Ok(vec![Some(grad)])
    }
}

/// ReLU activation
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Function for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| x.max(0.0))])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂L/∂a = ∂L/∂out * (a > 0)
        let grad = Zip::from(inputs[0])
            .and(grad_outputs[0])
            .map_collect(|&x, &g| if x > 0.0 { g } else { 0.0 });
        Ok(vec![Some(grad)])
    }
}

const SQRT_2_OVER_PI: f32 = 0.797_884_6; // √(2/π)
const GELU_COEFF: f32 = 0.044_715;

/// GELU activation (Gaussian Error Linear Unit), tanh approximation
///
/// GELU(x) ≈ 0.5 * x * (1 + tanh(√(2/π) * (x + 0.044715 * x³)))
#[derive(Debug, Clone, Copy, Default)]
pub struct Gelu;

impl Function for Gelu {
    fn name(&self) -> &'static str {
        "gelu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| {
            let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
            0.5 * x * (1.0 + inner.tanh())
        })])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂GELU/∂x = 0.5 * (1 + tanh(z)) + 0.5 * x * sech²(z) * dz/dx
        // where z = √(2/π) * (x + 0.044715 * x³)
        let grad = Zip::from(inputs[0])
            .and(grad_outputs[0])
            .map_collect(|&x, &g| {
                let x2 = x * x;
                let z = SQRT_2_OVER_PI * (x + GELU_COEFF * x2 * x);
                let tanh_z = z.tanh();
                let sech2_z = 1.0 - tanh_z * tanh_z;
                let dz_dx = SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_COEFF * x2);
                g * (0.5 * (1.0 + tanh_z) + 0.5 * x * sech2_z * dz_dx)
            });
        Ok(vec![Some(grad)])
    }
}

/// Swish activation (also known as SiLU)
///
/// Swish(x) = x * sigmoid(x)
#[derive(Debug, Clone, Copy, Default)]
pub struct Swish;

impl Function for Swish {
    fn name(&self) -> &'static str {
        "swish"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0].mapv(|x| x / (1.0 + (-x).exp()))])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂Swish/∂x = Swish(x) + sigmoid(x) * (1 - Swish(x))
        let grad = Zip::from(inputs[0])
            .and(outputs[0])
            .and(grad_outputs[0])
            .map_collect(|&x, &y, &g| {
                let sigmoid = 1.0 / (1.0 + (-x).exp());
                g * (y + sigmoid * (1.0 - y))
            });
        Ok(vec![Some(grad)])
    }
}

// ---------------------------------------------------------------------------
// Reductions and shape
// ---------------------------------------------------------------------------

/// Sum all elements into a 0-d tensor
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Function for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![scalar(inputs[0].sum())])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(Tensor::from_elem(
            inputs[0].raw_dim(),
            grad_outputs[0].sum(),
        ))])
    }
}

/// Mean of all elements into a 0-d tensor
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Function for Mean {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let x = inputs[0];
        if x.is_empty() {
            return Err(Error::InvalidParameter("mean: empty tensor".into()));
        }
        Ok(vec![scalar(x.sum() / x.len() as f32)])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let x = inputs[0];
        let grad = grad_outputs[0].sum() / x.len() as f32;
        Ok(vec![Some(Tensor::from_elem(x.raw_dim(), grad))])
    }
}

/// Sum down to a target shape (inverse of broadcasting)
#[derive(Debug, Clone)]
pub struct SumTo {
    pub shape: Vec<usize>,
}

impl Function for SumTo {
    fn name(&self) -> &'static str {
        "sum_to"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![sum_to(inputs[0], &self.shape)?])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(broadcast_to(
            self.name(),
            grad_outputs[0],
            inputs[0].shape(),
        )?)])
    }
}

/// Broadcast up to a target shape
#[derive(Debug, Clone)]
pub struct BroadcastTo {
    pub shape: Vec<usize>,
}

impl Function for BroadcastTo {
    fn name(&self) -> &'static str {
        "broadcast_to"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![broadcast_to(self.name(), inputs[0], &self.shape)?])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // Returned in the broadcast shape; the scheduler sums it back down
        Ok(vec![Some(grad_outputs[0].clone())])
    }
}

#[derive(Debug, Clone)]
pub struct Reshape {
    pub shape: Vec<usize>,
}

impl Function for Reshape {
    fn name(&self) -> &'static str {
        "reshape"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![reshape(self.name(), inputs[0], &self.shape)?])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(reshape(
            self.name(),
            grad_outputs[0],
            inputs[0].shape(),
        )?)])
    }
}

/// Transpose of a 2-D tensor
#[derive(Debug, Clone, Copy, Default)]
pub struct Transpose;

impl Function for Transpose {
    fn name(&self) -> &'static str {
        "transpose"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let x = as_matrix(self.name(), inputs[0])?;
        Ok(vec![x.t().as_standard_layout().into_owned().into_dyn()])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let grad = as_matrix(self.name(), grad_outputs[0])?;
        Ok(vec![Some(grad.t().as_standard_layout().into_owned().into_dyn())])
    }
}

/// Matrix multiplication of 2-D tensors: C[m,n] = A[m,k] @ B[k,n]
#[derive(Debug, Clone, Copy, Default)]
pub struct MatMul;

impl Function for MatMul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let a = as_matrix(self.name(), inputs[0])?;
        let b = as_matrix(self.name(), inputs[1])?;
        if a.ncols() != b.nrows() {
            return Err(Error::ShapeMismatch {
                op: self.name(),
                expected: vec![a.ncols(), b.ncols()],
                got: b.shape().to_vec(),
            });
        }
        Ok(vec![a.dot(&b).into_dyn()])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let a = as_matrix(self.name(), inputs[0])?;
        let b = as_matrix(self.name(), inputs[1])?;
        let grad = as_matrix(self.name(), grad_outputs[0])?;

        // ∂L/∂A = ∂L/∂C @ B^T
        // ∂L/∂B = A^T @ ∂L/∂C
        Ok(vec![
            Some(grad.dot(&b.t()).into_dyn()),
            Some(a.t().dot(&grad).into_dyn()),
        ])
    }
}

/// Softmax over the last axis
#[derive(Debug, Clone, Copy, Default)]
pub struct Softmax;

impl Function for Softmax {
    fn name(&self) -> &'static str {
        "softmax"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let x = inputs[0];
        if x.ndim() == 0 {
            return Err(Error::InvalidParameter(
                "softmax: expected at least one axis".into(),
            ));
        }

        let axis = Axis(x.ndim() - 1);
        let mut y = x.clone();
        for mut lane in y.lanes_mut(axis) {
            // Subtract the max for numerical stability
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            lane.mapv_inplace(|v| (v - max).exp());
            let sum = lane.sum();
            lane.mapv_inplace(|v| v / sum);
        }
        Ok(vec![y])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        // ∂L/∂x = y ⊙ (∂L/∂y - Σ(y ⊙ ∂L/∂y))
        let y = outputs[0];
        let grad = grad_outputs[0];
        let axis = Axis(y.ndim() - 1);

        let dot = (y * grad).sum_axis(axis).insert_axis(axis);
        let dot = expand(self.name(), &dot, y.shape())?;
        let grad_x = Zip::from(y)
            .and(grad)
            .and(&dot)
            .map_collect(|&y, &g, &d| y * (g - d));
        Ok(vec![Some(grad_x)])
    }
}

/// Split along axis 0 into equally sized pieces (one output per piece)
#[derive(Debug, Clone, Copy)]
pub struct Split {
    pub pieces: usize,
}

impl Function for Split {
    fn name(&self) -> &'static str {
        "split"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let x = inputs[0];
        let rows = x.shape().first().copied().unwrap_or(0);
        if x.ndim() == 0 || self.pieces == 0 || rows % self.pieces != 0 {
            return Err(Error::InvalidParameter(format!(
                "split: cannot split shape {:?} into {} pieces along axis 0",
                x.shape(),
                self.pieces
            )));
        }

        let step = rows / self.pieces;
        Ok((0..self.pieces)
            .map(|i| {
                x.slice_axis(Axis(0), Slice::from(i * step..(i + 1) * step))
                    .to_owned()
            })
            .collect())
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let views: Vec<ArrayViewD<'_, f32>> = grad_outputs.iter().map(|g| g.view()).collect();
        let grad = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| Error::BackwardFailed(format!("split: {e}")))?;
        Ok(vec![Some(grad)])
    }
}

/// Mean squared error between prediction and target, as a 0-d tensor
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss;

impl Function for MseLoss {
    fn name(&self) -> &'static str {
        "mse_loss"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        let (pred, target) = (inputs[0], inputs[1]);
        same_shape(self.name(), pred, target)?;
        if pred.is_empty() {
            return Err(Error::InvalidParameter("mse_loss: empty tensor".into()));
        }

        let n = pred.len() as f32;
        let total = Zip::from(pred)
            .and(target)
            .fold(0.0, |acc, &p, &t| acc + (p - t) * (p - t));
        Ok(vec![scalar(total / n)])
    }

    fn backward(
        &self,
        inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        let (pred, target) = (inputs[0], inputs[1]);
        let scale = 2.0 * grad_outputs[0].sum() / pred.len() as f32;

        let grad_pred = Zip::from(pred)
            .and(target)
            .map_collect(|&p, &t| scale * (p - t));
        let grad_target = grad_pred.mapv(|g| -g);
        Ok(vec![Some(grad_pred), Some(grad_target)])
    }
}

// ---------------------------------------------------------------------------
// Graph-level helpers
// ---------------------------------------------------------------------------

/// Add two variables
pub fn add(graph: &mut Graph, ctx: &Context, a: Variable, b: Variable) -> Result<Variable> {
    graph.apply(ctx, Add, &[a, b])
}

/// Subtract `b` from `a`
pub fn sub(graph: &mut Graph, ctx: &Context, a: Variable, b: Variable) -> Result<Variable> {
    graph.apply(ctx, Sub, &[a, b])
}

/// Multiply two variables element-wise
pub fn mul(graph: &mut Graph, ctx: &Context, a: Variable, b: Variable) -> Result<Variable> {
    graph.apply(ctx, Mul, &[a, b])
}

pub fn div(graph: &mut Graph, ctx: &Context, a: Variable, b: Variable) -> Result<Variable> {
    graph.apply(ctx, Div, &[a, b])
}

pub fn neg(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Neg, &[a])
}

/// Scale a variable by a scalar
pub fn scale(graph: &mut Graph, ctx: &Context, a: Variable, factor: f32) -> Result<Variable> {
    graph.apply(ctx, Scale { factor }, &[a])
}

pub fn add_scalar(graph: &mut Graph, ctx: &Context, a: Variable, value: f32) -> Result<Variable> {
    graph.apply(ctx, AddScalar { value }, &[a])
}

pub fn square(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Square, &[a])
}

pub fn pow(graph: &mut Graph, ctx: &Context, a: Variable, exponent: f32) -> Result<Variable> {
    graph.apply(ctx, Pow { exponent }, &[a])
}

pub fn exp(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Exp, &[a])
}

pub fn log(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Log, &[a])
}

pub fn tanh(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Tanh, &[a])
}

pub fn sigmoid(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Sigmoid, &[a])
}

/// ReLU activation
pub fn relu(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Relu, &[a])
}

pub fn gelu(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Gelu, &[a])
}

pub fn swish(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Swish, &[a])
}

/// Sum all elements
pub fn sum(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Sum, &[a])
}

pub fn mean(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Mean, &[a])
}

pub fn sum_to_shape(
    graph: &mut Graph,
    ctx: &Context,
    a: Variable,
    shape: &[usize],
) -> Result<Variable> {
    graph.apply(ctx, SumTo { shape: shape.to_vec() }, &[a])
}

pub fn broadcast(
    graph: &mut Graph,
    ctx: &Context,
    a: Variable,
    shape: &[usize],
) -> Result<Variable> {
    graph.apply(ctx, BroadcastTo { shape: shape.to_vec() }, &[a])
}

pub fn reshape_to(
    graph: &mut Graph,
    ctx: &Context,
    a: Variable,
    shape: &[usize],
) -> Result<Variable> {
    graph.apply(ctx, Reshape { shape: shape.to_vec() }, &[a])
}

pub fn transpose(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Transpose, &[a])
}

/// Matrix multiplication
pub fn matmul(graph: &mut Graph, ctx: &Context, a: Variable, b: Variable) -> Result<Variable> {
    graph.apply(ctx, MatMul, &[a, b])
}

/// Softmax activation over the last axis
pub fn softmax(graph: &mut Graph, ctx: &Context, a: Variable) -> Result<Variable> {
    graph.apply(ctx, Softmax, &[a])
}

pub fn split(
    graph: &mut Graph,
    ctx: &Context,
    a: Variable,
    pieces: usize,
) -> Result<Vec<Variable>> {
    graph.apply_multi(ctx, Split { pieces }, &[a])
}

pub fn mse_loss(
    graph: &mut Graph,
    ctx: &Context,
    pred: Variable,
    target: Variable,
) -> Result<Variable> {
    graph.apply(ctx, MseLoss, &[pred, target])
}
