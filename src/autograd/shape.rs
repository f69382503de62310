//! Broadcasting helpers shared by the operations and the scheduler

use crate::error::{Error, Result};
use crate::Tensor;
use ndarray::{Axis, IxDyn};

/// NumPy-style broadcast of two shapes
pub fn broadcast_shape(op: &'static str, a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];

    for i in 0..ndim {
        // Right-aligned dimensions, missing ones count as 1
        let da = if i < ndim - a.len() { 1 } else { a[i - (ndim - a.len())] };
        let db = if i < ndim - b.len() { 1 } else { b[i - (ndim - b.len())] };

        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(Error::ShapeMismatch {
                    op,
                    expected: a.to_vec(),
                    got: b.to_vec(),
                })
            }
        };
    }

    Ok(out)
}

/// Sum `grad` down to `shape`, undoing a broadcast
///
/// Leading axes that `shape` lacks are summed away; axes where `shape` has
/// size 1 are summed with the axis kept.
pub fn sum_to(grad: &Tensor, shape: &[usize]) -> Result<Tensor> {
    if grad.shape() == shape {
        return Ok(grad.clone());
    }

    let reduction_error = || Error::BroadcastReduction {
        from: grad.shape().to_vec(),
        to: shape.to_vec(),
    };

    if shape.len() > grad.ndim() {
        return Err(reduction_error());
    }

    let lead = grad.ndim() - shape.len();
    let mut out = grad.clone();
    for _ in 0..lead {
        out = out.sum_axis(Axis(0));
    }

    for (axis, &target) in shape.iter().enumerate() {
        let current = out.shape()[axis];
        if current == target {
            continue;
        }
        if target != 1 {
            return Err(reduction_error());
        }
        out = out.sum_axis(Axis(axis)).insert_axis(Axis(axis));
    }

    Ok(out)
}

/// Broadcast `value` up to `shape`, materializing a new array
pub fn broadcast_to(op: &'static str, value: &Tensor, shape: &[usize]) -> Result<Tensor> {
    value
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| Error::ShapeMismatch {
            op,
            expected: shape.to_vec(),
            got: value.shape().to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::ArrayD;

    #[test]
    fn test_broadcast_shape_right_aligned() {
        assert_eq!(broadcast_shape("t", &[4, 3], &[1, 3]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shape("t", &[4, 3], &[3]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shape("t", &[], &[2, 2]).unwrap(), vec![2, 2]);
        assert_eq!(broadcast_shape("t", &[2, 1, 5], &[3, 1]).unwrap(), vec![2, 3, 5]);
    }

    #[test]
    fn test_broadcast_shape_incompatible() {
        let err = broadcast_shape("add", &[4, 3], &[2, 3]).unwrap_err();
        match err {
            Error::ShapeMismatch { op, expected, got } => {
                assert_eq!(op, "add");
                assert_eq!(expected, vec![4, 3]);
                assert_eq!(got, vec![2, 3]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sum_to_keeps_unit_axes() {
        let grad = ArrayD::from_elem(IxDyn(&[4, 3]), 1.0f32);
        let reduced = sum_to(&grad, &[1, 1]).unwrap();
        assert_eq!(reduced.shape(), &[1, 1]);
        assert_abs_diff_eq!(reduced[[0, 0]], 12.0);

        let rows = sum_to(&grad, &[1, 3]).unwrap();
        assert_eq!(rows.shape(), &[1, 3]);
        assert_abs_diff_eq!(rows[[0, 2]], 4.0);
    }

    #[test]
    fn test_sum_to_drops_leading_axes() {
        let grad = ArrayD::from_elem(IxDyn(&[2, 4, 3]), 0.5f32);
        let reduced = sum_to(&grad, &[3]).unwrap();
        assert_eq!(reduced.shape(), &[3]);
        assert_abs_diff_eq!(reduced[[1]], 4.0);

        let scalar = sum_to(&grad, &[]).unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert_abs_diff_eq!(scalar.sum(), 12.0);
    }

    #[test]
    fn test_sum_to_rejects_non_broadcast() {
        let grad = ArrayD::from_elem(IxDyn(&[4, 3]), 1.0f32);
        assert!(matches!(
            sum_to(&grad, &[2, 3]),
            Err(Error::BroadcastReduction { .. })
        ));
        assert!(matches!(
            sum_to(&grad, &[1, 4, 3, 1]),
            Err(Error::BroadcastReduction { .. })
        ));
    }
}
