//! Integration tests for the autograd engine through the public API.

use approx::assert_abs_diff_eq;
use ndarray::IxDyn;
use pendiente::autograd::{ops, BackwardOptions, BackwardStrategy, Context, Function, Graph};
use pendiente::{Error, Result, Tensor};

fn scalar(value: f32) -> Tensor {
    Tensor::from_elem(IxDyn(&[]), value)
}

fn tensor(shape: &[usize], values: &[f32]) -> Tensor {
    Tensor::from_shape_vec(IxDyn(shape), values.to_vec()).unwrap()
}

#[test]
fn test_polynomial_gradient() {
    // f(x) = x³ - 2x² + x at x = 2: f'(x) = 3x² - 4x + 1 = 5
    let ctx = Context::new();
    let mut graph = Graph::new();
    let x = graph.param(scalar(2.0));
    let cube = ops::pow(&mut graph, &ctx, x, 3.0).unwrap();
    let sq = ops::square(&mut graph, &ctx, x).unwrap();
    let two_sq = ops::scale(&mut graph, &ctx, sq, 2.0).unwrap();
    let diff = ops::sub(&mut graph, &ctx, cube, two_sq).unwrap();
    let f = ops::add(&mut graph, &ctx, diff, x).unwrap();

    assert_abs_diff_eq!(graph.value(f).unwrap().sum(), 2.0);
    graph.backward(&ctx, f, false).unwrap();
    assert_abs_diff_eq!(graph.grad(x).unwrap().unwrap().sum(), 5.0, epsilon = 1e-5);
}

#[test]
fn test_independent_graphs_use_independent_contexts() {
    let training = Context::new();
    let inference = Context::inference();

    let mut a = Graph::new();
    let mut b = Graph::new();
    let xa = a.param(scalar(1.0));
    let xb = b.param(scalar(1.0));

    let ya = ops::exp(&mut a, &training, xa).unwrap();
    let yb = ops::exp(&mut b, &inference, xb).unwrap();

    assert!(a.creator(ya).unwrap().is_some());
    assert!(b.creator(yb).unwrap().is_none());
    assert!(a.backward(&training, ya, false).is_ok());
    assert!(matches!(
        b.backward(&training, yb, false),
        Err(Error::NoGraph(_))
    ));
}

#[test]
fn test_graphs_on_separate_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let ctx = if i % 2 == 0 {
                    Context::new()
                } else {
                    Context::new().with_strategy(BackwardStrategy::Recursive)
                };
                let mut graph = Graph::new();
                let x = graph.param(scalar(i as f32));
                let y = ops::square(&mut graph, &ctx, x).unwrap();
                graph.backward(&ctx, y, false).unwrap();
                graph.grad(x).unwrap().unwrap().sum()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_abs_diff_eq!(handle.join().unwrap(), 2.0 * i as f32);
    }
}

#[test]
fn test_multi_layer_perceptron_matches_manual_gradient() {
    // loss = sum(relu(x @ w1) @ w2), checked at one weight against a manual chain rule
    let ctx = Context::new();
    let mut graph = Graph::new();
    let x = graph.constant(tensor(&[1, 2], &[1.0, 2.0]));
    let w1 = graph.param(tensor(&[2, 2], &[0.5, -1.0, 0.25, 1.0]));
    let w2 = graph.param(tensor(&[2, 1], &[2.0, 3.0]));

    let h = ops::matmul(&mut graph, &ctx, x, w1).unwrap();
    let a = ops::relu(&mut graph, &ctx, h).unwrap();
    let out = ops::matmul(&mut graph, &ctx, a, w2).unwrap();
    let loss = ops::sum(&mut graph, &ctx, out).unwrap();
    graph.backward(&ctx, loss, false).unwrap();

    // h = [1.0, 1.0], both active
    let grad_w1 = graph.grad(w1).unwrap().unwrap();
    assert_abs_diff_eq!(grad_w1[[0, 0]], 2.0);
    assert_abs_diff_eq!(grad_w1[[1, 1]], 6.0);
    let grad_w2 = graph.grad(w2).unwrap().unwrap();
    assert_abs_diff_eq!(grad_w2[[0, 0]], 1.0);
    assert_abs_diff_eq!(grad_w2[[1, 0]], 1.0);
    assert!(graph.grad(x).unwrap().is_none());
}

#[test]
fn test_retained_graph_allows_second_pass() {
    let ctx = Context::new();
    let mut graph = Graph::new();
    let x = graph.param(scalar(1.5));
    let y = ops::tanh(&mut graph, &ctx, x).unwrap();

    graph.backward_with(&ctx, y, BackwardOptions::retain()).unwrap();
    let first = graph.grad(x).unwrap().unwrap().sum();
    graph.clear_grad(x).unwrap();
    graph.clear_grad(y).unwrap();
    graph.backward_with(&ctx, y, BackwardOptions::retain()).unwrap();
    let second = graph.grad(x).unwrap().unwrap().sum();

    assert_eq!(first, second);
    assert_abs_diff_eq!(first, 1.0 - 1.5f32.tanh().powi(2), epsilon = 1e-6);
}

#[test]
fn test_softmax_mse_pipeline_both_strategies() {
    let run = |strategy| {
        let ctx = Context::new().with_strategy(strategy);
        let mut graph = Graph::new();
        let logits = graph.param(tensor(&[2, 3], &[0.2, -1.0, 0.5, 1.5, 0.0, -0.3]));
        let target = graph.constant(tensor(&[2, 3], &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]));
        let probs = ops::softmax(&mut graph, &ctx, logits).unwrap();
        let loss = ops::mse_loss(&mut graph, &ctx, probs, target).unwrap();
        graph.backward(&ctx, loss, false).unwrap();
        graph.grad(logits).unwrap().unwrap().clone()
    };

    let iterative = run(BackwardStrategy::Iterative);
    let recursive = run(BackwardStrategy::Recursive);
    assert_eq!(iterative, recursive);

    // Softmax gradients sum to zero along each row
    for row in iterative.outer_iter() {
        assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-6);
    }
}

/// User-defined operation: f(x) = 3x with a hand-written backward
#[derive(Debug)]
struct Triple;

impl Function for Triple {
    fn name(&self) -> &'static str {
        "triple"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&mut self, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
        Ok(vec![inputs[0] * 3.0])
    }

    fn backward(
        &self,
        _inputs: &[&Tensor],
        _outputs: &[&Tensor],
        grad_outputs: &[&Tensor],
    ) -> Result<Vec<Option<Tensor>>> {
        Ok(vec![Some(grad_outputs[0] * 3.0)])
    }
}

#[test]
fn test_custom_function() {
    let ctx = Context::new();
    let mut graph = Graph::new();
    let x = graph.param(tensor(&[2], &[1.0, -1.0]));
    let y = graph.apply(&ctx, Triple, &[x]).unwrap();
    let z = ops::square(&mut graph, &ctx, y).unwrap();
    let loss = ops::sum(&mut graph, &ctx, z).unwrap();
    graph.backward(&ctx, loss, false).unwrap();

    // d/dx (3x)² = 18x
    assert_eq!(graph.grad(x).unwrap().unwrap(), &tensor(&[2], &[18.0, -18.0]));
    let creator = graph.creator(y).unwrap().unwrap();
    assert_eq!(graph.function_name(creator).unwrap(), "triple");
}

#[test]
fn test_error_messages_name_the_operation() {
    let ctx = Context::new();
    let mut graph = Graph::new();
    let a = graph.param(Tensor::ones(IxDyn(&[2, 3])));
    let b = graph.param(Tensor::ones(IxDyn(&[3, 2])));

    let err = ops::mul(&mut graph, &ctx, a, b).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("mul"), "{msg}");
    assert!(msg.contains("[2, 3]"), "{msg}");
}
