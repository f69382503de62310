//! # Pendiente: define-by-run reverse-mode autograd
//!
//! Pendiente records a computation graph while tensors flow through
//! differentiable operations and backpropagates through it in a
//! generation-ordered pass, so every gradient is complete before it is
//! propagated further.
//!
//! ## Architecture
//!
//! - **autograd**: Graph arena, backward scheduler and operation catalog
//! - **nn**: Layers built from graph operations
//! - **optim**: Optimizers (SGD, Adam) that update graph parameters
//! - **config**: Declarative YAML configuration
//!
//! ## Example
//!
//! ```
//! use pendiente::autograd::{ops, Context, Graph};
//! use pendiente::Tensor;
//!
//! let ctx = Context::new();
//! let mut graph = Graph::new();
//! let x = graph.param(Tensor::from_elem(ndarray::IxDyn(&[]), 3.0));
//! let y = ops::square(&mut graph, &ctx, x)?;
//! graph.backward(&ctx, y, false)?;
//! assert_eq!(graph.grad(x)?.map(|g| g.sum()), Some(6.0));
//! # Ok::<(), pendiente::Error>(())
//! ```

pub mod autograd;
pub mod config;
pub mod nn;
pub mod optim;

pub mod error;

// Re-export commonly used types
pub use autograd::{BackwardOptions, BackwardStrategy, Context, Graph, Tensor, Variable};
pub use error::{Error, Result};
