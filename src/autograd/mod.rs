//! Define-by-run autograd engine
//!
//! A [`Graph`] owns variables and the function applications that produced
//! them. Operations record themselves while the [`Context`] is in training
//! mode; [`Graph::backward`] then walks the recorded applications in
//! descending generation order and accumulates gradients into leaves.

mod backward;
mod context;
mod function;
mod grad_store;
mod graph;
pub mod ops;
pub mod shape;
mod unchain;
mod variable;


pub use backward::BackwardOptions;
pub use context::{BackwardStrategy, Context};
pub use function::Function;
pub use graph::Graph;
pub use variable::{FunctionId, Variable};

/// Dense n-dimensional `f32` array used for values and gradients
pub type Tensor = ndarray::ArrayD<f32>;
