//! Optimizers that update parameters stored in a [`Graph`](crate::autograd::Graph)

mod adam;
mod optimizer;
mod sgd;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use sgd::SGD;
