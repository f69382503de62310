//! Neural network layers built on the autograd graph

mod linear;

pub use linear::Linear;
