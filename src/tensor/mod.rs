//! Tensor types
//!
//! Shapes and host-memory tensors. Device-resident storage lives with its
//! runtime (see [`crate::runtime`]).

mod host;
mod shape;

pub use host::{HostBuffer, HostTensor};
pub use shape::Shape;
