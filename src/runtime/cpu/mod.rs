//! CPU runtime implementation
//!
//! Samples are allocated in process memory and filled on the CPU. With the
//! `rayon` feature, samples of a batch and chunks inside a large sample are
//! filled in parallel; the output is identical to the serial fill.

pub(crate) mod kernels;
mod runtime;

pub use runtime::CpuRuntime;
