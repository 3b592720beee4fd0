//! # normpipe
//!
//! **Batched, typed normal-distribution tensor generation for data pipelines.**
//!
//! normpipe is the random-tensor stage of an input pipeline: every iteration it
//! produces a batch of samples drawn from N(mean, stddev²), in one of six
//! numeric types, in host or accelerator memory.
//!
//! ## Features
//!
//! - **Shape sources**: per-sample shapes from fed host tensors, one static
//!   shape, or a single element per sample
//! - **Numeric types**: int8, int16, int32 (rounded and saturated), float16,
//!   float32, float64
//! - **Backends**: parallel CPU fill and a WebGPU compute kernel behind one
//!   `Runtime` interface
//! - **Reproducible**: counter-based Philox4x32-10 generator; host output is
//!   bit-identical for a given seed regardless of thread count
//!
//! ## Quick Start
//!
//! ```rust
//! use normpipe::prelude::*;
//!
//! let config = PipelineConfig::new()
//!     .with_dtype(DType::F32)
//!     .with_shape_source(ShapeSource::static_shape(&[10, 20, 30])?)
//!     .with_seed(42);
//!
//! let mut pipeline = Pipeline::new(config)?;
//! pipeline.build()?;
//!
//! let batch = pipeline.run()?;
//! assert_eq!(batch.len(), 1);
//! assert_eq!(batch.sample(0)?.shape().as_slice(), &[10, 20, 30]);
//! # Ok::<(), normpipe::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded host fill
//! - `wgpu`: accelerator runtime via WebGPU
//! - `serde`: (de)serialization of `PipelineConfig` and friends

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod pipeline;
pub mod random;
pub mod runtime;
pub mod tensor;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{
        Batch, BatchView, Pipeline, PipelineConfig, PipelineState, Sample, ShapeSource,
    };
    pub use crate::runtime::{Location, Runtime};
    pub use crate::tensor::{HostBuffer, HostTensor, Shape};
}
