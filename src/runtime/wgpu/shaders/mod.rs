//! WGSL compute shaders for the WebGPU runtime

pub mod normal;
pub mod pipeline;

pub use pipeline::PipelineCache;
