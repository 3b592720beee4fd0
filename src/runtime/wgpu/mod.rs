//! WebGPU runtime implementation (requires `wgpu` feature)
//!
//! Samples live in device storage buffers and are filled by a WGSL port of
//! the host Philox/Box-Muller generator. Values are computed in f32 on the
//! device, so they track the host stream closely but are not bit-identical.
//!
//! A device is opened once per adapter index and shared between pipelines.

mod cache;
mod client;
mod device;
mod runtime;
pub(crate) mod shaders;

pub use client::WgpuClient;
pub use device::{WgpuDevice, WgpuError};
pub use runtime::{DeviceBuffer, WgpuRuntime};
