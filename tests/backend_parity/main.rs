//! Host vs accelerator parity for normal sample generation
//!
//! Both runtimes read the same Philox blocks for a given seed, so besides
//! the shared distribution checks most elements agree up to f32 precision.

#![cfg(feature = "wgpu")]

#[path = "../common/mod.rs"]
mod common;

mod helpers;
mod normal;
