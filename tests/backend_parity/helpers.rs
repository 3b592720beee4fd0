//! Shared helpers for backend parity tests: backend lock, pipeline creation, assertions.

use std::sync::{Mutex, OnceLock};

use crate::common::{accelerator_available, built_pipeline, run_to_host};
use normpipe::prelude::*;

static WGPU_BACKEND_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Run `f` while holding the accelerator lock; skip when no adapter exists.
pub fn with_accelerator<F>(f: F)
where
    F: FnOnce(),
{
    let _guard = WGPU_BACKEND_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if !accelerator_available() {
        return;
    }
    f();
}

/// Run `config` once at each location and return both batches on the host.
pub fn run_both(config: PipelineConfig) -> (Batch, Batch) {
    let mut host = built_pipeline(config.clone().with_location(Location::Host));
    let mut device = built_pipeline(config.with_location(Location::Accelerator));

    let device_view = device.run().unwrap();
    assert_eq!(device_view.location(), Location::Accelerator);
    let device_batch = device_view.to_host().unwrap();

    (run_to_host(&mut host), device_batch)
}

/// Assert that at least `min_fraction` of the elements agree within `atol`.
///
/// Equal values always agree, so matching infinities count as close.
///
/// Host values derive from 32-bit uniforms in f64 while the kernel uses
/// 24-bit uniforms in f32, so the extreme tails may drift apart.
pub fn assert_mostly_close(host: &[f64], device: &[f64], atol: f64, min_fraction: f64, op: &str) {
    assert_eq!(
        host.len(),
        device.len(),
        "parity[{}]: length mismatch: {} vs {}",
        op,
        host.len(),
        device.len()
    );

    let close = host
        .iter()
        .zip(device)
        .filter(|(x, y)| x == y || (*x - *y).abs() <= atol)
        .count();
    let fraction = close as f64 / host.len() as f64;
    assert!(
        fraction >= min_fraction,
        "parity[{}]: only {:.4} of {} elements within {} (need {})",
        op,
        fraction,
        host.len(),
        atol,
        min_fraction
    );
}
