//! WebGPU adapter discovery.
//!
//! `WgpuDevice` identifies an adapter by its enumeration index and carries the
//! adapter properties queried when the client was created.

use std::fmt;
use std::sync::Arc;
use wgpu::{Adapter, Backend, Limits};

use crate::error::Error;

/// Error type for WebGPU device setup.
#[derive(Debug, Clone)]
pub enum WgpuError {
    /// No adapter is available at all.
    NoAdapter,
    /// The requested adapter index does not exist.
    AdapterIndex {
        /// Requested index
        index: usize,
        /// Number of adapters found
        available: usize,
    },
    /// Device request failed.
    DeviceError(String),
}

impl fmt::Display for WgpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WgpuError::NoAdapter => write!(f, "No suitable WebGPU adapter found"),
            WgpuError::AdapterIndex { index, available } => write!(
                f,
                "WebGPU adapter {} requested but only {} available",
                index, available
            ),
            WgpuError::DeviceError(msg) => write!(f, "WebGPU device error: {}", msg),
        }
    }
}

impl std::error::Error for WgpuError {}

impl From<WgpuError> for Error {
    fn from(e: WgpuError) -> Self {
        Error::allocation("accelerator device", e.to_string())
    }
}

/// Cached adapter information for a WebGPU device.
#[derive(Clone, Debug)]
pub(crate) struct AdapterInfo {
    /// Adapter name (e.g., "NVIDIA GeForce RTX 4090")
    pub(crate) name: String,
    /// Backend type (Vulkan, Metal, DX12, etc.)
    pub(crate) backend: Backend,
    /// Adapter limits
    pub(crate) limits: Limits,
}

/// WebGPU device identifier.
///
/// The index maps to the order of adapters returned by WebGPU enumeration.
#[derive(Clone)]
pub struct WgpuDevice {
    /// Device index (adapter order)
    pub(crate) index: usize,
    /// Adapter info, present once the device has been opened
    info: Option<Arc<AdapterInfo>>,
}

impl WgpuDevice {
    /// Create a device identifier for the specified adapter index.
    ///
    /// This does not initialize the GPU; that happens when the client is created.
    pub fn new(index: usize) -> Self {
        Self { index, info: None }
    }

    pub(crate) fn with_info(index: usize, info: Arc<AdapterInfo>) -> Self {
        Self {
            index,
            info: Some(info),
        }
    }

    /// Adapter index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the adapter name.
    ///
    /// Returns "unknown" if the device hasn't been initialized yet.
    pub fn adapter_name(&self) -> String {
        self.info
            .as_ref()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Get the backend type (Vulkan, Metal, DX12, etc.).
    pub fn backend(&self) -> Option<Backend> {
        self.info.as_ref().map(|i| i.backend)
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("index", &self.index)
            .field("adapter", &self.adapter_name())
            .field("backend", &self.backend())
            .finish()
    }
}

// ============================================================================
// Adapter Discovery
// ============================================================================

/// Request the adapter at `index` in enumeration order.
pub(crate) async fn query_adapter_info(
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>), WgpuError> {
    let instance = wgpu::Instance::default();

    let mut adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;

    if adapters.is_empty() {
        return Err(WgpuError::NoAdapter);
    }
    if index >= adapters.len() {
        return Err(WgpuError::AdapterIndex {
            index,
            available: adapters.len(),
        });
    }
    let adapter = adapters.swap_remove(index);

    let wgpu_info = adapter.get_info();
    let info = Arc::new(AdapterInfo {
        name: wgpu_info.name,
        backend: wgpu_info.backend,
        limits: adapter.limits(),
    });

    Ok((adapter, info))
}

/// Query adapter information synchronously using pollster.
pub(crate) fn query_adapter_info_blocking(
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>), WgpuError> {
    pollster::block_on(query_adapter_info(index))
}
