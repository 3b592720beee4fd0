//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue used for dispatch.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone` and the underlying wgpu::Device and wgpu::Queue
//! are already `Send + Sync`.

use std::sync::Arc;
use std::time::Duration;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Limits, Queue};

use super::device::{query_adapter_info_blocking, WgpuDevice, WgpuError};
use super::shaders::PipelineCache;
use crate::error::{Error, Result};

/// Longest time a submission or readback may take before it is reported as failed
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// WebGPU client.
///
/// Storage buffers hold sample data; staging buffers carry readbacks and
/// small uniform buffers carry per-sample kernel parameters.
#[derive(Clone)]
pub struct WgpuClient {
    /// GPU device identifier
    pub(crate) device_id: WgpuDevice,

    /// WebGPU device handle
    pub(crate) wgpu_device: Arc<Device>,

    /// WebGPU queue for command submission
    pub(crate) queue: Arc<Queue>,

    /// Pipeline cache for compute shaders
    pub(crate) pipeline_cache: Arc<PipelineCache>,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Open the adapter and create a device and queue.
    ///
    /// Use `cache::client_for` instead; buffers belong to
    /// the device that created them, so each index should only be opened once.
    pub(crate) fn new_uncached(device: WgpuDevice) -> std::result::Result<Self, WgpuError> {
        let (adapter, info) = query_adapter_info_blocking(device.index)?;

        let (wgpu_device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("normpipe WebGPU Device"),
                    required_features: wgpu::Features::empty(),
                    // Ask for everything the adapter offers so large samples fit.
                    required_limits: info.limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| WgpuError::DeviceError(format!("{:?}", e)))?;

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let pipeline_cache = Arc::new(PipelineCache::new(wgpu_device.clone()));

        log::debug!(
            "wgpu device {} opened: {} ({:?})",
            device.index,
            info.name,
            info.backend
        );

        Ok(Self {
            device_id: WgpuDevice::with_info(device.index, info),
            wgpu_device,
            queue,
            pipeline_cache,
        })
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.wgpu_device
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Limits the device was created with
    pub fn limits(&self) -> Limits {
        self.wgpu_device.limits()
    }

    /// Create a storage buffer for sample data.
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for CPU readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer for shader parameters.
    pub fn create_uniform_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Write data to a buffer.
    pub fn write_buffer<T: bytemuck::Pod>(&self, buffer: &Buffer, data: &[T]) {
        self.queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(data));
    }

    /// Submit commands and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed after submission: {e}")))?;
        Ok(())
    }

    /// Map a staging buffer and copy its whole contents out (blocking).
    pub fn read_buffer(&self, staging: &Buffer) -> Result<Vec<u8>> {
        let slice = staging.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed during buffer read: {e}")))?;

        let map_result = receiver.recv().map_err(|_| {
            Error::Backend("map_async callback was not invoked during buffer read".into())
        })?;
        map_result
            .map_err(|e| Error::Backend(format!("map_async failed during buffer read: {e}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}
