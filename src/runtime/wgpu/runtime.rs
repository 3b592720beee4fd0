//! WebGPU runtime implementation

use std::sync::Arc;

use super::cache::client_for;
use super::client::WgpuClient;
use super::shaders::normal::{self, NormalKernel, NormalParams};
use super::shaders::pipeline::workgroup_grid;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::random::{blocks_for, Normal, NormalStream, ELEMENTS_PER_BLOCK};
use crate::runtime::{check_outputs, Location, Runtime, Storage};
use crate::tensor::HostBuffer;

/// A sample's storage buffer in accelerator memory
///
/// The buffer is padded to whole Philox blocks; only the first `numel`
/// elements are sample values.
#[derive(Clone, Debug)]
pub struct DeviceBuffer {
    buffer: Arc<wgpu::Buffer>,
    dtype: DType,
    numel: usize,
}

impl DeviceBuffer {
    /// Element type
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of sample elements (excluding padding)
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Underlying wgpu buffer
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Philox blocks covering the sample
    fn num_blocks(&self) -> u64 {
        blocks_for(self.numel)
    }
}

/// Size in bytes of the padded device buffer for a sample
fn padded_size(dtype: DType, numel: usize) -> u64 {
    blocks_for(numel) * (ELEMENTS_PER_BLOCK * dtype.size_in_bytes()) as u64
}

/// WebGPU compute runtime
#[derive(Debug)]
pub struct WgpuRuntime {
    client: WgpuClient,
}

impl WgpuRuntime {
    /// Open (or reuse) the adapter at `device_id`.
    ///
    /// Fails with [`Error::Allocation`] when no adapter or device is available.
    pub fn new(device_id: usize) -> Result<Self> {
        let client = client_for(device_id)?;
        Ok(Self { client })
    }

    /// The client this runtime dispatches through
    pub fn client(&self) -> &WgpuClient {
        &self.client
    }

    fn device_buffer<'a>(&self, storage: &'a Storage) -> Result<&'a DeviceBuffer> {
        match storage {
            Storage::Device(buf) => Ok(buf),
            Storage::Host(_) => Err(Error::Backend(
                "wgpu runtime cannot use host storage".to_string(),
            )),
        }
    }
}

impl Runtime for WgpuRuntime {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn location(&self) -> Location {
        Location::Accelerator
    }

    fn supports_dtype(&self, dtype: DType) -> bool {
        normal::supports(dtype)
    }

    fn allocate(&self, dtype: DType, numel: usize) -> Result<Storage> {
        let resource = || format!("device buffer of {numel} {dtype} elements");
        if !self.supports_dtype(dtype) {
            return Err(Error::unsupported(format!(
                "{dtype} storage is not supported on the accelerator"
            )));
        }

        let size = padded_size(dtype, numel);
        let limits = self.client.limits();
        let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if size > max {
            return Err(Error::allocation(
                resource(),
                format!("{size} bytes exceeds the device limit of {max} bytes"),
            ));
        }
        if blocks_for(numel) > u32::MAX as u64 {
            return Err(Error::allocation(resource(), "more blocks than a 32-bit index"));
        }

        let buffer = self.client.create_storage_buffer("normpipe_sample", size);
        log::trace!("wgpu: allocated {} bytes for {}", size, resource());
        Ok(Storage::Device(DeviceBuffer {
            buffer: Arc::new(buffer),
            dtype,
            numel,
        }))
    }

    fn fill_normal(
        &self,
        outputs: &mut [Storage],
        streams: &[NormalStream],
        dist: Normal,
    ) -> Result<()> {
        check_outputs(outputs, streams)?;
        if outputs.is_empty() {
            return Ok(());
        }

        let cache = self.client.pipeline_cache();
        let max_per_dim = self.client.limits().max_compute_workgroups_per_dimension;

        // Resolve everything that can fail before recording any work.
        let mut dispatches = Vec::with_capacity(outputs.len());
        let mut kernel: Option<(DType, NormalKernel)> = None;
        for (storage, &stream) in outputs.iter().zip(streams) {
            let buf = self.device_buffer(storage)?;
            if kernel.as_ref().map(|(d, _)| *d) != Some(buf.dtype) {
                kernel = Some((buf.dtype, NormalKernel::get(cache, buf.dtype)?));
            }
            let blocks = buf.num_blocks();
            let grid = workgroup_grid(blocks, max_per_dim).ok_or_else(|| {
                Error::allocation(
                    format!("dispatch of {blocks} blocks"),
                    "exceeds the device workgroup grid",
                )
            })?;
            let params = self
                .client
                .create_uniform_buffer("normpipe_params", std::mem::size_of::<NormalParams>() as u64);
            self.client.write_buffer(
                &params,
                &[NormalParams::new(blocks as u32, stream, dist, grid.0)],
            );
            dispatches.push((buf.buffer.clone(), params, grid));
        }
        let Some((_, kernel)) = kernel else {
            return Ok(());
        };

        let mut encoder =
            self.client
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("normpipe_fill"),
                });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("normpipe_fill"),
                timestamp_writes: None,
            });
            for (out, params, grid) in &dispatches {
                kernel.record(cache, &mut pass, out, params, *grid);
            }
        }
        self.client.submit_and_wait(encoder)
    }

    fn transfer_to_host(&self, storage: &Storage) -> Result<HostBuffer> {
        let buf = self.device_buffer(storage)?;
        let size = buf.buffer.size();
        let staging = self.client.create_staging_buffer("normpipe_readback", size);

        let mut encoder =
            self.client
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("normpipe_readback"),
                });
        encoder.copy_buffer_to_buffer(&buf.buffer, 0, &staging, 0, size);
        self.client.submit_and_wait(encoder)?;

        let bytes = self.client.read_buffer(&staging)?;
        HostBuffer::from_bytes(buf.dtype, buf.numel, &bytes)
    }
}
