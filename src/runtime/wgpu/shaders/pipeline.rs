//! WGSL compute pipeline infrastructure
//!
//! Caches shader modules, pipelines and bind group layouts so that a shader
//! is compiled once per device, not once per run.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineLayoutDescriptor, ShaderModule,
    ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

/// Workgroup size for compute shaders
pub const WORKGROUP_SIZE: u32 = 256;

// ============================================================================
// Pipeline Cache
// ============================================================================

/// Cache for compute pipelines keyed by shader name
pub struct PipelineCache {
    device: Arc<Device>,
    /// Cached shader modules by name
    modules: Mutex<HashMap<&'static str, Arc<ShaderModule>>>,
    /// Cached pipelines by (shader_name, entry_point)
    pipelines: Mutex<HashMap<(&'static str, &'static str), Arc<ComputePipeline>>>,
    /// Cached bind group layouts by layout key
    layouts: Mutex<HashMap<LayoutKey, Arc<BindGroupLayout>>>,
}

/// Key for bind group layout cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Number of read-write storage buffers, bound first
    pub num_storage_buffers: u32,
    /// Number of uniform buffers, bound after the storage buffers
    pub num_uniform_buffers: u32,
}

impl PipelineCache {
    /// Create an empty cache for `device`
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            modules: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create a shader module.
    ///
    /// `source` is only evaluated on a cache miss.
    pub fn get_or_create_module(
        &self,
        name: &'static str,
        source: impl FnOnce() -> String,
    ) -> Arc<ShaderModule> {
        let mut modules = self.modules.lock();
        if let Some(module) = modules.get(name) {
            return module.clone();
        }

        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source().into()),
        });

        let module = Arc::new(module);
        modules.insert(name, module.clone());
        module
    }

    /// Get or create a compute pipeline
    pub fn get_or_create_pipeline(
        &self,
        shader_name: &'static str,
        entry_point: &'static str,
        module: &ShaderModule,
        layout: &BindGroupLayout,
    ) -> Arc<ComputePipeline> {
        let key = (shader_name, entry_point);
        let mut pipelines = self.pipelines.lock();

        if let Some(pipeline) = pipelines.get(&key) {
            return pipeline.clone();
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", shader_name)),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("{}_{}", shader_name, entry_point)),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Get or create a bind group layout
    pub fn get_or_create_layout(&self, key: LayoutKey) -> Arc<BindGroupLayout> {
        let mut layouts = self.layouts.lock();

        if let Some(layout) = layouts.get(&key) {
            return layout.clone();
        }

        let buffer_entry = |binding: u32, ty: BufferBindingType| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let storage = (0..key.num_storage_buffers)
            .map(|i| buffer_entry(i, BufferBindingType::Storage { read_only: false }));
        let uniform = (0..key.num_uniform_buffers)
            .map(|i| buffer_entry(key.num_storage_buffers + i, BufferBindingType::Uniform));
        let entries: Vec<_> = storage.chain(uniform).collect();

        let layout = self
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("normpipe_layout"),
                entries: &entries,
            });

        let layout = Arc::new(layout);
        layouts.insert(key, layout.clone());
        layout
    }

    /// Create a bind group binding `buffers` in order
    pub fn create_bind_group(&self, layout: &BindGroupLayout, buffers: &[&Buffer]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("normpipe_bind_group"),
            layout,
            entries: &entries,
        })
    }

    /// Get device reference
    pub fn device(&self) -> &Device {
        &self.device
    }
}

// ============================================================================
// Dispatch Helpers
// ============================================================================

/// Compute number of workgroups for n invocations
#[inline]
pub fn workgroup_count(n: u64) -> u64 {
    n.div_ceil(WORKGROUP_SIZE as u64)
}

/// Split `n` invocations into an `(x, y)` workgroup grid.
///
/// A single dimension is limited to `max_per_dim` workgroups, so large
/// dispatches wrap into rows; the shader linearizes `gid` with the returned `x`.
/// Returns `None` when even a square grid cannot cover `n`.
pub fn workgroup_grid(n: u64, max_per_dim: u32) -> Option<(u32, u32)> {
    let groups = workgroup_count(n).max(1);
    let max = max_per_dim as u64;
    if groups <= max {
        return Some((groups as u32, 1));
    }
    let rows = groups.div_ceil(max);
    if rows > max {
        return None;
    }
    Some((max_per_dim, rows as u32))
}
