//! Philox4x32-10 + Box-Muller normal fill, WGSL shaders and launcher
//!
//! One invocation produces one Philox block, i.e. four consecutive elements.
//! Storage buffers are padded to whole blocks, so an invocation always writes
//! complete 32-bit words and packed types never race on a shared word.
//!
//! | dtype   | storage       | elements per word |
//! |---------|---------------|-------------------|
//! | float32 | `array<f32>`  | 1                 |
//! | int32   | `array<i32>`  | 1                 |
//! | float16 | `array<u32>`  | 2 (`pack_f16`) |
//! | int16   | `array<u32>`  | 2                 |
//! | int8    | `array<u32>`  | 4                 |
//!
//! float64 has no WGSL type and is rejected.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use wgpu::{BindGroupLayout, Buffer, ComputePass, ComputePipeline};

use super::pipeline::{LayoutKey, PipelineCache, WORKGROUP_SIZE};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::random::{Normal, NormalStream};

const NORMAL_PRELUDE_WGSL: &str = r#"
const PHILOX_M2X32_0: u32 = 0xD2511F53u;
const PHILOX_M2X32_1: u32 = 0xCD9E8D57u;
const PHILOX_W32_0: u32 = 0x9E3779B9u;
const PHILOX_W32_1: u32 = 0xBB67AE85u;
const PI: f32 = 3.14159265358979323846;
const TWO_PI: f32 = 6.28318530717958647692;

struct NormalParams {
    num_blocks: u32,
    key_lo: u32,
    key_hi: u32,
    counter_lo: u32,
    counter_hi: u32,
    groups_x: u32,
    mean: f32,
    stddev: f32,
}

fn mulhi(a: u32, b: u32) -> u32 {
    let a_lo = a & 0xFFFFu;
    let a_hi = a >> 16u;
    let b_lo = b & 0xFFFFu;
    let b_hi = b >> 16u;
    let lo_lo = a_lo * b_lo;
    let mid0 = a_hi * b_lo;
    let mid1 = a_lo * b_hi;
    let carry = ((lo_lo >> 16u) + (mid0 & 0xFFFFu) + (mid1 & 0xFFFFu)) >> 16u;
    return a_hi * b_hi + (mid0 >> 16u) + (mid1 >> 16u) + carry;
}

fn philox4x32_10(counter: vec4<u32>, key: vec2<u32>) -> vec4<u32> {
    var ctr = counter;
    var k = key;
    for (var i = 0u; i < 10u; i++) {
        let hi0 = mulhi(ctr.x, PHILOX_M2X32_0);
        let lo0 = ctr.x * PHILOX_M2X32_0;
        let hi1 = mulhi(ctr.z, PHILOX_M2X32_1);
        let lo1 = ctr.z * PHILOX_M2X32_1;
        ctr = vec4<u32>(hi1 ^ ctr.y ^ k.x, lo1, hi0 ^ ctr.w ^ k.y, lo0);
        k = k + vec2<u32>(PHILOX_W32_0, PHILOX_W32_1);
    }
    return ctr;
}

// 24-bit uniform centered in its bucket: never 0, never 1
fn open_unit(u: u32) -> f32 {
    return (f32(u >> 8u) + 0.5) / 16777216.0;
}

// sin/cos are only accurate on [-pi, pi], so rotate by pi and negate
fn box_muller(u1: f32, u2: f32) -> vec2<f32> {
    let r = sqrt(-2.0 * log(u1));
    let theta = TWO_PI * u2 - PI;
    return vec2<f32>(-r * cos(theta), -r * sin(theta));
}

// Block index of this invocation, linearized over a 2D dispatch
fn block_index(gid: vec3<u32>) -> u32 {
    return gid.y * params.groups_x * 256u + gid.x;
}

// Four distribution values of block `b`; the 64-bit counter carries into hi
fn block_values(b: u32) -> vec4<f32> {
    let lo = params.counter_lo + b;
    let hi = params.counter_hi + select(0u, 1u, lo < params.counter_lo);
    let r = philox4x32_10(vec4<u32>(lo, hi, 0u, 0u), vec2<u32>(params.key_lo, params.key_hi));
    let z01 = box_muller(open_unit(r.x), open_unit(r.y));
    let z23 = box_muller(open_unit(r.z), open_unit(r.w));
    return vec4<f32>(params.mean) + params.stddev * vec4<f32>(z01, z23);
}

fn round_half_away(v: vec4<f32>) -> vec4<f32> {
    return sign(v) * floor(abs(v) + vec4<f32>(0.5));
}

const F16_MAX: f32 = 65504.0;
// Round-to-nearest takes anything at or above this to infinity
const F16_OVERFLOW: f32 = 65520.0;

// pack2x16float is indeterminate out of range, so overflow packs to signed infinity
fn pack_f16(p: vec2<f32>) -> u32 {
    let bits = pack2x16float(clamp(p, vec2<f32>(-F16_MAX), vec2<f32>(F16_MAX)));
    let inf = select(vec2<u32>(0x7C00u), vec2<u32>(0xFC00u), p < vec2<f32>(0.0));
    let over = abs(p) >= vec2<f32>(F16_OVERFLOW);
    let lo = select(bits & 0xFFFFu, inf.x, over.x);
    let hi = select(bits >> 16u, inf.y, over.y);
    return lo | (hi << 16u);
}

@group(0) @binding(1) var<uniform> params: NormalParams;
"#;

/// `let q: vec4<i32>` holding `v` rounded half away from zero and saturated
/// to the range of an integer dtype
///
/// The upper bound of int32 is not an f32, and WGSL's own conversion stops at
/// the largest f32 below it, so the high side is selected explicitly.
fn saturate_wgsl(dtype: DType) -> Result<String> {
    let (lo, hi) = dtype.int_range().ok_or_else(|| unsupported_dtype(dtype))?;
    let hi_int = hi as i64;
    let overflow = hi + 1.0;
    Ok(format!(
        "let r = round_half_away(v);
    let q = select(vec4<i32>(max(r, vec4<f32>({lo:?}))), vec4<i32>({hi_int}), r >= vec4<f32>({overflow:?}));"
    ))
}

/// Storage element type and store statements of one entry point
fn store_wgsl(dtype: DType) -> Result<(&'static str, String)> {
    Ok(match dtype {
        DType::F32 => (
            "f32",
            "let i = b * 4u;
    output[i] = v.x;
    output[i + 1u] = v.y;
    output[i + 2u] = v.z;
    output[i + 3u] = v.w;"
                .to_string(),
        ),
        DType::I32 => (
            "i32",
            format!(
                "{}
    let i = b * 4u;
    output[i] = q.x;
    output[i + 1u] = q.y;
    output[i + 2u] = q.z;
    output[i + 3u] = q.w;",
                saturate_wgsl(dtype)?
            ),
        ),
        DType::F16 => (
            "u32",
            "output[b * 2u] = pack_f16(v.xy);
    output[b * 2u + 1u] = pack_f16(v.zw);"
                .to_string(),
        ),
        DType::I16 => (
            "u32",
            format!(
                "{}
    let p = vec4<u32>(q);
    output[b * 2u] = (p.x & 0xFFFFu) | (p.y << 16u);
    output[b * 2u + 1u] = (p.z & 0xFFFFu) | (p.w << 16u);",
                saturate_wgsl(dtype)?
            ),
        ),
        DType::I8 => (
            "u32",
            format!(
                "{}
    let p = vec4<u32>(q);
    output[b] = (p.x & 0xFFu) | ((p.y & 0xFFu) << 8u) | ((p.z & 0xFFu) << 16u) | (p.w << 24u);",
                saturate_wgsl(dtype)?
            ),
        ),
        DType::F64 => return Err(unsupported_dtype(dtype)),
    })
}

/// Entry point (and shader) name for a dtype
pub fn shader_name(dtype: DType) -> Result<&'static str> {
    match dtype {
        DType::F32 => Ok("normal_f32"),
        DType::F16 => Ok("normal_f16"),
        DType::I32 => Ok("normal_i32"),
        DType::I16 => Ok("normal_i16"),
        DType::I8 => Ok("normal_i8"),
        DType::F64 => Err(unsupported_dtype(dtype)),
    }
}

fn unsupported_dtype(dtype: DType) -> Error {
    Error::unsupported(format!(
        "{dtype} samples cannot be generated on the accelerator (WGSL has no 64-bit float)"
    ))
}

/// Whether a dtype has a WGSL fill kernel
pub fn supports(dtype: DType) -> bool {
    shader_name(dtype).is_ok()
}

/// Complete WGSL source of the fill shader for a dtype
pub fn normal_shader_source(dtype: DType) -> Result<String> {
    let name = shader_name(dtype)?;
    let (elem, store) = store_wgsl(dtype)?;
    Ok(format!(
        r#"{NORMAL_PRELUDE_WGSL}
@group(0) @binding(0) var<storage, read_write> output: array<{elem}>;

@compute @workgroup_size({WORKGROUP_SIZE})
fn {name}(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let b = block_index(gid);
    if (b >= params.num_blocks) {{ return; }}
    let v = block_values(b);
    {store}
}}
"#
    ))
}

/// Uniform parameters of one sample's dispatch (matches `NormalParams` in WGSL)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct NormalParams {
    /// Philox blocks in the sample
    pub num_blocks: u32,
    /// Seed, low word
    pub key_lo: u32,
    /// Seed, high word
    pub key_hi: u32,
    /// First block counter, low word
    pub counter_lo: u32,
    /// First block counter, high word
    pub counter_hi: u32,
    /// Workgroups per dispatch row
    pub groups_x: u32,
    /// Distribution mean
    pub mean: f32,
    /// Distribution standard deviation
    pub stddev: f32,
}

impl NormalParams {
    /// Parameters for filling `num_blocks` blocks from `stream`
    pub fn new(num_blocks: u32, stream: NormalStream, dist: Normal, groups_x: u32) -> Self {
        Self {
            num_blocks,
            key_lo: stream.key as u32,
            key_hi: (stream.key >> 32) as u32,
            counter_lo: stream.counter as u32,
            counter_hi: (stream.counter >> 32) as u32,
            groups_x,
            mean: dist.mean as f32,
            stddev: dist.stddev as f32,
        }
    }
}

/// Compiled fill pipeline for one dtype
pub struct NormalKernel {
    pipeline: Arc<ComputePipeline>,
    layout: Arc<BindGroupLayout>,
}

impl NormalKernel {
    /// Fetch (compiling on first use) the kernel for `dtype`
    pub fn get(cache: &PipelineCache, dtype: DType) -> Result<Self> {
        let name = shader_name(dtype)?;
        let source = normal_shader_source(dtype)?;
        let module = cache.get_or_create_module(name, || source);
        let layout = cache.get_or_create_layout(LayoutKey {
            num_storage_buffers: 1,
            num_uniform_buffers: 1,
        });
        let pipeline = cache.get_or_create_pipeline(name, name, &module, &layout);
        Ok(Self { pipeline, layout })
    }

    /// Record one sample's dispatch into an open compute pass
    pub fn record(
        &self,
        cache: &PipelineCache,
        pass: &mut ComputePass<'_>,
        out: &Buffer,
        params: &Buffer,
        grid: (u32, u32),
    ) {
        let bind_group = cache.create_bind_group(&self.layout, &[out, params]);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, Some(&bind_group), &[]);
        pass.dispatch_workgroups(grid.0, grid.1, 1);
    }
}
