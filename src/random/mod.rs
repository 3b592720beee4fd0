//! Normal random generation shared by every runtime
//!
//! Values come from a counter-based Philox4x32-10 stream: one block of four
//! 32-bit words becomes four uniforms, two Box-Muller pairs, and finally four
//! consecutive output elements. Because a block depends only on
//! `(key, counter)`, a buffer can be filled in any order or in parallel and
//! still reproduce the same values.

pub(crate) mod philox;

use crate::dtype::Element;
use crate::error::{Error, Result};
use std::f64::consts::PI;

/// Elements produced by one Philox block
pub const ELEMENTS_PER_BLOCK: usize = 4;

/// Number of Philox blocks needed for `numel` elements.
#[inline]
pub fn blocks_for(numel: usize) -> u64 {
    numel.div_ceil(ELEMENTS_PER_BLOCK) as u64
}

/// Parameters of the sampled normal distribution
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normal {
    /// Mean
    pub mean: f64,
    /// Standard deviation
    pub stddev: f64,
}

impl Default for Normal {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl Normal {
    /// The standard normal distribution N(0, 1)
    pub const STANDARD: Normal = Normal {
        mean: 0.0,
        stddev: 1.0,
    };

    /// Create a validated distribution: finite mean, finite positive stddev.
    pub fn new(mean: f64, stddev: f64) -> Result<Self> {
        let dist = Self { mean, stddev };
        dist.validate()?;
        Ok(dist)
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.mean.is_finite() {
            return Err(Error::InvalidArgument {
                arg: "mean",
                reason: format!("must be finite, got {}", self.mean),
            });
        }
        if !(self.stddev.is_finite() && self.stddev > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "stddev",
                reason: format!("must be finite and positive, got {}", self.stddev),
            });
        }
        Ok(())
    }

    /// Map a standard normal draw onto this distribution.
    #[inline(always)]
    pub fn apply(&self, z: f64) -> f64 {
        self.mean + self.stddev * z
    }
}

/// Position in a keyed Philox stream
///
/// `key` is the pipeline seed; `counter` is the index of the first block the
/// next buffer will consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NormalStream {
    /// Philox key (the seed)
    pub key: u64,
    /// Index of the first block
    pub counter: u64,
}

impl NormalStream {
    /// Stream starting at block 0 of `key`
    pub fn new(key: u64) -> Self {
        Self { key, counter: 0 }
    }

    /// The same stream, `blocks` blocks further on.
    #[inline]
    pub fn advance(self, blocks: u64) -> Self {
        Self {
            key: self.key,
            counter: self.counter.wrapping_add(blocks),
        }
    }

    /// Four standard normal values of block `index` (relative to `counter`).
    #[inline]
    pub fn normals(&self, index: u64) -> [f64; 4] {
        let r = philox::block(self.key, self.counter.wrapping_add(index));
        let (z0, z1) = box_muller(u32_to_open_unit(r[0]), u32_to_open_unit(r[1]));
        let (z2, z3) = box_muller(u32_to_open_unit(r[2]), u32_to_open_unit(r[3]));
        [z0, z1, z2, z3]
    }
}

/// Convert u32 to a uniform in the open interval (0, 1)
///
/// Centering each of the 2^32 buckets keeps both ends away from 0 and 1, so
/// the logarithm in Box-Muller never sees zero.
#[inline(always)]
pub(crate) fn u32_to_open_unit(u: u32) -> f64 {
    (u as f64 + 0.5) * (1.0 / 4_294_967_296.0)
}

/// Box-Muller transform: two uniforms in (0, 1) to two standard normals
#[inline(always)]
pub(crate) fn box_muller(u1: f64, u2: f64) -> (f64, f64) {
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;

    (r * theta.cos(), r * theta.sin())
}

/// Fill `out` with normal samples from `stream`, converted to `T`.
///
/// Element `i` is always the `i % 4`-th value of block `i / 4`, so filling
/// disjoint sub-slices with advanced streams gives the same result as one call.
pub fn fill_normal<T: Element>(out: &mut [T], stream: NormalStream, dist: Normal) {
    for (b, chunk) in out.chunks_mut(ELEMENTS_PER_BLOCK).enumerate() {
        let z = stream.normals(b as u64);
        for (elem, &zi) in chunk.iter_mut().zip(z.iter()) {
            *elem = T::from_sample(dist.apply(zi));
        }
    }
}
