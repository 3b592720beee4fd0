//! CPU kernel for normal sample generation
//!
//! Performance characteristics:
//! - Parallelization threshold: 4096 elements
//! - Compute bound (10 Philox rounds + log/sqrt/sin/cos per pair)
//!
//! Chunks are a whole number of Philox blocks and each chunk derives its own
//! stream position from its offset, so the result does not depend on how many
//! threads run or in which order chunks complete.

use crate::dtype::Element;
use crate::random::{blocks_for, fill_normal, Normal, NormalStream, ELEMENTS_PER_BLOCK};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Parallelization threshold: skip Rayon for small samples (overhead > benefit)
const PARALLEL_THRESHOLD: usize = 4096;

/// Elements per parallel chunk; a multiple of the Philox block width
const CHUNK_SIZE: usize = 1024 * ELEMENTS_PER_BLOCK;

/// Fill one sample with normal values
#[inline]
pub fn normal_kernel<T: Element>(out: &mut [T], stream: NormalStream, dist: Normal) {
    #[cfg(feature = "rayon")]
    if out.len() >= PARALLEL_THRESHOLD {
        let blocks_per_chunk = blocks_for(CHUNK_SIZE);
        out.par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(i, chunk)| {
                fill_normal(chunk, stream.advance(i as u64 * blocks_per_chunk), dist);
            });
        return;
    }

    // Serial fallback for small samples
    for (i, chunk) in out.chunks_mut(CHUNK_SIZE).enumerate() {
        fill_normal(chunk, stream.advance(i as u64 * blocks_for(CHUNK_SIZE)), dist);
    }
}
