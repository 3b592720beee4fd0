//! Philox4x32-10 counter-based PRNG
//!
//! 10-round Feistel-like bijection from Salmon et al. "Parallel Random
//! Numbers: As Easy as 1, 2, 3" (2011). Output depends only on (key, counter),
//! so any block can be produced independently of the others.

const PHILOX_M2X32_0: u32 = 0xD2511F53;
const PHILOX_M2X32_1: u32 = 0xCD9E8D57;
const PHILOX_W32_0: u32 = 0x9E3779B9;
const PHILOX_W32_1: u32 = 0xBB67AE85;

/// Philox4x32 round function
#[inline(always)]
fn philox_round(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let prod0 = (ctr[0] as u64).wrapping_mul(PHILOX_M2X32_0 as u64);
    let prod1 = (ctr[2] as u64).wrapping_mul(PHILOX_M2X32_1 as u64);

    [
        ((prod1 >> 32) as u32) ^ ctr[1] ^ key[0],
        prod1 as u32,
        ((prod0 >> 32) as u32) ^ ctr[3] ^ key[1],
        prod0 as u32,
    ]
}

/// Philox4x32-10: ten rounds with the Weyl key schedule
#[inline(always)]
pub(crate) fn philox4x32_10(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let mut c = ctr;
    let mut k = key;

    for _ in 0..10 {
        c = philox_round(c, k);
        k[0] = k[0].wrapping_add(PHILOX_W32_0);
        k[1] = k[1].wrapping_add(PHILOX_W32_1);
    }

    c
}

/// Split a 64-bit value into (lo, hi) 32-bit words
#[inline(always)]
pub(crate) fn split_u64(v: u64) -> [u32; 2] {
    [(v & 0xFFFF_FFFF) as u32, (v >> 32) as u32]
}

/// Random words for one block: counter `(lo, hi, 0, 0)` under `key`
#[inline(always)]
pub(crate) fn block(key: u64, counter: u64) -> [u32; 4] {
    let [lo, hi] = split_u64(counter);
    philox4x32_10([lo, hi, 0, 0], split_u64(key))
}
