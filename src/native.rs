//! Byte-order and ordering primitives at the boundary between host memory and
//! accelerator-visible structures. The accelerator reads every multi-byte
//! key, salt and hash field as big-endian words.

use std::sync::atomic::{Ordering, fence};

/// Packs a byte string into accelerator-order 64-bit words. Missing trailing
/// bytes read as zero, excess bytes are ignored.
pub fn pack_be_u64(src: &[u8], dst: &mut [u64]) {
    for (i, w) in dst.iter_mut().enumerate() {
        let mut b = [0u8; 8];
        let start = i * 8;
        if start < src.len() {
            let end = std::cmp::min(start + 8, src.len());
            b[..end - start].copy_from_slice(&src[start..end]);
        }
        *w = u64::from_be_bytes(b);
    }
}

/// Inverse of [`pack_be_u64`].
pub fn unpack_be_u64(src: &[u64]) -> Vec<u8> {
    src.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Accelerator-order value of a 4-byte field.
pub fn pack_be_u32(src: [u8; 4]) -> u32 {
    u32::from_be_bytes(src)
}

/// Value whose in-memory image is `v` in network order.
pub fn cpu_to_be_32(v: u32) -> u32 {
    v.to_be()
}

/// Store barrier ordering every prior context write before anything that
/// can publish the context to the accelerator.
#[inline]
pub fn store_barrier() {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("dmb oshst", options(nostack, preserves_flags));
    }
    fence(Ordering::Release);
}
