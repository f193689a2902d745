//! HMAC pad precompute. The engine resumes from the digest state left after
//! hashing one key-XORed pad block, so only that partial state is stored.

use super::IntegAlg;
use crate::desc::sa::ROC_CTX_MAX_OPAD_IPAD_LEN;
use sha1::digest::generic_array::GenericArray;

const HMAC_PAD_LEN: usize = 128;
const OPAD: u8 = 0x5c;
const IPAD: u8 = 0x36;

const SHA1_IV: [u32; 5] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476, 0xc3d2e1f0];
const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];
const SHA384_IV: [u64; 8] = [
    0xcbbb9d5dc1059ed8,
    0x629a292a367cd507,
    0x9159015a3070dd17,
    0x152fecd8f70e5939,
    0x67332667ffc00b31,
    0x8eb44a8768581511,
    0xdb0c2e0d64f98fa7,
    0x47b5481dbefa4fa4,
];
const SHA512_IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

/// Byte offset of the ipad state within the opad/ipad area.
pub fn ipad_offset(alg: IntegAlg) -> usize {
    match alg {
        IntegAlg::Sha1_96 => 24,
        _ => 64,
    }
}

fn sha1_state(pad: &[u8; HMAC_PAD_LEN]) -> Vec<u8> {
    let mut state = SHA1_IV;
    sha1::compress(&mut state, &[GenericArray::clone_from_slice(&pad[..64])]);
    state.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn sha256_state(pad: &[u8; HMAC_PAD_LEN]) -> Vec<u8> {
    let mut state = SHA256_IV;
    sha2::compress256(&mut state, &[GenericArray::clone_from_slice(&pad[..64])]);
    state.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn sha512_state(pad: &[u8; HMAC_PAD_LEN], iv: [u64; 8], words: usize) -> Vec<u8> {
    let mut state = iv;
    sha2::compress512(&mut state, &[GenericArray::clone_from_slice(&pad[..])]);
    state[..words].iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Opad state at offset 0, ipad state at [`ipad_offset`], both in digest
/// byte order. All zero for algorithms without a keyed hash.
pub fn opad_ipad(alg: IntegAlg, key: &[u8]) -> [u8; ROC_CTX_MAX_OPAD_IPAD_LEN] {
    let mut opad = [OPAD; HMAC_PAD_LEN];
    let mut ipad = [IPAD; HMAC_PAD_LEN];
    for (i, k) in key.iter().take(HMAC_PAD_LEN).enumerate() {
        opad[i] ^= k;
        ipad[i] ^= k;
    }

    let hash = |pad: &[u8; HMAC_PAD_LEN]| -> Option<Vec<u8>> {
        match alg {
            IntegAlg::Sha1_96 => Some(sha1_state(pad)),
            IntegAlg::Sha256_96 | IntegAlg::Sha256_128 => Some(sha256_state(pad)),
            IntegAlg::Sha384_192 => Some(sha512_state(pad, SHA384_IV, 6)),
            IntegAlg::Sha512_256 => Some(sha512_state(pad, SHA512_IV, 8)),
            _ => None,
        }
    };

    let mut out = [0u8; ROC_CTX_MAX_OPAD_IPAD_LEN];
    if let (Some(o), Some(i)) = (hash(&opad), hash(&ipad)) {
        let off = ipad_offset(alg);
        out[..o.len()].copy_from_slice(&o);
        out[off..off + i.len()].copy_from_slice(&i);
    }
    out
}
