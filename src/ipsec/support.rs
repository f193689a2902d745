use super::{CryptoAlg, IntegAlg, IpsecSa};
use crate::caps::CptEngCaps;
use crate::error::{Error, Result};

fn crypto_alg_supported(alg: CryptoAlg, caps: &CptEngCaps) -> bool {
    use CryptoAlg::*;
    match alg {
        None => true,
        AesGcm128 | AesGcm192 | AesGcm256 | AesCbc128 | AesCbc192 | AesCbc256 | AesCtr128
        | AesCtr192 | AesCtr256 => caps.has_aes(),
        _ => false,
    }
}

fn integ_alg_supported(alg: IntegAlg, caps: &CptEngCaps) -> bool {
    match alg {
        IntegAlg::None => true,
        IntegAlg::Md5_96
        | IntegAlg::Sha1_96
        | IntegAlg::Sha256_128
        | IntegAlg::Sha384_192
        | IntegAlg::Sha512_256 => caps.has_sha1_sha2(),
        _ => false,
    }
}

/// Whether the inline engine with capabilities `caps` can serve `sa`.
pub fn check_support(sa: &IpsecSa, caps: &CptEngCaps) -> Result<()> {
    if !sa.is_tunnel() {
        return Err(Error::TransportModeUnsupported);
    }
    if !crypto_alg_supported(sa.crypto_alg, caps) {
        return Err(Error::CapabilityDenied(format!("crypto-alg {}", sa.crypto_alg)));
    }
    if !integ_alg_supported(sa.integ_alg, caps) {
        return Err(Error::CapabilityDenied(format!("integ-alg {}", sa.integ_alg)));
    }
    Ok(())
}
