//! IPsec SA session manager and the ESP backend contract with the host
//! IPsec subsystem.

use crate::error::{Error, NativeResult, Result};
use std::fmt;

pub mod hmac;
pub mod sa;
pub mod session;
pub mod support;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CryptoAlg {
    None,
    AesCbc128,
    AesCbc192,
    AesCbc256,
    AesCtr128,
    AesCtr192,
    AesCtr256,
    AesGcm128,
    AesGcm192,
    AesGcm256,
    DesCbc,
    TripleDesCbc,
    ChaCha20Poly1305,
    AesNullGmac128,
    AesNullGmac192,
    AesNullGmac256,
}

impl CryptoAlg {
    /// Counter based: the SA carries a nonce instead of a per packet IV.
    pub fn is_ctr(&self) -> bool {
        use CryptoAlg::*;
        matches!(
            self,
            AesCtr128
                | AesCtr192
                | AesCtr256
                | AesGcm128
                | AesGcm192
                | AesGcm256
                | ChaCha20Poly1305
                | AesNullGmac128
                | AesNullGmac192
                | AesNullGmac256
        )
    }

    pub fn is_aead(&self) -> bool {
        use CryptoAlg::*;
        matches!(
            self,
            AesGcm128
                | AesGcm192
                | AesGcm256
                | ChaCha20Poly1305
                | AesNullGmac128
                | AesNullGmac192
                | AesNullGmac256
        )
    }

    pub fn is_gcm(&self) -> bool {
        matches!(
            self,
            CryptoAlg::AesGcm128 | CryptoAlg::AesGcm192 | CryptoAlg::AesGcm256
        )
    }

    pub fn iv_size(&self) -> u8 {
        use CryptoAlg::*;
        match self {
            None => 0,
            AesCbc128 | AesCbc192 | AesCbc256 => 16,
            _ => 8,
        }
    }

    pub fn block_size(&self) -> u8 {
        use CryptoAlg::*;
        match self {
            AesCbc128 | AesCbc192 | AesCbc256 => 16,
            DesCbc | TripleDesCbc => 8,
            _ => 1,
        }
    }

    pub fn key_len(&self) -> usize {
        use CryptoAlg::*;
        match self {
            None => 0,
            AesCbc128 | AesCtr128 | AesGcm128 | AesNullGmac128 => 16,
            AesCbc192 | AesCtr192 | AesGcm192 | AesNullGmac192 => 24,
            AesCbc256 | AesCtr256 | AesGcm256 | AesNullGmac256 | ChaCha20Poly1305 => 32,
            DesCbc => 8,
            TripleDesCbc => 24,
        }
    }
}

impl fmt::Display for CryptoAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CryptoAlg::*;
        let s = match self {
            None => "none",
            AesCbc128 => "aes-cbc-128",
            AesCbc192 => "aes-cbc-192",
            AesCbc256 => "aes-cbc-256",
            AesCtr128 => "aes-ctr-128",
            AesCtr192 => "aes-ctr-192",
            AesCtr256 => "aes-ctr-256",
            AesGcm128 => "aes-gcm-128",
            AesGcm192 => "aes-gcm-192",
            AesGcm256 => "aes-gcm-256",
            DesCbc => "des-cbc",
            TripleDesCbc => "3des-cbc",
            ChaCha20Poly1305 => "chacha20-poly1305",
            AesNullGmac128 => "aes-null-gmac-128",
            AesNullGmac192 => "aes-null-gmac-192",
            AesNullGmac256 => "aes-null-gmac-256",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntegAlg {
    None,
    Md5_96,
    Sha1_96,
    Sha256_96,
    Sha256_128,
    Sha384_192,
    Sha512_256,
}

impl IntegAlg {
    pub fn icv_size(&self) -> u8 {
        match self {
            IntegAlg::None => 0,
            IntegAlg::Md5_96 | IntegAlg::Sha1_96 | IntegAlg::Sha256_96 => 12,
            IntegAlg::Sha256_128 => 16,
            IntegAlg::Sha384_192 => 24,
            IntegAlg::Sha512_256 => 32,
        }
    }
}

impl fmt::Display for IntegAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegAlg::None => "none",
            IntegAlg::Md5_96 => "md5-96",
            IntegAlg::Sha1_96 => "sha1-96",
            IntegAlg::Sha256_96 => "sha-256-96",
            IntegAlg::Sha256_128 => "sha-256-128",
            IntegAlg::Sha384_192 => "sha-384-192",
            IntegAlg::Sha512_256 => "sha-512-256",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Ah,
    Esp,
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SaFlags: u32 {
        const USE_ESN = 1 << 0;
        const USE_ANTI_REPLAY = 1 << 1;
        const IS_TUNNEL = 1 << 2;
        const IS_TUNNEL_V6 = 1 << 3;
        const UDP_ENCAP = 1 << 4;
        const IS_INBOUND = 1 << 5;
    }
}

pub const IPSEC_SA_DEFAULT_REPLAY_WINDOW: u32 = 64;

/// Host side description of one security association.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpsecSa {
    pub stat_index: u32,
    pub spi: u32,
    pub protocol: Protocol,
    pub crypto_alg: CryptoAlg,
    pub crypto_key: Vec<u8>,
    pub integ_alg: IntegAlg,
    pub integ_key: Vec<u8>,
    /// Nonce salt in wire order.
    pub salt: [u8; 4],
    pub flags: SaFlags,
    pub replay_window: u32,
    pub crypto_iv_size: u8,
    pub integ_icv_size: u8,
    pub esp_block_align: u8,
}

impl IpsecSa {
    pub fn new(spi: u32, crypto_alg: CryptoAlg, integ_alg: IntegAlg, flags: SaFlags) -> Self {
        IpsecSa {
            stat_index: 0,
            spi,
            protocol: Protocol::Esp,
            crypto_alg,
            crypto_key: vec![],
            integ_alg,
            integ_key: vec![],
            salt: [0; 4],
            flags,
            replay_window: IPSEC_SA_DEFAULT_REPLAY_WINDOW,
            crypto_iv_size: crypto_alg.iv_size(),
            integ_icv_size: if crypto_alg.is_aead() {
                16
            } else {
                integ_alg.icv_size()
            },
            esp_block_align: std::cmp::max(4, crypto_alg.block_size()),
        }
    }

    pub fn with_crypto_key(mut self, key: &[u8]) -> Self {
        self.crypto_key = key.to_vec();
        self
    }

    pub fn with_integ_key(mut self, key: &[u8]) -> Self {
        self.integ_key = key.to_vec();
        self
    }

    pub fn with_salt(mut self, salt: [u8; 4]) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_replay_window(mut self, window: u32) -> Self {
        self.replay_window = window;
        self
    }

    pub fn with_stat_index(mut self, stat_index: u32) -> Self {
        self.stat_index = stat_index;
        self
    }

    pub fn is_inbound(&self) -> bool {
        self.flags.contains(SaFlags::IS_INBOUND)
    }

    pub fn is_tunnel(&self) -> bool {
        self.flags.contains(SaFlags::IS_TUNNEL)
    }
}

/// Graph node names the backend serves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EspBackendDesc {
    pub name: &'static str,
    pub esp4_encrypt: &'static str,
    pub esp4_encrypt_tun: &'static str,
    pub esp4_decrypt: &'static str,
    pub esp4_decrypt_tun: &'static str,
    pub esp6_encrypt: &'static str,
    pub esp6_encrypt_tun: &'static str,
    pub esp6_decrypt: &'static str,
    pub esp6_decrypt_tun: &'static str,
    pub esp_mpls_encrypt_tun: &'static str,
}

pub const OCT_ESP_BACKEND: EspBackendDesc = EspBackendDesc {
    name: "octeon backend",
    esp4_encrypt: "esp4-encrypt",
    esp4_encrypt_tun: "esp4-encrypt-tun",
    esp4_decrypt: "esp4-decrypt",
    esp4_decrypt_tun: "esp4-decrypt-tun",
    esp6_encrypt: "esp6-encrypt",
    esp6_encrypt_tun: "esp6-encrypt-tun",
    esp6_decrypt: "esp6-decrypt",
    esp6_decrypt_tun: "esp6-decrypt-tun",
    esp_mpls_encrypt_tun: "esp-mpls-encrypt-tun",
};

/// Host IPsec subsystem.
pub trait IpsecSubsystem {
    /// Returns the backend index.
    fn register_esp_backend(&mut self, backend: &EspBackendDesc) -> u32;
    fn select_esp_backend(&mut self, backend_index: u32) -> NativeResult<()>;
    fn sa_get(&self, sa_index: u32) -> Option<IpsecSa>;
}

/// Callbacks the host IPsec subsystem calls on a registered backend.
pub trait EspBackend {
    fn check_support(&self, sa: &IpsecSa) -> Result<()>;
    fn add_del_session(&mut self, sa_index: u32, is_add: bool) -> Result<()>;
}

pub fn init_ipsec_backend(ipsec: &mut dyn IpsecSubsystem) -> Result<u32> {
    let idx = ipsec.register_esp_backend(&OCT_ESP_BACKEND);
    ipsec
        .select_esp_backend(idx)
        .map_err(|e| Error::native("ipsec_select_esp_backend", e))?;
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;
    use crate::roc::model::Model;

    #[test_log::test]
    fn derived_sizes() {
        let sa = IpsecSa::new(1, CryptoAlg::AesGcm128, IntegAlg::None, SaFlags::empty());
        assert_eq!(sa.crypto_iv_size, 8);
        assert_eq!(sa.integ_icv_size, 16);
        assert_eq!(sa.esp_block_align, 4);
        let sa = IpsecSa::new(1, CryptoAlg::AesCbc256, IntegAlg::Sha256_128, SaFlags::empty());
        assert_eq!(sa.crypto_iv_size, 16);
        assert_eq!(sa.integ_icv_size, 16);
        assert_eq!(sa.esp_block_align, 16);
    }

    #[test_log::test]
    fn alg_classes() {
        assert!(CryptoAlg::AesGcm256.is_ctr() && CryptoAlg::AesGcm256.is_aead());
        assert!(CryptoAlg::AesCtr128.is_ctr() && !CryptoAlg::AesCtr128.is_aead());
        assert!(CryptoAlg::ChaCha20Poly1305.is_aead() && !CryptoAlg::ChaCha20Poly1305.is_gcm());
        assert!(!CryptoAlg::AesCbc128.is_ctr());
        assert_eq!(CryptoAlg::AesGcm128.to_string(), "aes-gcm-128");
        assert_eq!(IntegAlg::Sha512_256.to_string(), "sha-512-256");
    }

    #[test_log::test]
    fn backend_registration() {
        let model = Model::new();
        let mut ipsec = model.ipsec();
        assert_eq!(init_ipsec_backend(ipsec.as_mut()).unwrap(), 0);
        let st = model.state();
        assert_eq!(st.esp_backends, [OCT_ESP_BACKEND]);
        assert_eq!(st.selected_backend, Some(0));
    }

    #[test_log::test]
    fn backend_selection_failure() {
        let model = Model::new();
        model.inject_fault("ipsec_select_esp_backend", NativeError::new(-1, "busy"));
        let mut ipsec = model.ipsec();
        let e = init_ipsec_backend(ipsec.as_mut()).unwrap_err();
        assert_eq!(e.to_string(), "ipsec_select_esp_backend: busy [-1]");
    }
}
