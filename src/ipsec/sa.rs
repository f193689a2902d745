//! Translation of a host SA into the inline engine's inbound context and
//! instruction template.

use super::{CryptoAlg, IntegAlg, IpsecSa, Protocol, SaFlags, hmac};
use crate::desc::inst::*;
use crate::desc::sa::*;
use crate::error::{Error, Result};
use crate::native::{cpu_to_be_32, pack_be_u32, pack_be_u64};

pub const ROC_CPT_TUNNEL_IPV4_HDR_LEN: u16 = 20;
pub const ROC_CPT_TUNNEL_IPV6_HDR_LEN: u16 = 40;
pub const ROC_CPT_ESP_HDR_LEN: u16 = 8;
pub const ROC_CPT_ESP_TRL_LEN: u16 = 2;
pub const ROC_CPT_AH_HDR_LEN: u16 = 12;
pub const UDP_HDR_LEN: u16 = 8;

/// Header and trailer growth of one packet under this SA.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EncapLen {
    pub partial_len: u16,
    pub roundup_len: u16,
    pub footer_len: u16,
    pub roundup_byte: u16,
    pub icv_len: u16,
}

impl EncapLen {
    pub fn precalc(sa: &IpsecSa) -> Self {
        let mut encap = EncapLen {
            partial_len: if sa.flags.contains(SaFlags::IS_TUNNEL_V6) {
                ROC_CPT_TUNNEL_IPV6_HDR_LEN
            } else {
                ROC_CPT_TUNNEL_IPV4_HDR_LEN
            },
            ..Default::default()
        };
        match sa.protocol {
            Protocol::Esp => {
                encap.partial_len += ROC_CPT_ESP_HDR_LEN;
                encap.roundup_len = ROC_CPT_ESP_TRL_LEN;
                encap.footer_len = ROC_CPT_ESP_TRL_LEN;
            }
            // replaces the outer header length
            Protocol::Ah => encap.partial_len = ROC_CPT_AH_HDR_LEN,
        }
        encap.partial_len += sa.crypto_iv_size as u16 + sa.integ_icv_size as u16;
        encap.roundup_byte = sa.esp_block_align as u16;
        encap.icv_len = sa.integ_icv_size as u16;
        if sa.flags.contains(SaFlags::UDP_ENCAP) {
            encap.partial_len += UDP_HDR_LEN;
        }
        encap
    }
}

pub fn enc_type(alg: CryptoAlg) -> Result<SaEncType> {
    if alg.is_ctr() {
        if alg.is_aead() {
            if alg.is_gcm() {
                Ok(SaEncType::AesGcm)
            } else {
                Err(Error::UnsupportedAlgorithm(format!("AEAD algorithm {}", alg)))
            }
        } else {
            Ok(SaEncType::AesCtr)
        }
    } else {
        match alg {
            CryptoAlg::None => Ok(SaEncType::Null),
            CryptoAlg::AesCbc128 | CryptoAlg::AesCbc192 | CryptoAlg::AesCbc256 => {
                Ok(SaEncType::AesCbc)
            }
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "encryption algorithm {}",
                alg
            ))),
        }
    }
}

pub fn aes_key_len(alg: CryptoAlg) -> SaAesKeyLen {
    use CryptoAlg::*;
    match alg {
        AesGcm128 | AesCbc128 | AesCtr128 => SaAesKeyLen::Aes128,
        AesGcm192 | AesCbc192 | AesCtr192 => SaAesKeyLen::Aes192,
        AesGcm256 | AesCbc256 | AesCtr256 => SaAesKeyLen::Aes256,
        _ => SaAesKeyLen::None,
    }
}

pub fn auth_type(alg: IntegAlg) -> Result<SaAuthType> {
    match alg {
        IntegAlg::None => Ok(SaAuthType::Null),
        IntegAlg::Sha1_96 => Ok(SaAuthType::Sha1),
        IntegAlg::Sha256_96 | IntegAlg::Sha256_128 => Ok(SaAuthType::Sha2_256),
        IntegAlg::Sha384_192 => Ok(SaAuthType::Sha2_384),
        IntegAlg::Sha512_256 => Ok(SaAuthType::Sha2_512),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "authentication algorithm {}",
            alg
        ))),
    }
}

/// `ar_win` field for a power of two window in `[64, 4096]`.
pub fn ar_win(window: u32) -> Result<u64> {
    if !window.is_power_of_two() || !(ROC_AR_WIN_SIZE_MIN..=ROC_AR_WIN_SIZE_MAX).contains(&window)
    {
        return Err(Error::InvalidReplayWindow(window));
    }
    Ok(window.trailing_zeros() as u64 - 5)
}

/// Context size field: 128 byte units after the first one.
pub fn ctx_size_units(ctx_size: usize) -> u64 {
    (ctx_size.next_multiple_of(ROC_CTX_UNIT_SIZE) >> 7) as u64 - 1
}

/// Selector, key and hash fields shared by both directions. Only word2 and
/// the key areas are touched.
fn fill_common(
    w2: &mut SaWord2,
    cipher_key: &mut [u64; CKEY_WORDS],
    salt: &mut InbSaWord8,
    hmac_opad_ipad: &mut [u64; OPAD_IPAD_WORDS],
    sa: &IpsecSa,
) -> Result<()> {
    if sa.flags.contains(SaFlags::UDP_ENCAP) {
        w2.set_encap_type(SaEncapType::Udp as u64);
    }
    w2.set_protocol(match sa.protocol {
        Protocol::Esp => SaProtocol::Esp,
        Protocol::Ah => SaProtocol::Ah,
    } as u64);
    w2.set_mode(if sa.is_tunnel() {
        SaMode::Tunnel
    } else {
        SaMode::Transport
    } as u64);

    let enc = enc_type(sa.crypto_alg)?;
    w2.set_enc_type(enc as u64);
    if enc == SaEncType::AesGcm {
        w2.set_auth_type(SaAuthType::Null as u64);
    }
    w2.set_aes_key_len(aes_key_len(sa.crypto_alg) as u64);
    if !sa.crypto_alg.is_aead() {
        w2.set_auth_type(auth_type(sa.integ_alg)? as u64);
    }

    pack_be_u64(&hmac::opad_ipad(sa.integ_alg, &sa.integ_key), hmac_opad_ipad);
    if sa.crypto_alg.is_gcm() {
        salt.set_salt(pack_be_u32(sa.salt) as u64);
    }
    pack_be_u64(&sa.crypto_key, cipher_key);
    w2.set_spi(sa.spi as u64);
    Ok(())
}

/// Builds a complete inbound context for `sa`. `valid` is the last field
/// written; nothing is visible to hardware until the caller writes it back.
pub fn build_inbound(sa: &IpsecSa, spi_mask: u32) -> Result<InboundSa> {
    let mut roc_sa = InboundSa::new();

    if sa.flags.contains(SaFlags::UDP_ENCAP) {
        roc_sa.w10.set_udp_dst_port(IPSEC_UDP_ENCAP_PORT);
        roc_sa.w10.set_udp_src_port(IPSEC_UDP_ENCAP_PORT);
    }

    let mut w2 = SaWord2::default();
    fill_common(
        &mut w2,
        &mut roc_sa.cipher_key,
        &mut roc_sa.w8,
        &mut roc_sa.hmac_opad_ipad,
        sa,
    )?;

    if sa.flags.contains(SaFlags::USE_ANTI_REPLAY) {
        roc_sa.w0.set_ar_win(ar_win(sa.replay_window)?);
    }

    w2.set_dir(SaDir::Inbound as u64);
    if sa.flags.contains(SaFlags::USE_ESN) {
        w2.set_esn_en(1);
    }

    // second pass meta, no defrag
    roc_sa.w0.set_pkt_format(SaPktFmt::Meta as u64);
    roc_sa.w0.set_pkt_output(SaPktOutput::NoFrag as u64);
    roc_sa.w0.set_pkind(ROC_IE_OT_CPT_PKIND);

    roc_sa.w0.set_ctx_size(ctx_size_units(roc_sa.ctx_size()));

    roc_sa.w1.set_cookie(cpu_to_be_32(sa.spi & spi_mask) as u64);

    w2.set_valid(1);
    roc_sa.w2 = w2;
    Ok(roc_sa)
}

/// Instruction template submitting packets against the context at `cptr`.
pub fn inbound_inst(cptr: u64) -> CptInst {
    let mut inst = CptInst::default();
    inst.set_egrp(crate::crypto::ROC_CPT_DFLT_ENG_GRP_SE_IE as u64);
    inst.set_ctx_val(1);
    inst.set_cptr(cptr);
    inst.set_qord(1);

    inst.set_opcode_major(ROC_IE_OT_MAJOR_OP_PROCESS_INBOUND_IPSEC);
    let mut param1 = InbParam1::default();
    param1.set_ip_csum_disable(ROC_IE_OT_SA_INNER_PKT_IP_CSUM_DISABLE);
    param1.set_l4_csum_disable(ROC_IE_OT_SA_INNER_PKT_L4_CSUM_DISABLE);
    param1.set_esp_trailer_disable(0);
    inst.set_param1(param1.bits() as u64);
    inst
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn gcm_sa() -> IpsecSa {
        IpsecSa::new(
            500,
            CryptoAlg::AesGcm128,
            IntegAlg::None,
            SaFlags::IS_INBOUND | SaFlags::IS_TUNNEL,
        )
        .with_crypto_key(&hex!("feffe9928665731c6d6a8f9467308308"))
        .with_salt(hex!("cafebabe"))
    }

    #[test_log::test]
    fn gcm_inbound_context() {
        let roc_sa = build_inbound(&gcm_sa(), 16383).unwrap();
        assert_eq!(roc_sa.w2.enc_type(), SaEncType::AesGcm as u64);
        assert_eq!(roc_sa.w2.auth_type(), SaAuthType::Null as u64);
        assert_eq!(roc_sa.w2.aes_key_len(), SaAesKeyLen::Aes128 as u64);
        assert_eq!(roc_sa.w2.dir(), SaDir::Inbound as u64);
        assert_eq!(roc_sa.w2.mode(), SaMode::Tunnel as u64);
        assert_eq!(roc_sa.w2.protocol(), SaProtocol::Esp as u64);
        assert_eq!(roc_sa.w2.valid(), 1);
        assert_eq!(roc_sa.w2.spi(), 500);
        assert_eq!(roc_sa.cipher_key, [0xfeffe9928665731c, 0x6d6a8f9467308308, 0, 0]);
        assert_eq!(roc_sa.w8.salt(), 0xcafebabe);
        assert_eq!(roc_sa.w1.cookie(), cpu_to_be_32(500) as u64);
        assert_eq!(roc_sa.w0.pkt_format(), SaPktFmt::Meta as u64);
        assert_eq!(roc_sa.w0.pkt_output(), SaPktOutput::NoFrag as u64);
        assert_eq!(roc_sa.w0.pkind(), 58);
        assert_eq!(roc_sa.w0.hw_ctx_off(), 31);
        assert_eq!(roc_sa.w0.ctx_push_size(), 32);
        assert_eq!(roc_sa.w0.ar_win(), 0);
        // 296 bytes -> 384 -> 3 units - 1
        assert_eq!(roc_sa.w0.ctx_size(), 2);
        assert!(roc_sa.hmac_opad_ipad.iter().all(|w| *w == 0));
    }

    #[test_log::test]
    fn cookie_is_masked() {
        let sa = gcm_sa();
        let roc_sa = build_inbound(&IpsecSa { spi: 0x4001, ..sa }, 0xff).unwrap();
        assert_eq!(roc_sa.w1.cookie(), cpu_to_be_32(0x01) as u64);
        assert_eq!(roc_sa.w2.spi(), 0x4001);
    }

    #[test_log::test]
    fn anti_replay_sizing() {
        for (window, win, units) in [(64u32, 1u64, 2u64), (128, 2, 2), (4096, 7, 6)] {
            assert_eq!(ar_win(window).unwrap(), win);
            let sa = IpsecSa {
                flags: SaFlags::IS_INBOUND | SaFlags::IS_TUNNEL | SaFlags::USE_ANTI_REPLAY,
                replay_window: window,
                ..gcm_sa()
            };
            let roc_sa = build_inbound(&sa, 16383).unwrap();
            assert_eq!(roc_sa.w0.ar_win(), win);
            let size = InboundSa::base_ctx_size() + 8 * (1 << (win - 1));
            assert_eq!(roc_sa.w0.ctx_size(), (size.div_ceil(128) - 1) as u64);
            assert_eq!(roc_sa.w0.ctx_size(), units);
        }
    }

    #[test_log::test]
    fn bad_replay_window() {
        assert!(matches!(ar_win(32), Err(Error::InvalidReplayWindow(32))));
        assert!(matches!(ar_win(100), Err(Error::InvalidReplayWindow(100))));
        assert!(matches!(ar_win(8192), Err(Error::InvalidReplayWindow(8192))));
    }

    #[test_log::test]
    fn cbc_sha256_context() {
        let key = hex!("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let sa = IpsecSa::new(
            7,
            CryptoAlg::AesCbc256,
            IntegAlg::Sha256_128,
            SaFlags::IS_INBOUND | SaFlags::IS_TUNNEL | SaFlags::USE_ESN | SaFlags::UDP_ENCAP,
        )
        .with_crypto_key(&key)
        .with_integ_key(&[0x0b; 32]);
        let roc_sa = build_inbound(&sa, 16383).unwrap();
        assert_eq!(roc_sa.w2.enc_type(), SaEncType::AesCbc as u64);
        assert_eq!(roc_sa.w2.auth_type(), SaAuthType::Sha2_256 as u64);
        assert_eq!(roc_sa.w2.aes_key_len(), SaAesKeyLen::Aes256 as u64);
        assert_eq!(roc_sa.w2.esn_en(), 1);
        assert_eq!(roc_sa.w2.encap_type(), SaEncapType::Udp as u64);
        assert_eq!(roc_sa.w10.udp_src_port(), 4500);
        assert_eq!(roc_sa.w10.udp_dst_port(), 4500);
        assert_eq!(roc_sa.cipher_key[3], 0x18191a1b1c1d1e1f);
        assert_eq!(roc_sa.w8.salt(), 0);
        let mut pads = [0u64; OPAD_IPAD_WORDS];
        pack_be_u64(&hmac::opad_ipad(IntegAlg::Sha256_128, &[0x0b; 32]), &mut pads);
        assert_eq!(roc_sa.hmac_opad_ipad, pads);
        assert_ne!(pads[0], 0);
        assert_ne!(pads[8], 0);
    }

    #[test_log::test]
    fn unsupported_selectors() {
        assert!(matches!(
            enc_type(CryptoAlg::ChaCha20Poly1305),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            enc_type(CryptoAlg::DesCbc),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert_eq!(enc_type(CryptoAlg::AesCtr192).unwrap(), SaEncType::AesCtr);
        assert_eq!(enc_type(CryptoAlg::None).unwrap(), SaEncType::Null);
        assert!(matches!(
            auth_type(IntegAlg::Md5_96),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert_eq!(aes_key_len(CryptoAlg::AesCtr192), SaAesKeyLen::Aes192);
        assert_eq!(aes_key_len(CryptoAlg::None), SaAesKeyLen::None);
        let sa = IpsecSa::new(1, CryptoAlg::AesCbc128, IntegAlg::Md5_96, SaFlags::IS_INBOUND);
        assert!(build_inbound(&sa, 0).is_err());
    }

    #[test_log::test]
    fn encap_lengths() {
        let esp = IpsecSa::new(1, CryptoAlg::AesCbc128, IntegAlg::Sha1_96, SaFlags::IS_TUNNEL);
        assert_eq!(
            EncapLen::precalc(&esp),
            EncapLen {
                partial_len: 20 + 8 + 16 + 12,
                roundup_len: 2,
                footer_len: 2,
                roundup_byte: 16,
                icv_len: 12,
            }
        );
        let v6_udp = IpsecSa {
            flags: SaFlags::IS_TUNNEL | SaFlags::IS_TUNNEL_V6 | SaFlags::UDP_ENCAP,
            ..IpsecSa::new(1, CryptoAlg::AesGcm256, IntegAlg::None, SaFlags::empty())
        };
        assert_eq!(EncapLen::precalc(&v6_udp).partial_len, 40 + 8 + 8 + 16 + 8);
        let ah = esp.clone().with_protocol(Protocol::Ah);
        let e = EncapLen::precalc(&ah);
        assert_eq!(e.partial_len, 12 + 16 + 12);
        assert_eq!(e.roundup_len, 0);
    }

    #[test_log::test]
    fn inst_template() {
        let inst = inbound_inst(0x8000_1000);
        assert_eq!(inst.egrp(), 1);
        assert_eq!(inst.ctx_val(), 1);
        assert_eq!(inst.cptr(), 0x8000_1000);
        assert_eq!(inst.qord(), 1);
        assert_eq!(inst.opcode_major(), 0x29);
        assert_eq!(inst.param1(), 0x3);
        assert_eq!(inst.0[..3], [0u64; 3]);
    }

    #[test_log::test]
    fn inst_template_raw_words() {
        let w = inbound_inst(0x8000_1000).0;
        assert_eq!((w[4] >> 48) & 0xff, 0x29);
        assert_eq!(w[4] >> 56, 0);
        assert_eq!((w[4] >> 32) & 0xffff, 0x3);
        assert_eq!(w[4] & 0xffff_ffff, 0);
        assert_eq!(w[3], 1);
        assert_eq!(w[7], 0x3000_0000_8000_1000);
        assert_eq!(w[5..7], [0u64; 2]);
    }
}
