use super::*;
use oct_inl_ipsec_generator::*;

pub const ROC_CTX_MAX_CKEY_LEN: usize = 32;
pub const ROC_CTX_MAX_OPAD_IPAD_LEN: usize = 128;
pub const ROC_AR_WIN_SIZE_MIN: u32 = 64;
pub const ROC_AR_WIN_SIZE_MAX: u32 = 4096;
pub const ROC_AR_WINBITS_SZ: usize = ROC_AR_WIN_SIZE_MAX as usize / 64;
pub const ROC_IE_OT_CPT_PKIND: u64 = 58;
pub const ROC_CTX_UNIT_SIZE: usize = 128;

pub const CKEY_WORDS: usize = ROC_CTX_MAX_CKEY_LEN / DESC_ENTRY_SIZE;
pub const OPAD_IPAD_WORDS: usize = ROC_CTX_MAX_OPAD_IPAD_LEN / DESC_ENTRY_SIZE;
pub const OUTER_HDR_WORDS: usize = 4;

pub const INB_SA_WORDS: usize = 101;
pub const INB_SA_SIZE: usize = INB_SA_WORDS * DESC_ENTRY_SIZE;
/// Hardware part of one inbound SA slot, rounded to the context unit.
pub const INB_SA_HW_SIZE: usize = INB_SA_SIZE.div_ceil(ROC_CTX_UNIT_SIZE) * ROC_CTX_UNIT_SIZE;
/// Software reserved area following the hardware part in each slot.
pub const INB_SA_SW_RSVD_SIZE: usize = 128;
pub const INB_SA_SLOT_SIZE: usize = INB_SA_HW_SIZE + INB_SA_SW_RSVD_SIZE;

pub const IPSEC_UDP_ENCAP_PORT: u64 = 4500;

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaDir {
    Inbound = 0,
    Outbound = 1,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaMode {
    Transport = 0,
    Tunnel = 1,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaProtocol {
    Ah = 0,
    Esp = 1,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaAesKeyLen {
    None = 0,
    Aes128 = 1,
    Aes192 = 2,
    Aes256 = 3,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaEncType {
    Null = 0,
    DesCbc = 1,
    TripleDesCbc = 2,
    AesCbc = 3,
    AesCtr = 4,
    AesGcm = 5,
    AesCcm = 6,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaAuthType {
    Null = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha2_224 = 3,
    Sha2_256 = 4,
    Sha2_384 = 5,
    Sha2_512 = 6,
    Gmac = 7,
    AesXcbc = 8,
    AesCmac = 9,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaEncapType {
    None = 0,
    Udp = 1,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaPktFmt {
    Full = 0,
    Meta = 1,
}

#[desc_gen]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaPktOutput {
    NoFrag = 0,
    HwBasedDefrag = 1,
    SwBasedDefrag = 2,
}

mod bitfields {
    use super::*;
    use bitfield::bitfield;
    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct InbSaWord0([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub ar_win, set_ar_win: 2, 0;
        pub hard_life_dec, set_hard_life_dec: 3, 3;
        pub soft_life_dec, set_soft_life_dec: 4, 4;
        pub count_glb_octets, set_count_glb_octets: 5, 5;
        pub count_glb_pkts, set_count_glb_pkts: 6, 6;
        pub count_mib_bytes, set_count_mib_bytes: 7, 7;
        pub count_mib_pkts, set_count_mib_pkts: 8, 8;
        pub hw_ctx_off, set_hw_ctx_off: 15, 9;
        pub ctx_id, set_ctx_id: 31, 16;
        pub orig_pkt_fabs, set_orig_pkt_fabs: 32, 32;
        pub orig_pkt_free, set_orig_pkt_free: 33, 33;
        pub pkind, set_pkind: 39, 34;
        pub et_ovrwr, set_et_ovrwr: 41, 41;
        pub pkt_output, set_pkt_output: 43, 42;
        pub pkt_format, set_pkt_format: 44, 44;
        pub defrag_opt, set_defrag_opt: 46, 45;
        pub x2p_dst, set_x2p_dst: 47, 47;
        pub ctx_push_size, set_ctx_push_size: 54, 48;
        pub ctx_hdr_size, set_ctx_hdr_size: 57, 56;
        pub aop_valid, set_aop_valid: 58, 58;
        pub ctx_size, set_ctx_size: 63, 60;
    }

    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct InbSaWord1([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub orig_pkt_aura, set_orig_pkt_aura: 19, 0;
        pub orig_pkt_foff, set_orig_pkt_foff: 31, 24;
        pub cookie, set_cookie: 63, 32;
    }

    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct SaWord2([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub valid, set_valid: 0, 0;
        pub dir, set_dir: 1, 1;
        pub outer_ip_ver, set_outer_ip_ver: 2, 2;
        pub mode, set_mode: 4, 4;
        pub protocol, set_protocol: 5, 5;
        pub aes_key_len, set_aes_key_len: 7, 6;
        pub enc_type, set_enc_type: 10, 8;
        pub life_unit, set_life_unit: 11, 11;
        pub auth_type, set_auth_type: 15, 12;
        pub encap_type, set_encap_type: 17, 16;
        pub et_ovrwr_ddr_en, set_et_ovrwr_ddr_en: 18, 18;
        pub esn_en, set_esn_en: 19, 19;
        pub tport_l4_incr_csum, set_tport_l4_incr_csum: 20, 20;
        pub ip_hdr_verify, set_ip_hdr_verify: 22, 21;
        pub udp_ports_verify, set_udp_ports_verify: 23, 23;
        pub l3hdr_on_err, set_l3hdr_on_err: 24, 24;
        pub async_mode, set_async_mode: 31, 31;
        pub spi, set_spi: 63, 32;
    }

    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct InbSaWord8([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub salt, set_salt: 63, 32;
    }

    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct InbSaWord10([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub udp_src_port, set_udp_src_port: 47, 32;
        pub udp_dst_port, set_udp_dst_port: 63, 48;
    }
}

pub type InbSaWord0 = bitfields::InbSaWord0<[DescEntryT; 1]>;
pub type InbSaWord1 = bitfields::InbSaWord1<[DescEntryT; 1]>;
pub type SaWord2 = bitfields::SaWord2<[DescEntryT; 1]>;
pub type InbSaWord8 = bitfields::InbSaWord8<[DescEntryT; 1]>;
pub type InbSaWord10 = bitfields::InbSaWord10<[DescEntryT; 1]>;

#[desc_gen]
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InbCtxUpdateReg {
    pub ar_base: u64,
    pub ar_valid_mask: u64,
    pub hard_life: u64,
    pub soft_life: u64,
    pub mib_octs: u64,
    pub mib_pkts: u64,
    pub ar_winbits: [u64; ROC_AR_WINBITS_SZ],
}

/// Inbound SA context as consumed by the inline engine. Word offsets are
/// fixed by firmware.
#[desc_gen(padding_to = INB_SA_HW_SIZE)]
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InboundSa {
    pub w0: InbSaWord0,
    pub w1: InbSaWord1,
    pub w2: SaWord2,
    pub rsvd3: u64,
    pub cipher_key: [u64; CKEY_WORDS],
    pub w8: InbSaWord8,
    pub rsvd9: u64,
    pub w10: InbSaWord10,
    pub outer_hdr: [u64; OUTER_HDR_WORDS],
    pub hmac_opad_ipad: [u64; OPAD_IPAD_WORDS],
    pub ctx: InbCtxUpdateReg,
}

const _: () = assert!(std::mem::size_of::<InboundSa>() == INB_SA_SIZE);
const _: () = assert!(std::mem::align_of::<InboundSa>() == DESC_ENTRY_SIZE);

impl InboundSa {
    pub fn zeroed() -> Self {
        InboundSa {
            w0: InbSaWord0::default(),
            w1: InbSaWord1::default(),
            w2: SaWord2::default(),
            rsvd3: 0,
            cipher_key: [0; CKEY_WORDS],
            w8: InbSaWord8::default(),
            rsvd9: 0,
            w10: InbSaWord10::default(),
            outer_hdr: [0; OUTER_HDR_WORDS],
            hmac_opad_ipad: [0; OPAD_IPAD_WORDS],
            ctx: InbCtxUpdateReg {
                ar_base: 0,
                ar_valid_mask: 0,
                hard_life: 0,
                soft_life: 0,
                mib_octs: 0,
                mib_pkts: 0,
                ar_winbits: [0; ROC_AR_WINBITS_SZ],
            },
        }
    }

    /// Zeroed context with only the context-offset words set. `valid` stays 0.
    pub fn new() -> Self {
        let mut sa = Self::zeroed();
        sa.w0.set_hw_ctx_off(Self::hw_ctx_off());
        sa.w0.set_ctx_push_size(Self::hw_ctx_off() + 1);
        sa
    }

    /// Offset of the update region in 64-bit words.
    pub fn hw_ctx_off() -> u64 {
        (std::mem::offset_of!(InboundSa, ctx) / DESC_ENTRY_SIZE) as u64
    }

    /// Size of the context up to the anti-replay window bits.
    pub fn base_ctx_size() -> usize {
        std::mem::offset_of!(InboundSa, ctx) + std::mem::offset_of!(InbCtxUpdateReg, ar_winbits)
    }

    /// Bytes the engine must load for this context, following `ar_win`.
    pub fn ctx_size(&self) -> usize {
        let ar_win = self.w0.ar_win();
        let mut size = Self::base_ctx_size();
        if ar_win != 0 {
            size += (1 << (ar_win - 1)) * DESC_ENTRY_SIZE;
        }
        size
    }

    pub fn as_words(&self) -> &[u64; INB_SA_WORDS] {
        // SAFETY: repr(C), built only from u64 words and single-array repr(C)
        // wrappers, size and alignment asserted above.
        unsafe { &*(self as *const Self as *const [u64; INB_SA_WORDS]) }
    }

    pub fn from_words(words: &[u64; INB_SA_WORDS]) -> Self {
        // SAFETY: every bit pattern is a valid InboundSa.
        unsafe { std::ptr::read(words.as_ptr() as *const Self) }
    }
}

impl Default for InboundSa {
    fn default() -> Self {
        Self::new()
    }
}
