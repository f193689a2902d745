use super::*;
use oct_inl_ipsec_generator::*;

pub const CPT_INST_SIZE: usize = 64;

pub const ROC_IE_OT_MAJOR_OP_PROCESS_OUTBOUND_IPSEC: u64 = 0x28;
pub const ROC_IE_OT_MAJOR_OP_PROCESS_INBOUND_IPSEC: u64 = 0x29;

pub const ROC_IE_OT_SA_INNER_PKT_IP_CSUM_DISABLE: u16 = 1;
pub const ROC_IE_OT_SA_INNER_PKT_L4_CSUM_DISABLE: u16 = 1;

mod bitfields {
    use super::*;
    use bitfield::bitfield;
    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct CptInst([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub nixtxl, set_nixtxl: 2, 0;
        pub doneint, set_doneint: 3, 3;
        pub nixtx_addr, set_nixtx_addr: 63, 4;
        pub res_addr, set_res_addr: 127, 64;
        pub tag, set_tag: 159, 128;
        pub tt, set_tt: 161, 160;
        pub grp, set_grp: 171, 162;
        pub qord, set_qord: 192, 192;
        pub wqe_ptr, set_wqe_ptr: 255, 195;
        pub dlen, set_dlen: 271, 256;
        pub param2, set_param2: 287, 272;
        pub param1, set_param1: 303, 288;
        pub opcode_major, set_opcode_major: 311, 304;
        pub opcode_minor, set_opcode_minor: 319, 312;
        pub dptr, set_dptr: 383, 320;
        pub rptr, set_rptr: 447, 384;
        pub cptr, set_cptr: 507, 448;
        pub ctx_val, set_ctx_val: 508, 508;
        pub egrp, set_egrp: 511, 509;
    }

    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct InbParam1([u16]);
        impl Debug;
        u16;
        pub l4_csum_disable, set_l4_csum_disable: 0, 0;
        pub ip_csum_disable, set_ip_csum_disable: 1, 1;
        pub esp_trailer_disable, set_esp_trailer_disable: 2, 2;
    }
}

pub type CptInst = bitfields::CptInst<[DescEntryT; CPT_INST_SIZE / DESC_ENTRY_SIZE]>;
pub type InbParam1 = bitfields::InbParam1<[u16; 1]>;

impl InbParam1 {
    pub fn bits(&self) -> u16 {
        self.0[0]
    }
}
