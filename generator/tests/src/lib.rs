#[cfg(test)]
mod desc_tests {
    use oct_inl_ipsec_generator::*;
    type DescEntryT = u64;

    mod bitfields {
        use super::*;
        #[desc_gen]
        bitfield::bitfield! {
            #[repr(C)]
            #[derive(Default, Copy, Clone)]
            pub struct InstWord([DescEntryT]);
            impl Debug;
            DescEntryT;
            pub dlen, set_dlen: 15, 0;
            pub param1, set_param1: 47, 32;
            pub opcode_major, set_opcode_major: 63, 56;
            pub cptr, set_cptr: 123, 64;
            pub egrp, set_egrp: 127, 125;
        }

        #[desc_gen]
        bitfield::bitfield! {
            #[repr(C)]
            #[derive(Default, Copy, Clone)]
            pub struct Param([u16]);
            impl Debug;
            u16;
            pub l4_dis, set_l4_dis: 2, 2;
            pub ip_dis, set_ip_dis: 3, 3;
        }
    }

    type InstWord = bitfields::InstWord<[DescEntryT; 2]>;
    type Param = bitfields::Param<[u16; 1]>;

    #[desc_gen]
    #[repr(u8)]
    enum EncType {
        Null = 0,
        AesCbc = 3,
        AesGcm = 5,
    }

    #[desc_gen]
    #[repr(u8)]
    enum Dir {
        Outbound,
        Inbound,
    }

    const KEY_WORDS: usize = 4;
    #[desc_gen(padding_to = 64)]
    #[repr(C)]
    #[derive(Copy, Clone, Debug)]
    pub struct Ctx {
        pub w0: InstWord,
        pub key: [u64; KEY_WORDS],
        pub cookie: u32,
        pub reserved: u32,
    }

    #[test]
    fn gen_bitfield_desc_test() {
        let mut w = InstWord::default();
        w.set_cptr(0xfff_ffff_ffff_ffff);
        w.set_egrp(1);
        assert_eq!(w.0[1], 0x2fff_ffff_ffff_ffff);
        let fields = InstWord::fields().collect::<Vec<_>>();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[3].width(), 60);
        let mut c_header = vec![];
        InstWord::gen_header(&HeaderType::C, &mut c_header).unwrap();
        let c_header = String::from_utf8_lossy(&c_header).to_string();
        println!("{}", c_header);
        assert!(c_header.contains("uint64_t dlen: 16;"));
        assert!(c_header.contains("uint64_t cptr: 60;"));
        assert!(c_header.contains("} __attribute__((packed)) InstWord;"));
    }

    #[test]
    fn gen_narrow_bitfield_desc_test() {
        let mut p = Param::default();
        p.set_ip_dis(1);
        p.set_l4_dis(1);
        assert_eq!(p.0[0], 0xc);
        let mut c_header = vec![];
        Param::gen_header(&HeaderType::C, &mut c_header).unwrap();
        let c_header = String::from_utf8_lossy(&c_header).to_string();
        assert!(c_header.contains("uint16_t :2;"));
        assert!(c_header.contains("uint16_t ip_dis: 1;"));
        assert!(c_header.contains("uint16_t :12;"));
    }

    #[test]
    fn gen_enum_desc_test() {
        let _ = EncType::Null;
        let _ = EncType::AesCbc;
        let variants = EncType::variants().collect::<Vec<_>>();
        assert_eq!(variants[2].value, EncType::AesGcm as usize);
        let mut c_header = vec![];
        EncType::gen_header(&HeaderType::C, &mut c_header).unwrap();
        let c_header = String::from_utf8_lossy(&c_header).to_string();
        assert!(c_header.contains("EncType_AesGcm = 5,"));
    }

    #[test]
    fn gen_implicit_enum_desc_test() {
        let _ = Dir::Outbound;
        let variants = Dir::variants().map(|v| (v.name, v.value)).collect::<Vec<_>>();
        assert_eq!(variants, [("Outbound", 0), ("Inbound", Dir::Inbound as usize)]);
        let mut c_header = vec![];
        Dir::gen_header(&HeaderType::C, &mut c_header).unwrap();
        assert!(String::from_utf8_lossy(&c_header).contains("    Dir_Inbound = 1,"));
    }

    #[test]
    fn gen_struct_desc_test() {
        let fields = Ctx::fields().collect::<Vec<_>>();
        assert_eq!(fields.len(), 4);
        let mut c_header = vec![];
        Ctx::gen_header(&HeaderType::C, &mut c_header).unwrap();
        let c_header = String::from_utf8_lossy(&c_header).to_string();
        println!("{}", c_header);
        assert!(c_header.contains("    InstWord w0;"));
        assert!(c_header.contains("    uint64_t key[4];"));
        assert!(c_header.contains("    uint8_t padding[8];"));
    }
}
