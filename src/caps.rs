use crate::desc::*;
use crate::error::{Error, Result};
use oct_inl_ipsec_generator::*;

pub const CAVIUM_VENDOR_ID: u16 = 0x177d;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceType {
    RvuPf,
    RvuVf,
    LbkVf,
    SdpVf,
    O10kCptVf,
    O9kCptVf,
    RvuInlPf,
    RvuInlVf,
    Unknown,
}

/// Which configurator owns a device type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    Nix,
    Cpt,
    InlDev,
    Unknown,
}

impl DeviceType {
    pub fn class(&self) -> DeviceClass {
        match self {
            DeviceType::RvuPf | DeviceType::RvuVf | DeviceType::LbkVf | DeviceType::SdpVf => {
                DeviceClass::Nix
            }
            DeviceType::O10kCptVf | DeviceType::O9kCptVf => DeviceClass::Cpt,
            DeviceType::RvuInlPf | DeviceType::RvuInlVf => DeviceClass::InlDev,
            DeviceType::Unknown => DeviceClass::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct DeviceTypeEntry {
    pub device_id: u16,
    pub ty: DeviceType,
    pub description: &'static str,
}

pub const DEVICE_TYPES: [DeviceTypeEntry; 8] = [
    DeviceTypeEntry {
        device_id: 0xa063,
        ty: DeviceType::RvuPf,
        description: "Marvell Octeon Resource Virtualization Unit PF",
    },
    DeviceTypeEntry {
        device_id: 0xa064,
        ty: DeviceType::RvuVf,
        description: "Marvell Octeon Resource Virtualization Unit VF",
    },
    DeviceTypeEntry {
        device_id: 0xa0f8,
        ty: DeviceType::LbkVf,
        description: "Marvell Octeon Loopback Unit VF",
    },
    DeviceTypeEntry {
        device_id: 0xa0f7,
        ty: DeviceType::SdpVf,
        description: "Marvell Octeon System DPI Packet Interface Unit VF",
    },
    DeviceTypeEntry {
        device_id: 0xa0f3,
        ty: DeviceType::O10kCptVf,
        description: "Marvell Octeon-10 Cryptographic Accelerator Unit VF",
    },
    DeviceTypeEntry {
        device_id: 0xa0fe,
        ty: DeviceType::O9kCptVf,
        description: "Marvell Octeon-9 Cryptographic Accelerator Unit VF",
    },
    DeviceTypeEntry {
        device_id: 0xa0f0,
        ty: DeviceType::RvuInlPf,
        description: "Marvell Octeon Resource Virtualization Unit Inline Device PF",
    },
    DeviceTypeEntry {
        device_id: 0xa0f1,
        ty: DeviceType::RvuInlVf,
        description: "Marvell Octeon Resource Virtualization Unit Inline Device VF",
    },
];

fn lookup(device_id: u16) -> Option<&'static DeviceTypeEntry> {
    DEVICE_TYPES.iter().find(|e| e.device_id == device_id)
}

pub fn classify(vendor_id: u16, device_id: u16) -> Result<DeviceType> {
    if vendor_id != CAVIUM_VENDOR_ID {
        return Err(Error::UnsupportedDevice {
            vendor_id,
            device_id,
        });
    }
    Ok(lookup(device_id).map_or(DeviceType::Unknown, |e| e.ty))
}

/// Probe hook: description of a device this crate manages, `None` otherwise.
pub fn probe(vendor_id: u16, device_id: u16) -> Option<&'static str> {
    if vendor_id != CAVIUM_VENDOR_ID {
        return None;
    }
    lookup(device_id).map(|e| e.description)
}

mod bitfields {
    use super::*;
    use bitfield::bitfield;
    #[desc_gen]
    bitfield! {
        #[repr(C)]
        #[derive(Default, Copy, Clone, PartialEq, Eq)]
        pub struct CptEngCaps([DescEntryT]);
        impl Debug;
        DescEntryT;
        pub mul, set_mul: 5, 5;
        pub sha1_sha2, set_sha1_sha2: 6, 6;
        pub chacha20, set_chacha20: 7, 7;
        pub zuc_snow3g, set_zuc_snow3g: 8, 8;
        pub sha3, set_sha3: 9, 9;
        pub aes, set_aes: 10, 10;
        pub kasumi, set_kasumi: 11, 11;
        pub des, set_des: 12, 12;
        pub crc, set_crc: 13, 13;
        pub mmul, set_mmul: 14, 14;
        pub pdcp_chain, set_pdcp_chain: 34, 34;
        pub sg_ver2, set_sg_ver2: 35, 35;
    }
}

/// Capability word reported per engine type by the crypto accelerator.
pub type CptEngCaps = bitfields::CptEngCaps<[DescEntryT; 1]>;

impl CptEngCaps {
    pub fn from_bits(bits: u64) -> Self {
        bitfields::CptEngCaps([bits])
    }

    pub fn has_aes(&self) -> bool {
        self.aes() != 0
    }

    pub fn has_sha1_sha2(&self) -> bool {
        self.sha1_sha2() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn classify_known_devices() {
        assert_eq!(classify(0x177d, 0xa063).unwrap(), DeviceType::RvuPf);
        assert_eq!(classify(0x177d, 0xa0f3).unwrap(), DeviceType::O10kCptVf);
        assert_eq!(classify(0x177d, 0xa0f0).unwrap().class(), DeviceClass::InlDev);
        assert_eq!(classify(0x177d, 0xa0f7).unwrap().class(), DeviceClass::Nix);
        assert_eq!(classify(0x177d, 0x1234).unwrap(), DeviceType::Unknown);
    }

    #[test_log::test]
    fn classify_rejects_other_vendor() {
        assert!(matches!(
            classify(0x8086, 0xa063),
            Err(Error::UnsupportedDevice {
                vendor_id: 0x8086,
                device_id: 0xa063
            })
        ));
    }

    #[test_log::test]
    fn probe_descriptions() {
        assert_eq!(
            probe(0x177d, 0xa0fe),
            Some("Marvell Octeon-9 Cryptographic Accelerator Unit VF")
        );
        assert_eq!(probe(0x177d, 0xffff), None);
        assert_eq!(probe(0x10ec, 0xa0fe), None);
    }

    #[test_log::test]
    fn eng_caps_bits() {
        let mut caps = CptEngCaps::default();
        assert!(!caps.has_aes());
        caps.set_aes(1);
        caps.set_sha1_sha2(1);
        assert_eq!(caps.0[0], (1 << 10) | (1 << 6));
        assert_eq!(CptEngCaps::from_bits(1 << 10).has_aes(), true);
        assert_eq!(CptEngCaps::from_bits(1 << 10).has_sha1_sha2(), false);
    }
}
