//! Interfaces of the native accelerator driver layer. One trait per hardware
//! block; the device sequencer owns one boxed handle per initialized device.

use crate::caps::CptEngCaps;
use crate::desc::sa::InboundSa;
use crate::device::PciDevice;
use crate::error::NativeResult;
use std::sync::Arc;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CptEngType {
    Ae = 1,
    Se = 2,
    Ie = 3,
}

impl std::fmt::Display for CptEngType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CptEngType::Ae => write!(f, "AE"),
            CptEngType::Se => write!(f, "SE"),
            CptEngType::Ie => write!(f, "IE"),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CptLmtLine {
    pub io_addr: u64,
    pub lmt_base: u64,
    pub fc_addr: u64,
}

pub trait RocCpt: Send {
    fn dev_init(&mut self) -> NativeResult<()>;
    /// Returns the group id the firmware assigned.
    fn eng_grp_add(&mut self, ty: CptEngType) -> NativeResult<u8>;
    fn dev_configure(&mut self, nb_lf: u16) -> NativeResult<()>;
    fn lf_init(&mut self, lf_id: u16, nb_desc: u32) -> NativeResult<()>;
    fn iq_enable(&mut self, lf_id: u16);
    fn lmtline_init(&mut self, lf_id: u16) -> NativeResult<CptLmtLine>;
    fn hw_caps(&self, ty: CptEngType) -> CptEngCaps;
    fn dev_fini(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NixCfg {
    pub reta_sz: u16,
    pub max_sqb_count: u32,
    pub hw_vlan_ins: bool,
}

pub trait RocNix: Send {
    fn dev_init(&mut self, cfg: &NixCfg) -> NativeResult<()>;
    fn npc_mac_addr_get(&self) -> NativeResult<[u8; 6]>;
    fn max_pkt_len(&self) -> u32;
    fn set_inb_spi_range(&mut self, min_spi: u32, max_spi: u32);
    fn inl_inb_init(&mut self) -> NativeResult<()>;
    fn inb_mode_set(&mut self, enable: bool);
    fn inl_inb_set(&mut self, enable: bool);
    fn dev_fini(&mut self);
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InlDevCfg {
    pub ipsec_in_min_spi: u32,
    pub ipsec_in_max_spi: u32,
    pub ipsec_out_max_sa: u32,
    pub wqe_skip: u8,
    pub nb_meta_bufs: u32,
    pub attach_cptlf: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpiRange {
    pub mask: u32,
    pub min: u32,
    pub max: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaSyncOp {
    Flush,
    Invalidate,
}

/// Result of a meta pool allocation handed back to the inline device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MetaPool {
    pub aura_handle: u64,
    pub base: u64,
}

/// Allocator the inline device calls when it needs its second pass buffer
/// pool. `Ok(None)` answers a destroy request.
pub trait MetaPoolCb: Send + Sync {
    fn call(
        &self,
        buf_sz: u32,
        nb_bufs: u32,
        destroy: bool,
        name: Option<&str>,
    ) -> NativeResult<Option<MetaPool>>;
}

pub trait RocNixInlDev: Send {
    fn dev_init(&mut self, cfg: &InlDevCfg) -> NativeResult<()>;
    fn meta_pool_cb_register(&mut self, cb: Arc<dyn MetaPoolCb>);
    fn inb_spi_range(&self) -> SpiRange;
    fn inb_sa_base(&self) -> u64;
    fn inb_sa_sz(&self) -> u32;
    /// Address of the inbound SA slot serving `spi`.
    fn inb_sa_get(&self, spi: u32) -> Option<u64>;
    /// Software reserved word of the slot at `sa`.
    fn inb_sa_user_data_set(&mut self, sa: u64, user_data: u64) -> NativeResult<()>;
    fn ctx_write(&mut self, src: &InboundSa, dst: u64) -> NativeResult<()>;
    fn sa_sync(&mut self, sa: u64, op: SaSyncOp) -> NativeResult<()>;
    fn dev_fini(&mut self);
}

pub const ROC_NPA_ZERO_AURA_F: u32 = 1 << 1;

pub trait Npa: Send + Sync {
    fn maxpools_set(&self, max_pools: u32);
    /// Physically contiguous zeroed memory, address 0 never returned.
    fn zmalloc(&self, size: u64, align: u64) -> Option<u64>;
    fn pool_create(&self, buf_sz: u32, nb_bufs: u32, nat_align: bool, flags: u32) -> NativeResult<u64>;
    fn aura_op_range_set(&self, aura_handle: u64, start: u64, end: u64);
    fn aura_op_free(&self, aura_handle: u64, addr: u64);
    fn aura_op_available(&self, aura_handle: u64) -> u64;
}

/// Opens native handles for probed devices.
pub trait Platform {
    fn cpt(&mut self, pci: &PciDevice) -> Box<dyn RocCpt>;
    fn nix(&mut self, pci: &PciDevice) -> Box<dyn RocNix>;
    fn inl_dev(&mut self, pci: &PciDevice) -> Box<dyn RocNixInlDev>;
    fn npa(&self) -> Arc<dyn Npa>;

    /// Points the C ABI meta pool entry at `cb`.
    fn install_meta_pool_cb(&mut self, cb: Arc<dyn MetaPoolCb>) {
        crate::ffi::install_meta_pool_cb(cb);
    }

    fn uninstall_meta_pool_cb(&mut self) {
        crate::ffi::uninstall_meta_pool_cb();
    }
}
