use crate::config::Config;
use crate::device::PciDevice;
use crate::error::{Error, NativeError, NativeResult, Result};
use crate::roc::{
    InlDevCfg, MetaPool, MetaPoolCb, Npa, ROC_NPA_ZERO_AURA_F, RocNix, RocNixInlDev,
};
use std::sync::Arc;

pub const OCT_NIX_INL_META_POOL_NAME: &str = "OCT_NIX_INL_META_POOL";
pub const ROC_ALIGN: u64 = 128;

/// Mask covering every SPI of `[min, max]`, rounded to a power of two.
pub fn spi_mask(min: u32, max: u32) -> u32 {
    let n = max.saturating_sub(min).saturating_add(1);
    n.checked_next_power_of_two().map_or(u32::MAX, |p| p - 1)
}

/// Second pass buffer pool allocator handed to the inline device.
pub struct InlMetaPool {
    npa: Arc<dyn Npa>,
}

impl InlMetaPool {
    pub fn new(npa: Arc<dyn Npa>) -> Self {
        InlMetaPool { npa }
    }
}

impl MetaPoolCb for InlMetaPool {
    fn call(
        &self,
        buf_sz: u32,
        nb_bufs: u32,
        destroy: bool,
        name: Option<&str>,
    ) -> NativeResult<Option<MetaPool>> {
        let name = name.unwrap_or(OCT_NIX_INL_META_POOL_NAME);
        // pool lives until process exit
        if destroy {
            return Ok(None);
        }
        let buf_sz = (buf_sz as u64).next_multiple_of(ROC_ALIGN);
        let total_sz = nb_bufs as u64 * buf_sz;
        let mem_start = self.npa.zmalloc(total_sz, ROC_ALIGN).ok_or_else(|| {
            NativeError::new(-1, format!("Failed to allocate physmem for pool {}", name))
        })?;
        let aura_handle = self
            .npa
            .pool_create(buf_sz as u32, nb_bufs, true, ROC_NPA_ZERO_AURA_F)?;
        self.npa
            .aura_op_range_set(aura_handle, mem_start, mem_start + total_sz);
        for i in 0..nb_bufs as u64 {
            self.npa.aura_op_free(aura_handle, mem_start + i * buf_sz);
        }
        // read back so the frees are committed
        self.npa.aura_op_available(aura_handle);
        Ok(Some(MetaPool {
            aura_handle,
            base: mem_start,
        }))
    }
}

/// Inbound SA table location, read back after the first NIX inbound setup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InbSaTable {
    pub sa_base: u64,
    pub sa_sz: u32,
    pub spi_mask: u32,
}

pub struct InlDev {
    pub pci: PciDevice,
    roc: Box<dyn RocNixInlDev>,
    pub cfg: InlDevCfg,
    pub inb: Option<InbSaTable>,
}

impl InlDev {
    pub fn early_init(
        pci: PciDevice,
        mut roc: Box<dyn RocNixInlDev>,
        config: &Config,
        nb_meta_bufs: u32,
    ) -> Result<Self> {
        let cfg = InlDevCfg {
            ipsec_in_min_spi: config.ipsec_in_min_spi,
            ipsec_in_max_spi: config.ipsec_in_max_spi,
            ipsec_out_max_sa: config.ipsec_out_max_sa,
            wqe_skip: 0,
            nb_meta_bufs,
            attach_cptlf: true,
        };
        roc.dev_init(&cfg)
            .map_err(|e| Error::native("roc_nix_inl_dev_init", e))?;
        Ok(InlDev {
            pci,
            roc,
            cfg,
            inb: None,
        })
    }

    pub fn register_meta_pool_cb(&mut self, cb: Arc<dyn MetaPoolCb>) {
        self.roc.meta_pool_cb_register(cb);
    }

    pub fn in_min_spi(&self) -> u32 {
        self.cfg.ipsec_in_min_spi
    }

    pub fn in_max_spi(&self) -> u32 {
        self.cfg.ipsec_in_max_spi
    }

    pub fn spi_mask(&self) -> u32 {
        self.inb
            .map_or_else(|| self.roc.inb_spi_range().mask, |t| t.spi_mask)
    }

    /// Turns on inline inbound processing for one packet engine and caches
    /// the inbound SA table layout.
    pub fn configure_inbound_defaults(&mut self, nix: &mut dyn RocNix) -> Result<()> {
        nix.set_inb_spi_range(self.cfg.ipsec_in_min_spi, self.cfg.ipsec_in_max_spi);
        nix.inl_inb_init()
            .map_err(|e| Error::native("roc_nix_inl_inb_init", e))?;
        nix.inb_mode_set(true);
        nix.inl_inb_set(true);
        self.inb = Some(InbSaTable {
            sa_base: self.roc.inb_sa_base(),
            sa_sz: self.roc.inb_sa_sz(),
            spi_mask: self.roc.inb_spi_range().mask,
        });
        Ok(())
    }

    pub fn roc(&self) -> &dyn RocNixInlDev {
        self.roc.as_ref()
    }

    pub fn roc_mut(&mut self) -> &mut dyn RocNixInlDev {
        self.roc.as_mut()
    }

    pub fn fini(&mut self) {
        self.roc.dev_fini();
    }
}
