use super::IpsecSa;
use super::sa::{EncapLen, build_inbound, inbound_inst};
use crate::desc::inst::CptInst;
use crate::desc::sa::{INB_SA_SIZE, InboundSa, SaDir};
use crate::error::{Error, Result};
use crate::inl_dev::InlDev;
use crate::logger::{IPSEC_TAR, STATICS_LEVEL, STATICS_TAR};
use crate::native::store_barrier;
use crate::roc::SaSyncOp;
use std::collections::BTreeMap;

pub const ITF_SW_IDX_UNSET: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpsecSession {
    pub sa_index: u32,
    pub spi: u32,
    pub dir: SaDir,
    pub encap: EncapLen,
    pub inst: CptInst,
    /// Tunnel interface, [`ITF_SW_IDX_UNSET`] until bound.
    pub itf_sw_idx: u32,
    /// Inbound context slot, inbound sessions only.
    pub sa_addr: Option<u64>,
}

/// Sessions indexed by the host SA index.
#[derive(Default)]
pub struct SessionTable {
    sessions: BTreeMap<u32, IpsecSession>,
    ever_created: bool,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sa_index: u32) -> Option<&IpsecSession> {
        self.sessions.get(&sa_index)
    }

    /// Occupied slots.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Set by the first successful create, never cleared.
    pub fn ever_created(&self) -> bool {
        self.ever_created
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpsecSession> {
        self.sessions.values()
    }

    pub fn create(
        &mut self,
        sa_index: u32,
        sa: &IpsecSa,
        inl_dev: Option<&mut InlDev>,
    ) -> Result<()> {
        if self.get(sa_index).is_some() {
            return Err(Error::StructuralInvariantViolation(sa_index));
        }

        let mut session = IpsecSession {
            sa_index,
            spi: sa.spi,
            dir: if sa.is_inbound() {
                SaDir::Inbound
            } else {
                SaDir::Outbound
            },
            encap: EncapLen::precalc(sa),
            inst: CptInst::default(),
            itf_sw_idx: 0,
            sa_addr: None,
        };

        if sa.is_inbound() {
            let inl_dev = inl_dev.ok_or_else(|| {
                Error::NotSupported("inbound SA requires an inline device".to_string())
            })?;
            let (addr, inst) = Self::inb_session_update(sa, inl_dev)?;
            session.sa_addr = Some(addr);
            session.inst = inst;
        }

        if sa.is_tunnel() {
            session.itf_sw_idx = ITF_SW_IDX_UNSET;
        }

        self.sessions.insert(sa_index, session);
        self.ever_created = true;
        Ok(())
    }

    fn inb_session_update(sa: &IpsecSa, inl_dev: &mut InlDev) -> Result<(u64, CptInst)> {
        let (min, max) = (inl_dev.in_min_spi(), inl_dev.in_max_spi());
        if sa.spi < min || sa.spi > max {
            return Err(Error::SpiOutOfRange {
                spi: sa.spi,
                min,
                max,
            });
        }
        let addr = inl_dev
            .roc()
            .inb_sa_get(sa.spi)
            .ok_or(Error::ContextUnavailable { spi: sa.spi })?;

        let roc_sa = build_inbound(sa, inl_dev.spi_mask())?;
        store_barrier();
        let inst = inbound_inst(addr);

        let roc = inl_dev.roc_mut();
        roc.inb_sa_user_data_set(addr, sa.stat_index as u64)
            .map_err(|e| Error::native("roc_nix_inl_ot_ipsec_inb_sa_sw_rsvd", e))?;
        tracing::event!(
            target: STATICS_TAR,
            STATICS_LEVEL,
            name = "inb sa ctx write",
            addr = addr,
            size = INB_SA_SIZE
        );
        roc.ctx_write(&roc_sa, addr)
            .map_err(|e| Error::native("roc_nix_inl_ctx_write", e))?;
        tracing::event!(
            target: STATICS_TAR,
            STATICS_LEVEL,
            name = "inb sa flush",
            addr = addr
        );
        if let Err(e) = roc.sa_sync(addr, SaSyncOp::Flush) {
            // leave nothing valid behind the SPI
            if let Err(ie) = roc.ctx_write(&InboundSa::new(), addr) {
                tracing::error!(target: IPSEC_TAR, "inb sa {:#x} invalidate failed: {}", addr, ie);
            } else if let Err(fe) = roc.sa_sync(addr, SaSyncOp::Flush) {
                tracing::error!(target: IPSEC_TAR, "inb sa {:#x} invalidate flush failed: {}", addr, fe);
            }
            return Err(Error::native("roc_nix_inl_sa_sync", e));
        }
        Ok((addr, inst))
    }

    pub fn destroy(&mut self, sa_index: u32, inl_dev: Option<&mut InlDev>) -> Result<()> {
        let session = self.get(sa_index).ok_or(Error::NotFound(sa_index))?;

        if session.dir == SaDir::Inbound {
            let spi = session.spi;
            let inl_dev = inl_dev.ok_or(Error::NotFound(sa_index))?;
            let addr = inl_dev
                .roc()
                .inb_sa_get(spi)
                .ok_or(Error::NotFound(sa_index))?;
            let roc = inl_dev.roc_mut();
            tracing::event!(
                target: STATICS_TAR,
                STATICS_LEVEL,
                name = "inb sa ctx clear",
                addr = addr,
                size = INB_SA_SIZE
            );
            roc.ctx_write(&InboundSa::new(), addr)
                .map_err(|e| Error::native("roc_nix_inl_ctx_write", e))?;
            roc.sa_sync(addr, SaSyncOp::Flush)
                .map_err(|e| Error::native("roc_nix_inl_sa_sync", e))?;
        }

        self.sessions.remove(&sa_index);
        Ok(())
    }
}
