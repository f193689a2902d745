//! Process wide driver context: device bring-up in dependency order and the
//! ESP backend served to the host IPsec subsystem.

use crate::caps::{DeviceClass, DeviceType, classify};
use crate::config::Config;
use crate::crypto::CryptoMain;
use crate::error::{Error, Result};
use crate::flow::FlowEnable;
use crate::inl_dev::{InlDev, InlMetaPool};
use crate::ipsec::session::SessionTable;
use crate::ipsec::{EspBackend, IpsecSa, IpsecSubsystem, init_ipsec_backend, support};
use crate::logger::{INIT_TAR, IPSEC_TAR};
use crate::nix::NixDev;
use crate::roc::{CptEngType, MetaPoolCb, Npa, Platform};
use crate::vnet::Vnet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PciDevice {
    pub addr: String,
    pub vendor_id: u16,
    pub device_id: u16,
}

impl PciDevice {
    pub fn new(addr: &str, vendor_id: u16, device_id: u16) -> Self {
        PciDevice {
            addr: addr.to_string(),
            vendor_id,
            device_id,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceRef {
    Nix(usize),
    Cpt(usize),
    InlDev,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub pci: PciDevice,
    pub ty: DeviceType,
    pub dev_ref: DeviceRef,
}

pub struct OctMain {
    cfg: Config,
    platform: Box<dyn Platform>,
    vnet: Box<dyn Vnet>,
    ipsec: Box<dyn IpsecSubsystem>,
    npa: Arc<dyn Npa>,
    devices: Vec<Device>,
    nix_devs: Vec<Option<NixDev>>,
    crypto: CryptoMain,
    inl_dev: Option<InlDev>,
    meta_pool_cb: Option<Arc<dyn MetaPoolCb>>,
    sessions: SessionTable,
    flow: FlowEnable,
    esp_backend: Option<u32>,
    pub use_single_rx_aura: bool,
    pub inl_dev_initialized: bool,
    pub nix_initialized: bool,
}

impl OctMain {
    pub fn new(
        cfg: Config,
        platform: Box<dyn Platform>,
        vnet: Box<dyn Vnet>,
        ipsec: Box<dyn IpsecSubsystem>,
    ) -> Result<Self> {
        cfg.validate()?;
        let npa = platform.npa();
        npa.maxpools_set(cfg.max_pools);
        Ok(OctMain {
            cfg,
            platform,
            vnet,
            ipsec,
            npa,
            devices: vec![],
            nix_devs: vec![],
            crypto: CryptoMain::new(),
            inl_dev: None,
            meta_pool_cb: None,
            sessions: SessionTable::new(),
            flow: FlowEnable::default(),
            esp_backend: None,
            use_single_rx_aura: false,
            inl_dev_initialized: false,
            nix_initialized: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn crypto(&self) -> &CryptoMain {
        &self.crypto
    }

    pub fn inl_dev(&self) -> Option<&InlDev> {
        self.inl_dev.as_ref()
    }

    pub fn nix_dev(&self, nix_idx: usize) -> Option<&NixDev> {
        self.nix_devs.get(nix_idx).and_then(|d| d.as_ref())
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn flow_enabled(&self) -> bool {
        self.flow.is_enabled()
    }

    pub fn esp_backend(&self) -> Option<u32> {
        self.esp_backend
    }

    pub fn meta_pool_cb(&self) -> Option<Arc<dyn MetaPoolCb>> {
        self.meta_pool_cb.clone()
    }

    /// Classifies and brings up one probed function. Failures are logged
    /// here and leave the device unmanaged.
    pub fn init_device(&mut self, pci: &PciDevice) -> Result<DeviceType> {
        let r = classify(pci.vendor_id, pci.device_id).and_then(|ty| {
            let dev_ref = match ty.class() {
                DeviceClass::Nix => self.init_nix(pci)?,
                DeviceClass::Cpt => self.init_cpt(pci)?,
                DeviceClass::InlDev => self.init_inl_dev(pci)?,
                DeviceClass::Unknown => {
                    return Err(Error::UnsupportedDevice {
                        vendor_id: pci.vendor_id,
                        device_id: pci.device_id,
                    });
                }
            };
            self.devices.push(Device {
                pci: pci.clone(),
                ty,
                dev_ref,
            });
            Ok(ty)
        });
        match &r {
            Ok(ty) => tracing::info!(target: INIT_TAR, "{}: {:?} initialized", pci.addr, ty),
            Err(e) => tracing::error!(target: INIT_TAR, "{}: init failed: {}", pci.addr, e),
        }
        r
    }

    fn init_nix(&mut self, pci: &PciDevice) -> Result<DeviceRef> {
        let nix_idx = self.nix_devs.len();
        let dev = NixDev::init(
            pci.clone(),
            self.platform.nix(pci),
            self.inl_dev.as_mut(),
            self.sessions.ever_created(),
            self.vnet.as_mut(),
            nix_idx,
        )?;
        self.nix_devs.push(Some(dev));
        self.nix_initialized = true;
        Ok(DeviceRef::Nix(nix_idx))
    }

    fn init_cpt(&mut self, pci: &PciDevice) -> Result<DeviceRef> {
        let idx = self
            .crypto
            .add(pci.clone(), self.platform.cpt(pci), self.npa.as_ref())?;
        Ok(DeviceRef::Cpt(idx))
    }

    fn init_inl_dev(&mut self, pci: &PciDevice) -> Result<DeviceRef> {
        if self.inl_dev.is_some() {
            return Err(Error::NotSupported(
                "only one inline device is supported".to_string(),
            ));
        }
        let mut dev = InlDev::early_init(
            pci.clone(),
            self.platform.inl_dev(pci),
            &self.cfg,
            self.vnet.default_pool_n_buffers(),
        )?;
        let cb: Arc<dyn MetaPoolCb> = Arc::new(InlMetaPool::new(self.npa.clone()));
        dev.register_meta_pool_cb(cb.clone());
        self.platform.install_meta_pool_cb(cb.clone());

        match init_ipsec_backend(self.ipsec.as_mut()) {
            Ok(idx) => self.esp_backend = Some(idx),
            Err(e) => {
                self.platform.uninstall_meta_pool_cb();
                dev.fini();
                return Err(e);
            }
        }

        self.meta_pool_cb = Some(cb);
        self.inl_dev = Some(dev);
        self.use_single_rx_aura = true;
        self.inl_dev_initialized = true;
        Ok(DeviceRef::InlDev)
    }

    /// Releases the native handle of the device at `addr`.
    pub fn remove_device(&mut self, addr: &str) -> Result<()> {
        let pos = self
            .devices
            .iter()
            .position(|d| d.pci.addr == addr)
            .ok_or_else(|| Error::NotSupported(format!("device {} is not managed", addr)))?;
        match self.devices[pos].dev_ref {
            DeviceRef::Nix(idx) => {
                if let Some(mut d) = self.nix_devs[idx].take() {
                    d.fini();
                }
            }
            DeviceRef::Cpt(idx) => self.crypto.fini_dev(idx),
            DeviceRef::InlDev => {
                let busy = self.sessions.iter().filter(|s| s.sa_addr.is_some()).count();
                if busy != 0 {
                    let e = Error::NotSupported(format!(
                        "inline device in use by {} inbound IPsec sessions",
                        busy
                    ));
                    tracing::error!(target: INIT_TAR, "{}: {}", addr, e);
                    return Err(e);
                }
                if let Some(mut d) = self.inl_dev.take() {
                    d.fini();
                }
                if self.meta_pool_cb.take().is_some() {
                    self.platform.uninstall_meta_pool_cb();
                }
                self.inl_dev_initialized = false;
            }
        }
        self.devices.remove(pos);
        tracing::info!(target: INIT_TAR, "{}: removed", addr);
        Ok(())
    }

    pub fn shutdown(&mut self) {
        for mut d in self.nix_devs.iter_mut().filter_map(|d| d.take()) {
            d.fini();
        }
        if let Some(mut d) = self.inl_dev.take() {
            d.fini();
        }
        self.crypto.fini();
        self.devices.clear();
        if self.meta_pool_cb.take().is_some() {
            self.platform.uninstall_meta_pool_cb();
        }
        self.inl_dev_initialized = false;
        tracing::info!(target: INIT_TAR, "shutdown");
    }

    fn session_op(&self, msg: String, source: Error) -> Error {
        tracing::error!(target: IPSEC_TAR, "{}: {}", msg, source);
        Error::SessionOp {
            msg,
            source: Box::new(source),
        }
    }
}

impl EspBackend for OctMain {
    fn check_support(&self, sa: &IpsecSa) -> Result<()> {
        let caps = self
            .crypto
            .caps_dev()
            .ok_or_else(|| Error::NotSupported("no crypto device configured".to_string()))?
            .hw_caps(CptEngType::Ie);
        support::check_support(sa, &caps).inspect_err(|e| {
            tracing::warn!(target: IPSEC_TAR, "SA spi {}: {}", sa.spi, e);
        })
    }

    fn add_del_session(&mut self, sa_index: u32, is_add: bool) -> Result<()> {
        if !is_add {
            return self
                .sessions
                .destroy(sa_index, self.inl_dev.as_mut())
                .map_err(|e| {
                    self.session_op(
                        format!(
                            "IPsec session destroy operation failed for IPsec index {}",
                            sa_index
                        ),
                        e,
                    )
                });
        }

        let sa = self.ipsec.sa_get(sa_index);
        let created = sa
            .as_ref()
            .ok_or(Error::NotFound(sa_index))
            .and_then(|sa| self.sessions.create(sa_index, sa, self.inl_dev.as_mut()));
        if let Err(e) = created {
            return Err(self.session_op(
                format!("ipsec session create failed for sa index {}", sa_index),
                e,
            ));
        }
        tracing::debug!(target: IPSEC_TAR, "session {} created", sa_index);

        if sa.is_some_and(|sa| sa.is_inbound()) {
            if let Err(e) = self.flow.enable(self.vnet.as_mut()) {
                // the host sees a failed add, so nothing may stay behind the index
                if let Err(de) = self.sessions.destroy(sa_index, self.inl_dev.as_mut()) {
                    tracing::error!(target: IPSEC_TAR, "session {} rollback: {}", sa_index, de);
                }
                return Err(self.session_op(
                    format!("ipsec session create failed for sa index {}", sa_index),
                    e,
                ));
            }
        }
        Ok(())
    }
}
