use crate::caps::CptEngCaps;
use crate::desc::inst::CPT_INST_SIZE;
use crate::device::PciDevice;
use crate::error::{Error, NativeError, Result};
use crate::inl_dev::ROC_ALIGN;
use crate::roc::{CptEngType, CptLmtLine, Npa, RocCpt};
use std::sync::atomic::{AtomicU64, Ordering};

pub const ROC_CPT_DFLT_ENG_GRP_SE: u8 = 0;
pub const ROC_CPT_DFLT_ENG_GRP_SE_IE: u8 = 1;
pub const ROC_CPT_DFLT_ENG_GRP_AE: u8 = 2;

pub const OCT_CPT_LF_MAX_NB_DESC: u32 = 128000;
pub const OCT_CPT_NB_LF: u16 = 1;
pub const OCT_MAX_N_CPT_DEV: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CptLf {
    pub lf_id: u16,
    pub nb_desc: u32,
}

pub struct CryptoDev {
    pub pci: PciDevice,
    roc: Box<dyn RocCpt>,
    eng_grp: [Option<u8>; 4],
    pub lf: Option<CptLf>,
    pub lmtline: Option<CptLmtLine>,
    closed: bool,
}

impl CryptoDev {
    /// Opens the accelerator behind `pci`.
    pub fn init(pci: PciDevice, mut roc: Box<dyn RocCpt>) -> Result<Self> {
        roc.dev_init()
            .map_err(|e| Error::native("roc_cpt_dev_init", e))?;
        Ok(CryptoDev {
            pci,
            roc,
            eng_grp: [None; 4],
            lf: None,
            lmtline: None,
            closed: false,
        })
    }

    pub fn eng_grp(&self, ty: CptEngType) -> Option<u8> {
        self.eng_grp[ty as usize]
    }

    /// SE group first, IE second: firmware hands out group ids in request
    /// order.
    pub fn configure_engine_groups(&mut self, nb_lf: u16) -> Result<()> {
        for ty in [CptEngType::Se, CptEngType::Ie] {
            let grp = self
                .roc
                .eng_grp_add(ty)
                .map_err(|e| Error::native("roc_cpt_eng_grp_add", e))?;
            self.eng_grp[ty as usize] = Some(grp);
        }
        self.check_eng_grp(CptEngType::Ie, ROC_CPT_DFLT_ENG_GRP_SE_IE)?;
        self.check_eng_grp(CptEngType::Se, ROC_CPT_DFLT_ENG_GRP_SE)?;
        self.roc
            .dev_configure(nb_lf)
            .map_err(|e| Error::native("roc_cpt_dev_configure", e))
    }

    fn check_eng_grp(&self, ty: CptEngType, expected: u8) -> Result<()> {
        let actual = self.eng_grp(ty).unwrap_or(u8::MAX);
        if actual != expected {
            return Err(Error::ConfigMismatch {
                engine: match ty {
                    CptEngType::Ae => "AE",
                    CptEngType::Se => "SE",
                    CptEngType::Ie => "IE",
                },
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn configure_queue(&mut self, lf_id: u16, nb_desc: u32) -> Result<()> {
        self.roc
            .lf_init(lf_id, nb_desc)
            .map_err(|e| Error::native("roc_cpt_lf_init", e))?;
        self.lf = Some(CptLf { lf_id, nb_desc });
        self.roc.iq_enable(lf_id);
        self.lmtline = Some(
            self.roc
                .lmtline_init(lf_id)
                .map_err(|e| Error::native("roc_cpt_lmtline_init", e))?,
        );
        Ok(())
    }

    pub fn hw_caps(&self, ty: CptEngType) -> CptEngCaps {
        self.roc.hw_caps(ty)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn fini(&mut self) {
        if !self.closed {
            self.roc.dev_fini();
            self.closed = true;
        }
    }
}

#[derive(Debug, Default)]
pub struct CryptoCounters {
    pub pending: AtomicU64,
    pub success: AtomicU64,
    pub failure: AtomicU64,
}

impl CryptoCounters {
    pub const NAMES: [&'static str; 3] = ["pending", "success", "fail"];

    pub fn get(&self) -> [u64; 3] {
        [
            self.pending.load(Ordering::Relaxed),
            self.success.load(Ordering::Relaxed),
            self.failure.load(Ordering::Relaxed),
        ]
    }
}

/// Submission queue shared by every crypto device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwQueueCfg {
    pub depth: u32,
    pub owner: String,
    /// Pending instruction ring, `depth` instructions.
    pub ring: u64,
}

#[derive(Debug)]
pub struct CryptoShared {
    pub sw_queue: SwQueueCfg,
    pub counters: CryptoCounters,
}

impl CryptoShared {
    fn init(owner: &str, npa: &dyn Npa) -> Result<Self> {
        let ring_sz = OCT_CPT_LF_MAX_NB_DESC as u64 * CPT_INST_SIZE as u64;
        let ring = npa.zmalloc(ring_sz, ROC_ALIGN).ok_or_else(|| {
            Error::native(
                "plt_zmalloc",
                NativeError::new(-12, "Failed to allocate crypto s/w queue"),
            )
        })?;
        Ok(CryptoShared {
            sw_queue: SwQueueCfg {
                depth: OCT_CPT_LF_MAX_NB_DESC,
                owner: owner.to_string(),
                ring,
            },
            counters: CryptoCounters::default(),
        })
    }
}

#[derive(Default)]
pub struct CryptoMain {
    devs: Vec<CryptoDev>,
    crypto_dev: [Option<usize>; 2],
    shared: Option<CryptoShared>,
    pub started: bool,
}

impl CryptoMain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_cpt(&self) -> usize {
        self.devs.len()
    }

    pub fn shared(&self) -> Option<&CryptoShared> {
        self.shared.as_ref()
    }

    /// Device whose capabilities gate SA support checks.
    pub fn caps_dev(&self) -> Option<&CryptoDev> {
        self.crypto_dev[0]
            .map(|i| &self.devs[i])
            .filter(|d| !d.is_closed())
    }

    pub fn latest_dev(&self) -> Option<&CryptoDev> {
        self.crypto_dev[1].map(|i| &self.devs[i])
    }

    pub fn dev(&self, idx: usize) -> Option<&CryptoDev> {
        self.devs.get(idx)
    }

    /// Brings up one accelerator and returns its index. A device whose
    /// bring-up fails after open is closed again.
    pub fn add(&mut self, pci: PciDevice, roc: Box<dyn RocCpt>, npa: &dyn Npa) -> Result<usize> {
        if self.devs.len() == OCT_MAX_N_CPT_DEV || self.started {
            return Err(Error::NotSupported(format!(
                "crypto device {} not supported: {} devices configured{}",
                pci.addr,
                self.devs.len(),
                if self.started { ", crypto started" } else { "" }
            )));
        }
        let mut ocd = CryptoDev::init(pci, roc)?;
        let idx = self.devs.len();
        if let Err(e) = self.conf_dev(&mut ocd, idx, npa) {
            ocd.fini();
            return Err(e);
        }
        if idx == 0 {
            self.crypto_dev[0] = Some(idx);
        }
        self.crypto_dev[1] = Some(idx);
        self.devs.push(ocd);
        Ok(idx)
    }

    fn conf_dev(&mut self, ocd: &mut CryptoDev, idx: usize, npa: &dyn Npa) -> Result<()> {
        ocd.configure_engine_groups(OCT_CPT_NB_LF)?;
        ocd.configure_queue(0, OCT_CPT_LF_MAX_NB_DESC)?;
        if idx == 0 {
            self.shared = Some(CryptoShared::init(&ocd.pci.addr, npa)?);
        }
        Ok(())
    }

    pub fn fini_dev(&mut self, idx: usize) {
        if let Some(d) = self.devs.get_mut(idx) {
            d.fini();
        }
    }

    pub fn fini(&mut self) {
        for d in self.devs.iter_mut() {
            d.fini();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;
    use crate::roc::model::Model;

    fn pci(addr: &str) -> PciDevice {
        PciDevice::new(addr, 0x177d, 0xa0f3)
    }

    #[test_log::test]
    fn two_devices_share_one_init() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        assert_eq!(ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap(), 0);
        assert_eq!(ocm.n_cpt(), 1);
        let first = ocm.shared().unwrap().sw_queue.clone();
        assert_eq!(ocm.add(pci("0002:20:00.2"), model.cpt(), model.npa().as_ref()).unwrap(), 1);
        assert_eq!(ocm.n_cpt(), 2);
        assert_eq!(ocm.shared().unwrap().sw_queue, first);
        assert_eq!(first.owner, "0002:20:00.1");
        assert_eq!(ocm.caps_dev().unwrap().pci.addr, "0002:20:00.1");
        assert_eq!(ocm.latest_dev().unwrap().pci.addr, "0002:20:00.2");
        assert_eq!(ocm.shared().unwrap().counters.get(), [0, 0, 0]);
        let dev = ocm.dev(1).unwrap();
        assert_eq!(dev.eng_grp(CptEngType::Se), Some(ROC_CPT_DFLT_ENG_GRP_SE));
        assert_eq!(dev.eng_grp(CptEngType::Ie), Some(ROC_CPT_DFLT_ENG_GRP_SE_IE));
        assert_eq!(
            dev.lf,
            Some(CptLf {
                lf_id: 0,
                nb_desc: OCT_CPT_LF_MAX_NB_DESC
            })
        );
        let st = model.state();
        assert_eq!(st.count_calls("roc_cpt_iq_enable"), 2);
        assert_eq!(st.count_calls("roc_cpt_dev_configure"), 2);
        assert_eq!(st.count_calls("roc_cpt_lmtline_init"), 2);
        assert_eq!(
            st.calls.iter().filter(|c| c.starts_with("plt_zmalloc")).collect::<Vec<_>>(),
            [&format!("plt_zmalloc {:#x}", OCT_CPT_LF_MAX_NB_DESC as u64 * 64)]
        );
    }

    #[test_log::test]
    fn shared_init_once_across_devices() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap();
        let ring = ocm.shared().unwrap().sw_queue.ring;
        assert_ne!(ring, 0);
        assert_eq!(ring % ROC_ALIGN, 0);
        ocm.shared().unwrap().counters.success.fetch_add(3, Ordering::Relaxed);
        ocm.add(pci("0002:20:00.2"), model.cpt(), model.npa().as_ref()).unwrap();
        assert_eq!(ocm.shared().unwrap().sw_queue.ring, ring);
        assert_eq!(ocm.shared().unwrap().counters.get(), [0, 3, 0]);
        assert_eq!(model.state().count_calls("plt_zmalloc"), 1);
    }

    #[test_log::test]
    fn shared_alloc_failure_closes_device() {
        let model = Model::new();
        model.state().zmalloc_fail = true;
        let mut ocm = CryptoMain::new();
        let e = ocm
            .add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref())
            .unwrap_err();
        assert_eq!(e.native_code(), Some(-12));
        assert_eq!(ocm.n_cpt(), 0);
        assert!(ocm.caps_dev().is_none());
        assert_eq!(model.state().count_calls("roc_cpt_dev_fini"), 1);
    }

    #[test_log::test]
    fn third_device_refused() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap();
        ocm.add(pci("0002:20:00.2"), model.cpt(), model.npa().as_ref()).unwrap();
        assert!(matches!(
            ocm.add(pci("0002:20:00.3"), model.cpt(), model.npa().as_ref()),
            Err(Error::NotSupported(_))
        ));
        assert_eq!(ocm.n_cpt(), 2);
    }

    #[test_log::test]
    fn started_refuses_new_device() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        ocm.started = true;
        assert!(matches!(
            ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()),
            Err(Error::NotSupported(_))
        ));
    }

    #[test_log::test]
    fn engine_group_order() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap();
        let st = model.state();
        let adds = st
            .calls
            .iter()
            .filter(|c| c.starts_with("roc_cpt_eng_grp_add"))
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(adds, ["roc_cpt_eng_grp_add SE", "roc_cpt_eng_grp_add IE"]);
    }

    #[test_log::test]
    fn engine_group_mismatch_is_fatal() {
        let model = Model::new();
        model.state().eng_grp_base = 3;
        let mut ocm = CryptoMain::new();
        let e = ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap_err();
        assert!(matches!(
            e,
            Error::ConfigMismatch {
                engine: "IE",
                expected: ROC_CPT_DFLT_ENG_GRP_SE_IE,
                actual: 4
            }
        ));
        assert_eq!(ocm.n_cpt(), 0);
        assert!(ocm.shared().is_none());
        let st = model.state();
        assert_eq!(st.count_calls("roc_cpt_dev_configure"), 0);
        assert_eq!(st.count_calls("roc_cpt_dev_fini"), 1);
    }

    #[test_log::test]
    fn closed_device_gives_no_caps() {
        let model = Model::new();
        let mut ocm = CryptoMain::new();
        ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap();
        ocm.fini_dev(0);
        ocm.fini();
        assert!(ocm.caps_dev().is_none());
        assert_eq!(model.state().count_calls("roc_cpt_dev_fini"), 1);
    }

    #[test_log::test]
    fn native_failure_verbatim() {
        let model = Model::new();
        model.inject_fault("roc_cpt_lf_init", NativeError::new(-12, "No memory"));
        let mut ocm = CryptoMain::new();
        let e = ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).unwrap_err();
        assert_eq!(e.to_string(), "roc_cpt_lf_init: No memory [-12]");
        assert!(ocm.shared().is_none());
        let st = model.state();
        assert_eq!(st.count_calls("roc_cpt_dev_init"), 1);
        assert_eq!(st.count_calls("roc_cpt_dev_fini"), 1);
    }

    #[test_log::test]
    fn failed_open_needs_no_close() {
        let model = Model::new();
        model.inject_fault("roc_cpt_dev_init", NativeError::new(-19, "No such device"));
        let mut ocm = CryptoMain::new();
        assert!(ocm.add(pci("0002:20:00.1"), model.cpt(), model.npa().as_ref()).is_err());
        assert_eq!(model.state().count_calls("roc_cpt_dev_fini"), 0);
    }
}
