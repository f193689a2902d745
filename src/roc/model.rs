//! In-process model of the native driver layer and host services. Every
//! handle shares one [`ModelState`] so tests can inspect what the driver
//! asked of the hardware.

use super::*;
use crate::desc::sa::{INB_SA_SLOT_SIZE, INB_SA_WORDS};
use crate::error::NativeError;
use crate::flow::Flow;
use crate::inl_dev::spi_mask;
use crate::ipsec::{EspBackendDesc, IpsecSa, IpsecSubsystem};
use crate::vnet::{PortAddArgs, Vnet};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_ENG_CAPS: u64 = (1 << 10) | (1 << 6);
const META_BUF_SZ: u32 = 2048;

#[derive(Clone, Debug)]
pub struct Fault {
    pub err: NativeError,
    /// Matching calls that still succeed before the fault fires.
    pub skip: usize,
    /// Removed after firing.
    pub once: bool,
}

pub struct ModelState {
    pub calls: Vec<String>,
    pub faults: HashMap<String, Fault>,

    pub eng_grp_base: u8,
    pub se_caps: u64,
    pub ie_caps: u64,
    pub ae_caps: u64,

    pub mac: [u8; 6],
    pub max_pkt_len: u32,
    pub nix_cfg: Option<NixCfg>,
    pub nix_inb_spi_range: Option<(u32, u32)>,
    pub inb_mode: bool,
    pub inl_inb: bool,

    pub inl_dev_cfg: Option<InlDevCfg>,
    pub meta_pool_cb: Option<Arc<dyn MetaPoolCb>>,
    /// Callback reachable through the C ABI entry.
    pub c_meta_pool_cb: Option<Arc<dyn MetaPoolCb>>,
    pub meta_pool: Option<MetaPool>,
    pub sa_base: u64,
    pub sa_get_fail: bool,
    pub sa_mem: HashMap<u64, [u64; INB_SA_WORDS]>,
    pub sa_user_data: HashMap<u64, u64>,
    pub sa_syncs: Vec<(u64, SaSyncOp)>,

    pub max_pools: Option<u32>,
    pub zmalloc_fail: bool,
    next_phys: u64,
    next_aura: u64,
    pub npa_pools: HashMap<u64, (u32, u32, u32)>,
    pub npa_ranges: HashMap<u64, (u64, u64)>,
    pub npa_free_bufs: HashMap<u64, u64>,

    pub default_pool_n_buffers: u32,
    next_hw_if: u32,
    pub ports: Vec<(String, PortAddArgs, u32)>,
    pub flows: Vec<Flow>,
    pub flows_enabled: Vec<(u32, u32)>,

    pub esp_backends: Vec<EspBackendDesc>,
    pub selected_backend: Option<u32>,
    pub sas: HashMap<u32, IpsecSa>,
}

impl Default for ModelState {
    fn default() -> Self {
        ModelState {
            calls: vec![],
            faults: HashMap::new(),
            eng_grp_base: 0,
            se_caps: DEFAULT_ENG_CAPS,
            ie_caps: DEFAULT_ENG_CAPS,
            ae_caps: 0,
            mac: [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01],
            max_pkt_len: 9212,
            nix_cfg: None,
            nix_inb_spi_range: None,
            inb_mode: false,
            inl_inb: false,
            inl_dev_cfg: None,
            meta_pool_cb: None,
            c_meta_pool_cb: None,
            meta_pool: None,
            sa_base: 0x1000_0000,
            sa_get_fail: false,
            sa_mem: HashMap::new(),
            sa_user_data: HashMap::new(),
            sa_syncs: vec![],
            max_pools: None,
            zmalloc_fail: false,
            next_phys: 0x2000_0000,
            next_aura: 1,
            npa_pools: HashMap::new(),
            npa_ranges: HashMap::new(),
            npa_free_bufs: HashMap::new(),
            default_pool_n_buffers: 4096,
            next_hw_if: 1,
            ports: vec![],
            flows: vec![],
            flows_enabled: vec![],
            esp_backends: vec![],
            selected_backend: None,
            sas: HashMap::new(),
        }
    }
}

impl ModelState {
    /// Calls whose first word is `name`.
    pub fn count_calls(&self, name: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(name))
            .count()
    }

    fn call(&mut self, entry: impl Into<String>) -> NativeResult<()> {
        let entry = entry.into();
        let name = entry.split_whitespace().next().unwrap_or_default().to_string();
        self.calls.push(entry);
        let Some(fault) = self.faults.get_mut(&name) else {
            return Ok(());
        };
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        let err = fault.err.clone();
        if fault.once {
            self.faults.remove(&name);
        }
        Err(err)
    }

    fn spi_range(&self) -> SpiRange {
        let (min, max) = self
            .inl_dev_cfg
            .map_or((0, 8192), |c| (c.ipsec_in_min_spi, c.ipsec_in_max_spi));
        SpiRange {
            mask: spi_mask(min, max),
            min,
            max,
        }
    }
}

type Shared = Arc<Mutex<ModelState>>;

fn lock(s: &Shared) -> MutexGuard<'_, ModelState> {
    s.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Clone, Default)]
pub struct Model {
    state: Shared,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ModelState> {
        lock(&self.state)
    }

    /// Makes every following call named `name` fail with `e`.
    pub fn inject_fault(&self, name: &str, e: NativeError) {
        self.insert_fault(name, 0, false, e);
    }

    /// Fails only the next call named `name`.
    pub fn inject_fault_once(&self, name: &str, e: NativeError) {
        self.insert_fault(name, 0, true, e);
    }

    /// Lets `skip` calls named `name` through, then fails one.
    pub fn inject_fault_after(&self, name: &str, skip: usize, e: NativeError) {
        self.insert_fault(name, skip, true, e);
    }

    fn insert_fault(&self, name: &str, skip: usize, once: bool, err: NativeError) {
        self.state()
            .faults
            .insert(name.to_string(), Fault { err, skip, once });
    }

    pub fn clear_fault(&self, name: &str) {
        self.state().faults.remove(name);
    }

    pub fn add_sa(&self, sa_index: u32, sa: IpsecSa) {
        self.state().sas.insert(sa_index, sa);
    }

    pub fn cpt(&self) -> Box<dyn RocCpt> {
        Box::new(ModelCpt(self.state.clone()))
    }

    pub fn platform(&self) -> Box<dyn Platform> {
        Box::new(ModelPlatform(self.state.clone()))
    }

    pub fn npa(&self) -> Arc<dyn Npa> {
        Arc::new(ModelNpa(self.state.clone()))
    }

    pub fn vnet(&self) -> Box<dyn Vnet> {
        Box::new(ModelVnet(self.state.clone()))
    }

    pub fn ipsec(&self) -> Box<dyn IpsecSubsystem> {
        Box::new(ModelIpsec(self.state.clone()))
    }
}

struct ModelPlatform(Shared);

impl Platform for ModelPlatform {
    fn cpt(&mut self, _pci: &PciDevice) -> Box<dyn RocCpt> {
        Box::new(ModelCpt(self.0.clone()))
    }

    fn nix(&mut self, _pci: &PciDevice) -> Box<dyn RocNix> {
        Box::new(ModelNix(self.0.clone()))
    }

    fn inl_dev(&mut self, _pci: &PciDevice) -> Box<dyn RocNixInlDev> {
        Box::new(ModelInlDev(self.0.clone()))
    }

    fn npa(&self) -> Arc<dyn Npa> {
        Arc::new(ModelNpa(self.0.clone()))
    }

    fn install_meta_pool_cb(&mut self, cb: Arc<dyn MetaPoolCb>) {
        let mut st = lock(&self.0);
        st.calls.push("oct_pool_inl_meta_pool_cb install".to_string());
        st.c_meta_pool_cb = Some(cb);
    }

    fn uninstall_meta_pool_cb(&mut self) {
        let mut st = lock(&self.0);
        st.calls.push("oct_pool_inl_meta_pool_cb uninstall".to_string());
        st.c_meta_pool_cb = None;
    }
}

struct ModelCpt(Shared);

impl RocCpt for ModelCpt {
    fn dev_init(&mut self) -> NativeResult<()> {
        lock(&self.0).call("roc_cpt_dev_init")
    }

    fn eng_grp_add(&mut self, ty: CptEngType) -> NativeResult<u8> {
        let mut st = lock(&self.0);
        st.call(format!("roc_cpt_eng_grp_add {}", ty))?;
        Ok(st.eng_grp_base
            + match ty {
                CptEngType::Se => 0,
                CptEngType::Ie => 1,
                CptEngType::Ae => 2,
            })
    }

    fn dev_configure(&mut self, nb_lf: u16) -> NativeResult<()> {
        lock(&self.0).call(format!("roc_cpt_dev_configure {}", nb_lf))
    }

    fn lf_init(&mut self, lf_id: u16, nb_desc: u32) -> NativeResult<()> {
        lock(&self.0).call(format!("roc_cpt_lf_init {} {}", lf_id, nb_desc))
    }

    fn iq_enable(&mut self, lf_id: u16) {
        let _ = lock(&self.0).call(format!("roc_cpt_iq_enable {}", lf_id));
    }

    fn lmtline_init(&mut self, lf_id: u16) -> NativeResult<CptLmtLine> {
        lock(&self.0).call(format!("roc_cpt_lmtline_init {}", lf_id))?;
        let base = 0x8000_0000 + ((lf_id as u64) << 20);
        Ok(CptLmtLine {
            io_addr: base,
            lmt_base: base + 0x1000,
            fc_addr: base + 0x2000,
        })
    }

    fn hw_caps(&self, ty: CptEngType) -> CptEngCaps {
        let st = lock(&self.0);
        CptEngCaps::from_bits(match ty {
            CptEngType::Se => st.se_caps,
            CptEngType::Ie => st.ie_caps,
            CptEngType::Ae => st.ae_caps,
        })
    }

    fn dev_fini(&mut self) {
        let _ = lock(&self.0).call("roc_cpt_dev_fini");
    }
}

struct ModelNix(Shared);

impl RocNix for ModelNix {
    fn dev_init(&mut self, cfg: &NixCfg) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call("roc_nix_dev_init")?;
        st.nix_cfg = Some(*cfg);
        Ok(())
    }

    fn npc_mac_addr_get(&self) -> NativeResult<[u8; 6]> {
        let mut st = lock(&self.0);
        st.call("roc_nix_npc_mac_addr_get")?;
        Ok(st.mac)
    }

    fn max_pkt_len(&self) -> u32 {
        lock(&self.0).max_pkt_len
    }

    fn set_inb_spi_range(&mut self, min_spi: u32, max_spi: u32) {
        lock(&self.0).nix_inb_spi_range = Some((min_spi, max_spi));
    }

    fn inl_inb_init(&mut self) -> NativeResult<()> {
        let (cb, nb_bufs) = {
            let mut st = lock(&self.0);
            st.call("roc_nix_inl_inb_init")?;
            if st.meta_pool.is_some() {
                return Ok(());
            }
            let nb_bufs = st.inl_dev_cfg.map_or(0, |c| c.nb_meta_bufs);
            (st.meta_pool_cb.clone(), nb_bufs)
        };
        // the callback allocates through the same state
        if let Some(cb) = cb {
            let pool = cb.call(META_BUF_SZ, nb_bufs, false, None)?;
            lock(&self.0).meta_pool = pool;
        }
        Ok(())
    }

    fn inb_mode_set(&mut self, enable: bool) {
        lock(&self.0).inb_mode = enable;
    }

    fn inl_inb_set(&mut self, enable: bool) {
        lock(&self.0).inl_inb = enable;
    }

    fn dev_fini(&mut self) {
        let _ = lock(&self.0).call("roc_nix_dev_fini");
    }
}

struct ModelInlDev(Shared);

impl RocNixInlDev for ModelInlDev {
    fn dev_init(&mut self, cfg: &InlDevCfg) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call("roc_nix_inl_dev_init")?;
        st.inl_dev_cfg = Some(*cfg);
        Ok(())
    }

    fn meta_pool_cb_register(&mut self, cb: Arc<dyn MetaPoolCb>) {
        lock(&self.0).meta_pool_cb = Some(cb);
    }

    fn inb_spi_range(&self) -> SpiRange {
        lock(&self.0).spi_range()
    }

    fn inb_sa_base(&self) -> u64 {
        lock(&self.0).sa_base
    }

    fn inb_sa_sz(&self) -> u32 {
        INB_SA_SLOT_SIZE as u32
    }

    fn inb_sa_get(&self, spi: u32) -> Option<u64> {
        let st = lock(&self.0);
        let range = st.spi_range();
        if st.sa_get_fail || spi < range.min || spi > range.max {
            return None;
        }
        Some(st.sa_base + (spi & range.mask) as u64 * INB_SA_SLOT_SIZE as u64)
    }

    fn inb_sa_user_data_set(&mut self, sa: u64, user_data: u64) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call("roc_nix_inl_ot_ipsec_inb_sa_sw_rsvd")?;
        st.sa_user_data.insert(sa, user_data);
        Ok(())
    }

    fn ctx_write(&mut self, src: &InboundSa, dst: u64) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call(format!("roc_nix_inl_ctx_write {:#x}", dst))?;
        st.sa_mem.insert(dst, *src.as_words());
        Ok(())
    }

    fn sa_sync(&mut self, sa: u64, op: SaSyncOp) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call(format!("roc_nix_inl_sa_sync {:#x}", sa))?;
        st.sa_syncs.push((sa, op));
        Ok(())
    }

    fn dev_fini(&mut self) {
        let _ = lock(&self.0).call("roc_nix_inl_dev_fini");
    }
}

struct ModelNpa(Shared);

impl Npa for ModelNpa {
    fn maxpools_set(&self, max_pools: u32) {
        lock(&self.0).max_pools = Some(max_pools);
    }

    fn zmalloc(&self, size: u64, align: u64) -> Option<u64> {
        let mut st = lock(&self.0);
        st.calls.push(format!("plt_zmalloc {:#x}", size));
        if st.zmalloc_fail {
            return None;
        }
        let addr = st.next_phys.next_multiple_of(align.max(1));
        st.next_phys = addr + size.max(1);
        Some(addr)
    }

    fn pool_create(
        &self,
        buf_sz: u32,
        nb_bufs: u32,
        _nat_align: bool,
        flags: u32,
    ) -> NativeResult<u64> {
        let mut st = lock(&self.0);
        st.call("roc_npa_pool_create")?;
        let aura_handle = st.next_aura;
        st.next_aura += 1;
        st.npa_pools.insert(aura_handle, (buf_sz, nb_bufs, flags));
        Ok(aura_handle)
    }

    fn aura_op_range_set(&self, aura_handle: u64, start: u64, end: u64) {
        lock(&self.0).npa_ranges.insert(aura_handle, (start, end));
    }

    fn aura_op_free(&self, aura_handle: u64, _addr: u64) {
        *lock(&self.0).npa_free_bufs.entry(aura_handle).or_default() += 1;
    }

    fn aura_op_available(&self, aura_handle: u64) -> u64 {
        lock(&self.0)
            .npa_free_bufs
            .get(&aura_handle)
            .copied()
            .unwrap_or(0)
    }
}

struct ModelVnet(Shared);

impl Vnet for ModelVnet {
    fn port_add(&mut self, dev: &PciDevice, args: &PortAddArgs) -> NativeResult<u32> {
        let mut st = lock(&self.0);
        st.call("vnet_dev_port_add")?;
        let hw_if_index = st.next_hw_if;
        st.next_hw_if += 1;
        st.ports.push((dev.addr.clone(), args.clone(), hw_if_index));
        Ok(hw_if_index)
    }

    fn ports(&self) -> Vec<u32> {
        lock(&self.0).ports.iter().map(|p| p.2).collect()
    }

    fn flow_add(&mut self, flow: &Flow) -> NativeResult<u32> {
        let mut st = lock(&self.0);
        st.call("vnet_flow_add")?;
        st.flows.push(*flow);
        Ok(st.flows.len() as u32 - 1)
    }

    fn flow_enable(&mut self, flow_index: u32, hw_if_index: u32) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call("vnet_flow_enable")?;
        st.flows_enabled.push((flow_index, hw_if_index));
        Ok(())
    }

    fn default_pool_n_buffers(&self) -> u32 {
        lock(&self.0).default_pool_n_buffers
    }
}

struct ModelIpsec(Shared);

impl IpsecSubsystem for ModelIpsec {
    fn register_esp_backend(&mut self, backend: &EspBackendDesc) -> u32 {
        let mut st = lock(&self.0);
        st.esp_backends.push(backend.clone());
        st.esp_backends.len() as u32 - 1
    }

    fn select_esp_backend(&mut self, backend_index: u32) -> NativeResult<()> {
        let mut st = lock(&self.0);
        st.call("ipsec_select_esp_backend")?;
        st.selected_backend = Some(backend_index);
        Ok(())
    }

    fn sa_get(&self, sa_index: u32) -> Option<IpsecSa> {
        lock(&self.0).sas.get(&sa_index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn faults_persist_until_cleared() {
        let model = Model::new();
        model.inject_fault("roc_cpt_dev_init", NativeError::new(-19, "No such device"));
        let mut cpt = model.cpt();
        assert!(cpt.dev_init().is_err());
        assert!(cpt.dev_init().is_err());
        model.clear_fault("roc_cpt_dev_init");
        cpt.dev_init().unwrap();
        assert_eq!(model.state().count_calls("roc_cpt_dev_init"), 3);
    }

    #[test_log::test]
    fn delayed_fault_fires_once() {
        let model = Model::new();
        model.inject_fault_after("roc_cpt_dev_init", 1, NativeError::new(-12, "no mem"));
        let mut cpt = model.cpt();
        cpt.dev_init().unwrap();
        assert_eq!(cpt.dev_init().unwrap_err().code, -12);
        cpt.dev_init().unwrap();
        assert!(model.state().faults.is_empty());
    }

    #[test_log::test]
    fn sa_slots_follow_spi_mask() {
        let model = Model::new();
        let inl = model.platform().inl_dev(&PciDevice::new("0002:1d:00.0", 0x177d, 0xa0f0));
        let base = model.state().sa_base;
        assert_eq!(inl.inb_sa_get(0), Some(base));
        assert_eq!(inl.inb_sa_get(3), Some(base + 3 * 1024));
        assert_eq!(inl.inb_sa_get(8193), None);
    }
}
