use crate::device::PciDevice;
use crate::error::{Error, Result};
use crate::inl_dev::InlDev;
use crate::logger::INIT_TAR;
use crate::roc::{NixCfg, RocNix};
use crate::vnet::{PortAddArgs, TxNode, Vnet};
use smoltcp::wire::EthernetAddress;

pub const ROC_NIX_RSS_RETA_SZ_256: u16 = 256;
pub const NIX_MAX_SQB_COUNT: u32 = 512;
pub const NIX_MAX_QUEUES: u16 = 64;

pub struct NixDev {
    pub pci: PciDevice,
    roc: Box<dyn RocNix>,
    pub mac: EthernetAddress,
    pub hw_if_index: u32,
    pub tx_node: TxNode,
    pub nix_idx: usize,
}

impl NixDev {
    /// Brings up one packet engine and registers its port. With an inline
    /// device present the port transmits through the IPsec TM node, and
    /// attaching is refused once any SA was ever created. A failure after
    /// the engine opened closes it again.
    pub fn init(
        pci: PciDevice,
        mut roc: Box<dyn RocNix>,
        inl_dev: Option<&mut InlDev>,
        sa_ever_created: bool,
        vnet: &mut dyn Vnet,
        nix_idx: usize,
    ) -> Result<Self> {
        roc.dev_init(&NixCfg {
            reta_sz: ROC_NIX_RSS_RETA_SZ_256,
            max_sqb_count: NIX_MAX_SQB_COUNT,
            hw_vlan_ins: true,
        })
        .map_err(|e| Error::native("roc_nix_dev_init", e))?;

        match Self::attach(&pci, roc.as_mut(), inl_dev, sa_ever_created, vnet) {
            Ok((mac, hw_if_index, tx_node)) => Ok(NixDev {
                pci,
                roc,
                mac,
                hw_if_index,
                tx_node,
                nix_idx,
            }),
            Err(e) => {
                roc.dev_fini();
                Err(e)
            }
        }
    }

    fn attach(
        pci: &PciDevice,
        roc: &mut dyn RocNix,
        inl_dev: Option<&mut InlDev>,
        sa_ever_created: bool,
        vnet: &mut dyn Vnet,
    ) -> Result<(EthernetAddress, u32, TxNode)> {
        let mac = EthernetAddress(
            roc.npc_mac_addr_get()
                .map_err(|e| Error::native("roc_nix_npc_mac_addr_get", e))?,
        );

        let mut tx_node = TxNode::Default;
        if let Some(inl_dev) = inl_dev {
            if sa_ever_created {
                return Err(Error::NotSupported(
                    "device attach not allowed after any IPsec SA addition".to_string(),
                ));
            }
            inl_dev.configure_inbound_defaults(roc)?;
            tx_node = TxNode::IpsecTm;
        }

        tracing::info!(target: INIT_TAR, "{}: MAC address is {}", pci.addr, mac);

        let hw_if_index = vnet
            .port_add(
                pci,
                &PortAddArgs {
                    hw_addr: mac,
                    max_rx_queues: NIX_MAX_QUEUES,
                    max_tx_queues: NIX_MAX_QUEUES,
                    max_rx_frame_size: roc.max_pkt_len(),
                    tx_node,
                },
            )
            .map_err(|e| Error::native("vnet_dev_port_add", e))?;
        Ok((mac, hw_if_index, tx_node))
    }

    pub fn fini(&mut self) {
        self.roc.dev_fini();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::NativeError;
    use crate::inl_dev::InlMetaPool;
    use crate::roc::Platform;
    use crate::roc::model::Model;
    use std::sync::Arc;

    fn nix_pci() -> PciDevice {
        PciDevice::new("0002:02:00.0", 0x177d, 0xa063)
    }

    fn inl_dev(model: &Model) -> InlDev {
        let pci = PciDevice::new("0002:1d:00.0", 0x177d, 0xa0f0);
        let mut platform = model.platform();
        let mut dev = InlDev::early_init(pci.clone(), platform.inl_dev(&pci), &Config::default(), 32)
            .unwrap();
        dev.register_meta_pool_cb(Arc::new(InlMetaPool::new(platform.npa())));
        dev
    }

    #[test_log::test]
    fn plain_nix_uses_default_tx() {
        let model = Model::new();
        let mut vnet = model.vnet();
        let dev = NixDev::init(nix_pci(), model.platform().nix(&nix_pci()), None, false, vnet.as_mut(), 0)
            .unwrap();
        assert_eq!(dev.tx_node, TxNode::Default);
        assert_eq!(dev.mac, EthernetAddress(model.state().mac));
        let st = model.state();
        let cfg = st.nix_cfg.unwrap();
        assert_eq!(cfg.reta_sz, 256);
        assert_eq!(cfg.max_sqb_count, 512);
        assert!(cfg.hw_vlan_ins);
        let args = &st.ports[0].1;
        assert_eq!(args.max_rx_queues, 64);
        assert_eq!(args.max_tx_queues, 64);
        assert_eq!(args.max_rx_frame_size, st.max_pkt_len);
        assert_eq!(st.count_calls("roc_nix_inl_inb_init"), 0);
    }

    #[test_log::test]
    fn inline_nix_goes_through_tm() {
        let model = Model::new();
        let mut inl = inl_dev(&model);
        let mut vnet = model.vnet();
        let dev = NixDev::init(
            nix_pci(),
            model.platform().nix(&nix_pci()),
            Some(&mut inl),
            false,
            vnet.as_mut(),
            1,
        )
        .unwrap();
        assert_eq!(dev.tx_node, TxNode::IpsecTm);
        assert_eq!(dev.nix_idx, 1);
        assert_eq!(inl.inb.unwrap().spi_mask, 16383);
        assert_eq!(model.state().ports[0].1.tx_node, TxNode::IpsecTm);
    }

    #[test_log::test]
    fn attach_after_sa_refused() {
        let model = Model::new();
        let mut inl = inl_dev(&model);
        let mut vnet = model.vnet();
        let e = NixDev::init(
            nix_pci(),
            model.platform().nix(&nix_pci()),
            Some(&mut inl),
            true,
            vnet.as_mut(),
            0,
        )
        .err()
        .unwrap();
        assert_eq!(
            e.to_string(),
            "device attach not allowed after any IPsec SA addition"
        );
        let st = model.state();
        assert!(st.ports.is_empty());
        assert_eq!(st.count_calls("roc_nix_inl_inb_init"), 0);
        assert_eq!(st.count_calls("roc_nix_dev_fini"), 1);
    }

    #[test_log::test]
    fn mac_failure_verbatim() {
        let model = Model::new();
        model.inject_fault("roc_nix_npc_mac_addr_get", NativeError::new(-5, "I/O error"));
        let mut vnet = model.vnet();
        let e = NixDev::init(nix_pci(), model.platform().nix(&nix_pci()), None, false, vnet.as_mut(), 0)
            .err()
            .unwrap();
        assert_eq!(e.to_string(), "roc_nix_npc_mac_addr_get: I/O error [-5]");
        assert!(e.is_unsupported_device());
        let st = model.state();
        assert_eq!(st.count_calls("roc_nix_dev_init"), 1);
        assert_eq!(st.count_calls("roc_nix_dev_fini"), 1);
    }

    #[test_log::test]
    fn port_add_failure_closes_engine() {
        let model = Model::new();
        model.inject_fault("vnet_dev_port_add", NativeError::new(-12, "no memory"));
        let mut vnet = model.vnet();
        let e = NixDev::init(nix_pci(), model.platform().nix(&nix_pci()), None, false, vnet.as_mut(), 0)
            .err()
            .unwrap();
        assert_eq!(e.native_code(), Some(-12));
        assert_eq!(model.state().count_calls("roc_nix_dev_fini"), 1);
    }

    #[test_log::test]
    fn failed_open_is_not_closed() {
        let model = Model::new();
        model.inject_fault("roc_nix_dev_init", NativeError::new(-19, "No such device"));
        let mut vnet = model.vnet();
        assert!(
            NixDev::init(nix_pci(), model.platform().nix(&nix_pci()), None, false, vnet.as_mut(), 0)
                .is_err()
        );
        assert_eq!(model.state().count_calls("roc_nix_dev_fini"), 0);
    }
}
