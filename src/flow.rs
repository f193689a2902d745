//! ESP steering to the inline inbound queue.

use crate::error::{Error, Result};
use crate::logger::{STATICS_LEVEL, STATICS_TAR};
use crate::vnet::Vnet;
use smoltcp::wire::IpProtocol;
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowAction {
    RedirectToQueue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowType {
    Ip4IpsecEsp,
}

impl FlowType {
    pub fn protocol(&self) -> IpProtocol {
        match self {
            FlowType::Ip4IpsecEsp => IpProtocol::IpSecEsp,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    pub index: u32,
    pub actions: FlowAction,
    pub ty: FlowType,
    /// 0 matches every SPI.
    pub spi: u32,
    /// `u32::MAX` leaves queue selection to the inline device.
    pub redirect_queue: u32,
}

impl Flow {
    pub fn inline_esp() -> Self {
        Flow {
            index: u32::MAX,
            actions: FlowAction::RedirectToQueue,
            ty: FlowType::Ip4IpsecEsp,
            spi: 0,
            redirect_queue: u32::MAX,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortFlow {
    pub flow_index: u32,
    pub enabled: bool,
}

/// Set once the ESP rule is installed on every port; never cleared. Ports
/// done by an earlier, partially failed attempt are not touched again.
#[derive(Debug, Default)]
pub struct FlowEnable {
    enabled: bool,
    ports: BTreeMap<u32, PortFlow>,
}

impl FlowEnable {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn port(&self, hw_if_index: u32) -> Option<PortFlow> {
        self.ports.get(&hw_if_index).copied()
    }

    pub fn enable(&mut self, vnet: &mut dyn Vnet) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        for hw_if_index in vnet.ports() {
            let flow_index = match self.ports.get(&hw_if_index).copied() {
                Some(p) if p.enabled => continue,
                Some(p) => p.flow_index,
                None => {
                    let flow_index = vnet
                        .flow_add(&Flow::inline_esp())
                        .map_err(|e| Error::native("vnet_flow_add", e))?;
                    self.ports.insert(
                        hw_if_index,
                        PortFlow {
                            flow_index,
                            enabled: false,
                        },
                    );
                    flow_index
                }
            };
            tracing::event!(
                target: STATICS_TAR,
                STATICS_LEVEL,
                name = "esp flow enable",
                flow_index = flow_index,
                hw_if_index = hw_if_index
            );
            vnet.flow_enable(flow_index, hw_if_index)
                .map_err(|e| Error::native("vnet_flow_enable", e))?;
            if let Some(p) = self.ports.get_mut(&hw_if_index) {
                p.enabled = true;
            }
        }
        self.enabled = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::PciDevice;
    use crate::error::NativeError;
    use crate::roc::model::Model;
    use crate::vnet::{PortAddArgs, TxNode};
    use smoltcp::wire::EthernetAddress;

    fn add_ports(vnet: &mut dyn Vnet, n: usize) {
        for i in 0..n {
            let pci = PciDevice::new(&format!("0002:0{}:00.0", i), 0x177d, 0xa063);
            vnet.port_add(
                &pci,
                &PortAddArgs {
                    hw_addr: EthernetAddress([0, 0, 0, 0, 0, i as u8]),
                    max_rx_queues: 64,
                    max_tx_queues: 64,
                    max_rx_frame_size: 9212,
                    tx_node: TxNode::IpsecTm,
                },
            )
            .unwrap();
        }
    }

    #[test_log::test]
    fn enables_once_on_every_port() {
        let model = Model::new();
        let mut vnet = model.vnet();
        add_ports(vnet.as_mut(), 2);
        let mut latch = FlowEnable::default();
        latch.enable(vnet.as_mut()).unwrap();
        latch.enable(vnet.as_mut()).unwrap();
        assert!(latch.is_enabled());
        let st = model.state();
        assert_eq!(st.flows.len(), 2);
        assert!(st.flows.iter().all(|f| *f == Flow::inline_esp()));
        let ports = st.ports.iter().map(|p| p.2).collect::<Vec<_>>();
        assert_eq!(
            st.flows_enabled.iter().map(|f| f.1).collect::<Vec<_>>(),
            ports
        );
    }

    #[test_log::test]
    fn failure_leaves_latch_clear() {
        let model = Model::new();
        let mut vnet = model.vnet();
        add_ports(vnet.as_mut(), 1);
        model.inject_fault("vnet_flow_add", NativeError::new(-1, "no space"));
        let mut latch = FlowEnable::default();
        assert!(latch.enable(vnet.as_mut()).is_err());
        assert!(!latch.is_enabled());
        model.clear_fault("vnet_flow_add");
        latch.enable(vnet.as_mut()).unwrap();
        assert!(latch.is_enabled());
    }

    #[test_log::test]
    fn second_port_add_failure_keeps_first_rule() {
        let model = Model::new();
        let mut vnet = model.vnet();
        add_ports(vnet.as_mut(), 3);
        model.inject_fault_after("vnet_flow_add", 1, NativeError::new(-1, "no space"));
        let mut latch = FlowEnable::default();
        let e = latch.enable(vnet.as_mut()).unwrap_err();
        assert_eq!(e.to_string(), "vnet_flow_add: no space [-1]");
        assert!(!latch.is_enabled());
        assert_eq!(model.state().flows.len(), 1);

        latch.enable(vnet.as_mut()).unwrap();
        assert!(latch.is_enabled());
        let st = model.state();
        assert_eq!(st.flows.len(), 3);
        assert_eq!(st.flows_enabled.len(), 3);
        let ports = st.ports.iter().map(|p| p.2).collect::<Vec<_>>();
        assert_eq!(
            st.flows_enabled.iter().map(|f| f.1).collect::<Vec<_>>(),
            ports
        );
    }

    #[test_log::test]
    fn second_port_enable_failure_reuses_flow() {
        let model = Model::new();
        let mut vnet = model.vnet();
        add_ports(vnet.as_mut(), 2);
        model.inject_fault_after("vnet_flow_enable", 1, NativeError::new(-22, "invalid"));
        let mut latch = FlowEnable::default();
        assert!(latch.enable(vnet.as_mut()).is_err());
        let second = model.state().ports[1].2;
        let pending = latch.port(second).unwrap();
        assert!(!pending.enabled);

        latch.enable(vnet.as_mut()).unwrap();
        assert_eq!(latch.port(second).unwrap().flow_index, pending.flow_index);
        assert!(latch.port(second).unwrap().enabled);
        let st = model.state();
        assert_eq!(st.count_calls("vnet_flow_add"), 2);
        assert_eq!(st.flows_enabled.len(), 2);
        assert_eq!(st.flows_enabled[1], (pending.flow_index, second));
    }

    #[test_log::test]
    fn esp_protocol() {
        assert_eq!(u8::from(Flow::inline_esp().ty.protocol()), 50);
    }
}
