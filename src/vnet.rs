//! Host packet-stack services consumed by the configurators.

use crate::device::PciDevice;
use crate::error::NativeResult;
use crate::flow::Flow;
use smoltcp::wire::EthernetAddress;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxNode {
    Default,
    /// Transmit through the IPsec traffic-manager node.
    IpsecTm,
}

impl TxNode {
    pub fn name(&self) -> &'static str {
        match self {
            TxNode::Default => "octeon-tx",
            TxNode::IpsecTm => "octeon-tx-ipsec-tm",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortAddArgs {
    pub hw_addr: EthernetAddress,
    pub max_rx_queues: u16,
    pub max_tx_queues: u16,
    pub max_rx_frame_size: u32,
    pub tx_node: TxNode,
}

pub trait Vnet {
    /// Registers a port for `dev`, returns its hardware interface index.
    fn port_add(&mut self, dev: &PciDevice, args: &PortAddArgs) -> NativeResult<u32>;
    /// Hardware interface indices of every registered port.
    fn ports(&self) -> Vec<u32>;
    fn flow_add(&mut self, flow: &Flow) -> NativeResult<u32>;
    fn flow_enable(&mut self, flow_index: u32, hw_if_index: u32) -> NativeResult<()>;
    /// Buffer count of the default buffer pool.
    fn default_pool_n_buffers(&self) -> u32;
}
