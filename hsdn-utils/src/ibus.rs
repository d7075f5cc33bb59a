//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time;

use crate::config::ConfigMap;
use crate::policy::Policy;
use crate::topology::{ClassicSnapshot, SdnSnapshot, Topology};

// Useful type definition(s).
pub type IbusReceiver = UnboundedReceiver<IbusMsg>;
pub type IbusSender = UnboundedSender<IbusMsg>;

// How long a request/reply caller waits before giving up.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Ibus message for communication among the controller components.
//
// Each message kind has a fixed set of consumers, encoded in the
// [`IbusChannelsTx`] helper that routes it. Delivery per (producer,
// consumer) pair is the FIFO order of the underlying channel.
#[derive(Clone, Debug)]
pub enum IbusMsg {
    // Request one discovery pass over all NETCONF devices. The snapshot
    // comes back on `reply_tx` as a `NetconfDiscoveryReply`.
    NetconfDiscovery { reply_tx: IbusSender },
    // Reply to `NetconfDiscovery`.
    NetconfDiscoveryReply(ClassicSnapshot),
    // Classic topology snapshot publication.
    ClassicTopology(ClassicSnapshot),
    // SDN topology snapshot publication.
    SdnTopology(SdnSnapshot),
    // Fused topology publication.
    TopologyUpd(Arc<Topology>),
    // Policy snapshot publication.
    PoliciesUpd(Arc<Vec<Policy>>),
    // Desired configurations for the classic population.
    ClassicConfigurations(Arc<ConfigMap>),
    // Desired configurations for the SDN population.
    SdnConfigurations(Arc<ConfigMap>),
    // `policy ...` command words drained from the facade queue.
    PolicyCommand(Vec<String>),
    // `classic-device ...` command words drained from the facade queue.
    ClassicDeviceCommand(Vec<String>),
    // `sdn-device ...` command words drained from the facade queue.
    SdnDeviceCommand(Vec<String>),
    // A device was renamed; policies referring to it must follow.
    DeviceRename { old: String, new: String },
}

// Transmit handles for sending [`IbusMsg`] messages to each component.
#[derive(Clone, Debug)]
pub struct IbusChannelsTx {
    netconf: IbusSender,
    openflow: IbusSender,
    topology: IbusSender,
    policy: IbusSender,
    generator: IbusSender,
    api: IbusSender,
}

// Receive handles, one per component.
#[derive(Debug)]
pub struct IbusChannelsRx {
    pub netconf: IbusReceiver,
    pub openflow: IbusReceiver,
    pub topology: IbusReceiver,
    pub policy: IbusReceiver,
    pub generator: IbusReceiver,
    pub api: IbusReceiver,
}

// Request/reply failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestError {
    Timeout,
    ChannelClosed,
}

// ===== impl IbusChannelsTx =====

impl IbusChannelsTx {
    // Sends an [`IbusMsg::NetconfDiscovery`] request to the NETCONF driver.
    pub fn netconf_discovery(&self, reply_tx: IbusSender) {
        let _ = self.netconf.send(IbusMsg::NetconfDiscovery { reply_tx });
    }

    // Publishes a classic topology snapshot to the topology manager.
    pub fn classic_topology_upd(&self, snapshot: ClassicSnapshot) {
        let _ = self.topology.send(IbusMsg::ClassicTopology(snapshot));
    }

    // Publishes an SDN topology snapshot to the topology manager.
    pub fn sdn_topology_upd(&self, snapshot: SdnSnapshot) {
        let _ = self.topology.send(IbusMsg::SdnTopology(snapshot));
    }

    // Publishes the fused topology to the generator and the API bridge.
    pub fn topology_upd(&self, topology: Arc<Topology>) {
        let msg = IbusMsg::TopologyUpd(topology);
        let _ = self.generator.send(msg.clone());
        let _ = self.api.send(msg);
    }

    // Publishes the policy snapshot to the generator and the API bridge.
    pub fn policies_upd(&self, policies: Arc<Vec<Policy>>) {
        let msg = IbusMsg::PoliciesUpd(policies);
        let _ = self.generator.send(msg.clone());
        let _ = self.api.send(msg);
    }

    // Dispatches classic configurations to the NETCONF driver and the
    // API bridge.
    pub fn classic_configurations(&self, configurations: Arc<ConfigMap>) {
        let msg = IbusMsg::ClassicConfigurations(configurations);
        let _ = self.netconf.send(msg.clone());
        let _ = self.api.send(msg);
    }

    // Dispatches SDN configurations to the OpenFlow driver and the API
    // bridge.
    pub fn sdn_configurations(&self, configurations: Arc<ConfigMap>) {
        let msg = IbusMsg::SdnConfigurations(configurations);
        let _ = self.openflow.send(msg.clone());
        let _ = self.api.send(msg);
    }

    // Forwards a `policy` queue command to the policy store.
    pub fn policy_command(&self, words: Vec<String>) {
        let _ = self.policy.send(IbusMsg::PolicyCommand(words));
    }

    // Forwards a `classic-device` queue command to the NETCONF driver.
    pub fn classic_device_command(&self, words: Vec<String>) {
        let _ = self.netconf.send(IbusMsg::ClassicDeviceCommand(words));
    }

    // Forwards an `sdn-device` queue command to the OpenFlow driver.
    pub fn sdn_device_command(&self, words: Vec<String>) {
        let _ = self.openflow.send(IbusMsg::SdnDeviceCommand(words));
    }

    // Notifies the policy store of a device rename.
    pub fn device_rename(&self, old: String, new: String) {
        let _ = self.policy.send(IbusMsg::DeviceRename { old, new });
    }
}

// ===== impl RequestError =====

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Timeout => write!(f, "request timed out"),
            RequestError::ChannelClosed => {
                write!(f, "request channel closed")
            }
        }
    }
}

impl std::error::Error for RequestError {}

// ===== global functions =====

// Creates the full set of ibus channels. The `IbusChannelsTx` handle is
// cloned into every component; each receiver goes to its owner.
pub fn ibus_channels() -> (IbusChannelsTx, IbusChannelsRx) {
    let (netconf_tx, netconf_rx) = mpsc::unbounded_channel();
    let (openflow_tx, openflow_rx) = mpsc::unbounded_channel();
    let (topology_tx, topology_rx) = mpsc::unbounded_channel();
    let (policy_tx, policy_rx) = mpsc::unbounded_channel();
    let (generator_tx, generator_rx) = mpsc::unbounded_channel();
    let (api_tx, api_rx) = mpsc::unbounded_channel();

    let tx = IbusChannelsTx {
        netconf: netconf_tx,
        openflow: openflow_tx,
        topology: topology_tx,
        policy: policy_tx,
        generator: generator_tx,
        api: api_tx,
    };
    let rx = IbusChannelsRx {
        netconf: netconf_rx,
        openflow: openflow_rx,
        topology: topology_rx,
        policy: policy_rx,
        generator: generator_rx,
        api: api_rx,
    };

    (tx, rx)
}

// Issues a NETCONF discovery request and waits for the snapshot reply,
// failing after [`REQUEST_TIMEOUT`].
pub async fn request_netconf_discovery(
    ibus_tx: &IbusChannelsTx,
) -> Result<ClassicSnapshot, RequestError> {
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    ibus_tx.netconf_discovery(reply_tx);

    match time::timeout(REQUEST_TIMEOUT, reply_rx.recv()).await {
        Ok(Some(IbusMsg::NetconfDiscoveryReply(snapshot))) => Ok(snapshot),
        Ok(_) => Err(RequestError::ChannelClosed),
        Err(_) => Err(RequestError::Timeout),
    }
}
