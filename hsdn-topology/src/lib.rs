//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

mod classic;

use std::sync::Arc;

use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use hsdn_utils::task::Task;
use hsdn_utils::topology::{
    ClassicSnapshot, Device, DeviceKind, Endpoint, Link, Port, PortRef,
    SdnSnapshot, Topology,
};
use itertools::Itertools;
use tracing::{Instrument, debug, debug_span};

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // Latest snapshots from both populations.
    classic: ClassicSnapshot,
    sdn: SdnSnapshot,
    // Last published topology, for publish-on-change suppression.
    published: Option<Arc<Topology>>,
    // Classic discovery poller.
    _poller: Task<()>,
}

// ===== impl Master =====

impl Master {
    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        while let Some(msg) = ibus_rx.recv().await {
            match msg {
                IbusMsg::ClassicTopology(snapshot) => {
                    self.classic = snapshot;
                    self.update();
                }
                IbusMsg::SdnTopology(snapshot) => {
                    self.sdn = snapshot;
                    self.update();
                }
                _ => (),
            }
        }
    }

    // Rebuilds the fused topology and republishes it only when the
    // (devices, links) pair actually changed.
    fn update(&mut self) {
        let topology = merge(&self.classic, &self.sdn);
        if self
            .published
            .as_deref()
            .is_some_and(|published| *published == topology)
        {
            return;
        }

        debug!(
            devices = topology.devices.len(),
            links = topology.links.len(),
            "topology updated",
        );
        let topology = Arc::new(topology);
        self.published = Some(topology.clone());
        self.ibus_tx.topology_upd(topology);
    }
}

// ===== global functions =====

// Fuses the classic and SDN snapshots into one device/link graph.
//
// A link is admitted only when the neighbor relation is observed in both
// directions; the reverse direction is searched in the classic neighbor
// tables first, then in the SDN LLDP database.
pub fn merge(classic: &ClassicSnapshot, sdn: &SdnSnapshot) -> Topology {
    let mut devices = vec![];
    let mut links: Vec<Link> = vec![];

    for (hostname, interfaces) in &classic.interfaces {
        devices.push(Device {
            name: hostname.clone(),
            kind: DeviceKind::Classic,
            ports: interfaces
                .iter()
                .cloned()
                .map(Port::Classic)
                .collect(),
        });
    }
    for (label, ports) in &sdn.ports {
        devices.push(Device {
            name: label.clone(),
            kind: DeviceKind::Sdn,
            ports: ports
                .iter()
                .cloned()
                .sorted_by_key(|port| port.port_no)
                .map(Port::Sdn)
                .collect(),
        });
    }

    // Iterate every directed neighbor relation from both sides;
    // duplicates (each link is seen from both directions) are
    // suppressed.
    for (hostname, neighbors) in &classic.neighbors {
        for (neighbor, interface) in neighbors {
            let a = Endpoint::new(hostname.clone(), interface.as_str());
            if let Some(b) = reverse_endpoint(classic, sdn, neighbor, hostname)
            {
                let link = Link::new(a, b);
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }
    }
    for (label, neighbors) in &sdn.neighbors {
        for (neighbor, entry) in neighbors {
            let a = Endpoint::new(label.clone(), entry.port);
            if let Some(b) = reverse_endpoint(classic, sdn, neighbor, label) {
                let link = Link::new(a, b);
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }
    }

    Topology { devices, links }
}

// Looks up the reverse neighbor relation `device` → `peer` and returns
// `device`'s endpoint of the link, if the relation exists.
fn reverse_endpoint(
    classic: &ClassicSnapshot,
    sdn: &SdnSnapshot,
    device: &str,
    peer: &str,
) -> Option<Endpoint> {
    if let Some(interface) = classic
        .neighbors
        .get(device)
        .and_then(|neighbors| neighbors.get(peer))
    {
        return Some(Endpoint::new(device, interface.as_str()));
    }
    if let Some(entry) = sdn
        .neighbors
        .get(device)
        .and_then(|neighbors| neighbors.get(peer))
    {
        return Some(Endpoint::new(device, PortRef::Number(entry.port)));
    }
    debug!(%device, %peer, "unidirectional neighbors found");
    None
}

pub fn start(ibus_tx: IbusChannelsTx, ibus_rx: IbusReceiver) {
    tokio::spawn(
        async move {
            let poller = classic::spawn_poller(ibus_tx.clone());

            let mut master = Master {
                ibus_tx,
                classic: ClassicSnapshot::default(),
                sdn: SdnSnapshot::default(),
                published: None,
                _poller: poller,
            };

            // Run task main loop.
            master.run(ibus_rx).await;
        }
        .instrument(debug_span!("topology")),
    );
}
