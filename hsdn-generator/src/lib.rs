//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod routing;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hsdn_utils::config::{ConfigEntry, ConfigMap};
use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use hsdn_utils::policy::Policy;
use hsdn_utils::topology::{Device, DeviceKind, Topology};
use ipnetwork::Ipv4Network;
use tracing::{Instrument, debug, debug_span};

use crate::routing::{LinkAddresses, shortest_paths};

// Minimum spacing between two compilation runs.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // Latest inputs.
    policies: Arc<Vec<Policy>>,
    topology: Arc<Topology>,
    // Link subnet allocations, stable for the process lifetime.
    link_addresses: LinkAddresses,
    // Start time of the last run that proceeded.
    last_run: Option<Instant>,
}

// ===== impl Master =====

impl Master {
    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        while let Some(msg) = ibus_rx.recv().await {
            match msg {
                IbusMsg::PoliciesUpd(policies) => {
                    if policies != self.policies {
                        self.policies = policies;
                        self.update();
                    }
                }
                IbusMsg::TopologyUpd(topology) => {
                    if topology != self.topology {
                        self.topology = topology;
                        self.update();
                    }
                }
                _ => (),
            }
        }
    }

    // Recompiles and dispatches the per-device configurations. A run
    // that proceeds stamps the debounce timer at its start; a debounced
    // invocation returns without touching it.
    fn update(&mut self) {
        let now = Instant::now();
        if !should_run(self.last_run, now) {
            return;
        }
        self.last_run = Some(now);

        let configurations = compile(
            &self.policies,
            &self.topology,
            &mut self.link_addresses,
        );
        debug!(devices = configurations.len(), "generated configurations");

        let (classic, sdn) = split(&configurations, &self.topology);
        self.ibus_tx.classic_configurations(Arc::new(classic));
        self.ibus_tx.sdn_configurations(Arc::new(sdn));
    }
}

// ===== global functions =====

// Debounce predicate: at most one run per interval.
pub fn should_run(last_run: Option<Instant>, now: Instant) -> bool {
    match last_run {
        Some(last_run) => now.duration_since(last_run) >= DEBOUNCE_INTERVAL,
        None => true,
    }
}

// Compiles (policies, topology) into per-device configuration lists.
//
// Device-local policies compile first, then global routing: every link
// gets a /30 from the allocator and both endpoint addresses are
// installed, then every device gets a route towards every address policy
// target it can reach, via its shortest-path next hop.
pub fn compile(
    policies: &[Policy],
    topology: &Topology,
    link_addresses: &mut LinkAddresses,
) -> ConfigMap {
    let mut configurations = ConfigMap::new();
    // Valid address policies, keyed by device.
    let mut addresses: BTreeMap<String, Vec<Ipv4Network>> = BTreeMap::new();
    // Route-forward entries are held back until the link addresses are
    // emitted: their next hop derives from the exit port's /30, so the
    // address must precede them in the configuration list.
    let mut route_forwards: Vec<(String, ConfigEntry)> = vec![];

    for policy in policies {
        match policy {
            Policy::Address(policy) => {
                let Some(device) = device(topology, &policy.device) else {
                    debug!(device = %policy.device, "skipped address policy");
                    continue;
                };
                let Some(port) = device.ports.get(policy.interface) else {
                    debug!(device = %policy.device,
                        interface = policy.interface,
                        "skipped address policy");
                    continue;
                };
                configurations
                    .entry(policy.device.clone())
                    .or_default()
                    .push(ConfigEntry::Address {
                        port: port.config_name(),
                        address: policy.address,
                    });
                addresses
                    .entry(policy.device.clone())
                    .or_default()
                    .push(policy.address);
            }
            Policy::Block(policy) => {
                if device(topology, &policy.device).is_some() {
                    configurations
                        .entry(policy.device.clone())
                        .or_default()
                        .push(ConfigEntry::Block {
                            flow: policy.flow.clone(),
                        });
                }
            }
            Policy::RouteForward(policy) => {
                if device(topology, &policy.device).is_some() {
                    route_forwards.push((
                        policy.device.clone(),
                        ConfigEntry::RouteForward {
                            flow: policy.flow.clone(),
                            exit_port: policy.port.clone(),
                        },
                    ));
                }
            }
            Policy::Disable(policy) => {
                if device(topology, &policy.device).is_some() {
                    configurations
                        .entry(policy.device.clone())
                        .or_default()
                        .push(ConfigEntry::Disable {
                            port: policy.port.clone(),
                        });
                }
            }
            // Flow, route, zone and global policies produce no
            // device-local configuration today.
            _ => (),
        }
    }

    // Link subnets: both endpoints of every link get a /30 host address.
    let mut endpoint_addresses: BTreeMap<(String, String), Ipv4Network> =
        BTreeMap::new();
    for link in &topology.links {
        let Some((addr_a, addr_b)) = link_addresses.allocate(link) else {
            continue;
        };
        for (endpoint, address) in
            [(&link.a, addr_a), (&link.b, addr_b)]
        {
            configurations
                .entry(endpoint.device.clone())
                .or_default()
                .push(ConfigEntry::Address {
                    port: endpoint.port.to_string(),
                    address,
                });
            endpoint_addresses.insert(
                (endpoint.device.clone(), endpoint.port.to_string()),
                address,
            );
        }
    }

    for (device, entry) in route_forwards {
        configurations.entry(device).or_default().push(entry);
    }

    // Routes: shortest path from every device towards every device that
    // carries at least one address policy.
    for source in &topology.devices {
        let paths = shortest_paths(&topology.links, &source.name);

        for (target, target_addresses) in &addresses {
            if *target == source.name {
                continue;
            }
            // Unreachable targets produce no route entries.
            let Some(next_hop) = paths.next_hop(target) else {
                continue;
            };
            let Some(link) = topology.links.iter().find(|link| {
                link.endpoint_of(&source.name).is_some()
                    && link.peer_of(&source.name).is_some_and(|peer| {
                        peer.device == next_hop
                    })
            }) else {
                continue;
            };
            let exit_port = link
                .endpoint_of(&source.name)
                .expect("link was selected by endpoint")
                .port
                .to_string();
            let peer = link
                .peer_of(&source.name)
                .expect("link was selected by endpoint");
            let Some(next_hop_address) = endpoint_addresses
                .get(&(peer.device.clone(), peer.port.to_string()))
            else {
                continue;
            };

            for address in target_addresses {
                configurations
                    .entry(source.name.clone())
                    .or_default()
                    .push(ConfigEntry::Route {
                        destination: *address,
                        exit_port: exit_port.clone(),
                        next_hop: next_hop_address.ip(),
                    });
            }
        }
    }

    configurations
}

// Splits the compiled configurations by device kind.
pub fn split(
    configurations: &ConfigMap,
    topology: &Topology,
) -> (ConfigMap, ConfigMap) {
    let mut classic = ConfigMap::new();
    let mut sdn = ConfigMap::new();
    for (name, entries) in configurations {
        match device(topology, name).map(|device| device.kind) {
            Some(DeviceKind::Classic) => {
                classic.insert(name.clone(), entries.clone());
            }
            Some(DeviceKind::Sdn) => {
                sdn.insert(name.clone(), entries.clone());
            }
            None => (),
        }
    }
    (classic, sdn)
}

// ===== helper functions =====

fn device<'a>(topology: &'a Topology, name: &str) -> Option<&'a Device> {
    topology.devices.iter().find(|device| device.name == name)
}

pub fn start(ibus_tx: IbusChannelsTx, ibus_rx: IbusReceiver) {
    tokio::spawn(
        async move {
            let mut master = Master {
                ibus_tx,
                policies: Arc::new(vec![]),
                topology: Arc::new(Topology::default()),
                link_addresses: LinkAddresses::new(),
                last_run: None,
            };

            // Run task main loop.
            master.run(ibus_rx).await;
        }
        .instrument(debug_span!("generator")),
    );
}
