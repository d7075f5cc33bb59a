//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use hsdn_utils::config::ConfigMap;
use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use hsdn_utils::topology::{PortRef, Topology};
use serde::Serialize;
use tokio::time;
use tracing::{Instrument, debug, debug_span, warn};

// Command-queue polling period.
const QUEUE_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

// Facade link representation: flattened endpoints.
#[derive(Debug, Serialize)]
struct LinkBody<'a> {
    device1: &'a str,
    port1: &'a PortRef,
    device2: &'a str,
    port2: &'a PortRef,
}

#[derive(Debug, Serialize)]
struct TopologyBody<'a> {
    devices: &'a [hsdn_utils::topology::Device],
    links: Vec<LinkBody<'a>>,
}

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // HTTP client towards the facade.
    client: reqwest::Client,
    base_url: String,
}

// ===== impl Master =====

impl Master {
    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        let mut drain_interval = time::interval(QUEUE_DRAIN_INTERVAL);

        loop {
            tokio::select! {
                Some(msg) = ibus_rx.recv() => {
                    self.process_ibus_msg(msg).await;
                }
                _ = drain_interval.tick() => {
                    self.drain_queue().await;
                }
            }
        }
    }

    async fn process_ibus_msg(&mut self, msg: IbusMsg) {
        match msg {
            IbusMsg::TopologyUpd(topology) => {
                self.put_topology(&topology).await;
            }
            IbusMsg::PoliciesUpd(policies) => {
                self.put("policies", &*policies).await;
            }
            IbusMsg::ClassicConfigurations(configurations) => {
                self.put_configurations("classic", &configurations).await;
            }
            IbusMsg::SdnConfigurations(configurations) => {
                self.put_configurations("sdn", &configurations).await;
            }
            _ => (),
        }
    }

    async fn put_topology(&self, topology: &Topology) {
        let body = TopologyBody {
            devices: &topology.devices,
            links: topology
                .links
                .iter()
                .map(|link| LinkBody {
                    device1: &link.a.device,
                    port1: &link.a.port,
                    device2: &link.b.device,
                    port2: &link.b.port,
                })
                .collect(),
        };
        self.put("topology", &body).await;
    }

    async fn put_configurations(&self, kind: &str, configurations: &ConfigMap) {
        self.put(&format!("configurations/{kind}"), configurations).await;
    }

    // Snapshot pushes are fire-and-forget; failures are logged and the
    // next publication retries implicitly.
    async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) {
        let url = format!("{}/{}", self.base_url, path);
        if let Err(error) = self.client.put(&url).json(body).send().await {
            debug!(%error, %url, "failed to push snapshot");
        }
    }

    // Drains the facade command queue and republishes each command as a
    // typed event.
    async fn drain_queue(&self) {
        let url = format!("{}/queue", self.base_url);
        let commands: Vec<String> = match self.client.get(&url).send().await {
            Ok(response) => match response.json().await {
                Ok(commands) => commands,
                Err(error) => {
                    debug!(%error, "failed to parse command queue");
                    return;
                }
            },
            Err(error) => {
                debug!(%error, "failed to read command queue");
                return;
            }
        };

        for command in commands {
            self.process_command(&command);
        }
    }

    fn process_command(&self, command: &str) {
        let words = command
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let Some((head, rest)) = words.split_first() else {
            return;
        };

        debug!(%command, "received command");
        match head.as_str() {
            "policy" => self.ibus_tx.policy_command(rest.to_vec()),
            "classic-device" => {
                self.ibus_tx.classic_device_command(rest.to_vec())
            }
            "sdn-device" => self.ibus_tx.sdn_device_command(rest.to_vec()),
            _ => warn!(%command, "unknown command"),
        }
    }
}

// ===== global functions =====

pub fn start(ibus_tx: IbusChannelsTx, ibus_rx: IbusReceiver, base_url: String) {
    tokio::spawn(
        async move {
            let mut master = Master {
                ibus_tx,
                client: reqwest::Client::new(),
                base_url: base_url.trim_end_matches('/').to_string(),
            };

            // Run task main loop.
            master.run(ibus_rx).await;
        }
        .instrument(debug_span!("api")),
    );
}
