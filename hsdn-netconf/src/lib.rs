//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod config;
pub mod device;
pub mod error;
pub mod session;
pub mod yang;

use std::path::PathBuf;

use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use hsdn_utils::topology::ClassicSnapshot;
use tracing::{Instrument, debug_span, warn};

use crate::config::DeviceFile;
use crate::device::{Device, DeviceState};
use crate::error::Error;

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // Path of the device file.
    config_path: PathBuf,
    // Shared NETCONF credentials.
    user: String,
    password: String,
    // Managed devices.
    devices: Vec<Device>,
}

// ===== impl Master =====

impl Master {
    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        while let Some(msg) = ibus_rx.recv().await {
            self.process_ibus_msg(msg).await;
        }
    }

    async fn process_ibus_msg(&mut self, msg: IbusMsg) {
        match msg {
            IbusMsg::NetconfDiscovery { reply_tx } => {
                let snapshot = self.discover_all().await;
                let _ = reply_tx.send(IbusMsg::NetconfDiscoveryReply(snapshot));
            }
            IbusMsg::ClassicConfigurations(configurations) => {
                for device in self.devices.iter_mut() {
                    if let Some(desired) = configurations.get(&device.hostname)
                    {
                        device.configure_list(desired).await;
                    }
                }
            }
            IbusMsg::ClassicDeviceCommand(words) => {
                self.process_device_command(&words);
            }
            _ => (),
        }
    }

    // Runs one discovery step on every device and snapshots the ones
    // with a working LLDP session.
    async fn discover_all(&mut self) -> ClassicSnapshot {
        let mut snapshot = ClassicSnapshot::default();

        for device in self.devices.iter_mut() {
            device.discover().await;

            if device.state() == DeviceState::ConnectedLldpOn {
                snapshot
                    .interfaces
                    .insert(device.hostname.clone(), device.interfaces.clone());
                snapshot
                    .neighbors
                    .insert(device.hostname.clone(), device.neighbors.clone());
            }
        }

        snapshot
    }

    // `classic-device new <name> <ip>` / `edit <new> old <old>` /
    // `delete <name>` commands from the facade queue.
    fn process_device_command(&mut self, words: &[String]) {
        match words.first().map(String::as_str) {
            Some("new") => {
                let [_, name, address] = words else {
                    warn!(?words, "malformed classic-device command");
                    return;
                };
                let Ok(address) = address.parse() else {
                    warn!(%address, "invalid device address");
                    return;
                };
                self.devices.push(Device::new(
                    address,
                    name.clone(),
                    self.user.clone(),
                    self.password.clone(),
                ));
                self.store_device_file();
            }
            Some("edit") => {
                let Some(separator) =
                    words.iter().position(|word| word == "old")
                else {
                    warn!(?words, "malformed classic-device command");
                    return;
                };
                let new = words[1..separator].join(" ");
                let old = words[separator + 1..].join(" ");

                let Some(device) = self
                    .devices
                    .iter_mut()
                    .find(|device| device.hostname == old)
                else {
                    warn!(%old, "unknown classic device");
                    return;
                };
                device.hostname = new.clone();
                self.store_device_file();
                self.ibus_tx.device_rename(old, new);
            }
            Some("delete") => {
                let [_, name] = words else {
                    warn!(?words, "malformed classic-device command");
                    return;
                };
                self.devices.retain(|device| device.hostname != *name);
                self.store_device_file();
            }
            _ => warn!(?words, "unsupported classic-device command"),
        }
    }

    fn store_device_file(&self) {
        let file = DeviceFile {
            user: self.user.clone(),
            password: self.password.clone(),
            devices: self
                .devices
                .iter()
                .map(|device| (device.ip_address, device.hostname.clone()))
                .collect(),
        };
        if let Err(error) = file.store(&self.config_path) {
            Error::IoError(error).log();
        }
    }
}

// ===== global functions =====

// Starts the NETCONF driver. An unreadable device file is the only
// fatal startup error.
pub fn start(
    ibus_tx: IbusChannelsTx,
    ibus_rx: IbusReceiver,
    config_path: PathBuf,
) -> Result<(), std::io::Error> {
    let file = DeviceFile::load(&config_path)?;

    tokio::spawn(
        async move {
            let devices = file
                .devices
                .iter()
                .map(|(address, hostname)| {
                    Device::new(
                        *address,
                        hostname.clone(),
                        file.user.clone(),
                        file.password.clone(),
                    )
                })
                .collect();

            let mut master = Master {
                ibus_tx,
                config_path,
                user: file.user,
                password: file.password,
                devices,
            };

            // Run task main loop.
            master.run(ibus_rx).await;
        }
        .instrument(debug_span!("netconf")),
    );

    Ok(())
}
