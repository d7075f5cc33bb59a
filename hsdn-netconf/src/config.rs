//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::path::Path;

use tracing::error;

// Parsed NETCONF device file: shared credentials followed by one
// `<ip> <hostname>` line per device.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceFile {
    pub user: String,
    pub password: String,
    pub devices: Vec<(Ipv4Addr, String)>,
}

// ===== impl DeviceFile =====

impl DeviceFile {
    // Parses the device file contents. Malformed device lines are logged
    // and skipped; a missing credentials header yields empty
    // credentials.
    pub fn parse(contents: &str) -> DeviceFile {
        let mut file = DeviceFile::default();
        let mut line_count = 0;

        for line in contents.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            if line_count < 2 {
                let Some((key, value)) = line.split_once('=') else {
                    error!(%line, "invalid credentials line");
                    continue;
                };
                match key.trim() {
                    "user" => file.user = value.trim().to_string(),
                    "password" => file.password = value.trim().to_string(),
                    key => error!(%key, "unknown credentials key"),
                }
                line_count += 1;
                continue;
            }

            let mut words = line.split_whitespace();
            let (Some(address), Some(hostname)) =
                (words.next(), words.next())
            else {
                error!(%line, "invalid device configuration");
                continue;
            };
            match address.parse::<Ipv4Addr>() {
                Ok(address) => {
                    file.devices.push((address, hostname.to_string()));
                }
                Err(_) => {
                    error!(%line, "invalid device configuration");
                }
            }
        }

        file
    }

    // Loads the device file. An unreadable file is fatal to the caller;
    // having no devices to manage is itself valid.
    pub fn load(path: &Path) -> std::io::Result<DeviceFile> {
        let contents = std::fs::read_to_string(path)?;
        Ok(DeviceFile::parse(&contents))
    }

    // Rewrites the device file atomically (temp file + rename).
    pub fn store(&self, path: &Path) -> std::io::Result<()> {
        let mut contents = String::new();
        contents.push_str(&format!("user = {}\n", self.user));
        contents.push_str(&format!("password = {}\n", self.password));
        for (address, hostname) in &self.devices {
            contents.push_str(&format!("{address} {hostname}\n"));
        }

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)
    }
}
