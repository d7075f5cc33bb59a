//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Base URL of the HTTP facade.
    pub facade_url: String,
    // OpenFlow controller listen address.
    pub openflow_listen: String,
    pub paths: Paths,
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub netconf_devices: String,
    pub policies: String,
    pub sdn_labels: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub colors: bool,
    pub show_source: bool,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "config/hsdnd.toml";

    // Loads the daemon configuration, falling back to the defaults when
    // no file exists.
    pub fn load(config_file: Option<&str>) -> Config {
        let path = config_file.unwrap_or(Config::DFLT_FILEPATH);
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!(
                        "failed to parse configuration file {path}: {error}"
                    );
                    std::process::exit(1);
                }
            },
            Err(_) => {
                if config_file.is_some() {
                    eprintln!("failed to read configuration file: {path}");
                    std::process::exit(1);
                }
                Config::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            facade_url: "http://127.0.0.1:8000".to_string(),
            openflow_listen: "0.0.0.0:6653".to_string(),
            paths: Paths::default(),
            logging: Logging::default(),
        }
    }
}

impl Default for Paths {
    fn default() -> Paths {
        Paths {
            netconf_devices: "config/netconf.txt".to_string(),
            policies: "config/policy.txt".to_string(),
            sdn_labels: "config/sdn.txt".to_string(),
        }
    }
}

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            colors: true,
            show_source: false,
        }
    }
}
