//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::policy::{FlowMatch, PolicyParseError, parse_cidr};

// Per-device configuration lists, keyed by device name.
pub type ConfigMap = BTreeMap<String, Vec<ConfigEntry>>;

// One canonical device configuration entry.
//
// Entries are the unit of reconciliation: the generator emits the desired
// list, each driver tracks the applied list, and both sides compare entry
// values. The canonical line grammar is the wire form used in the facade
// JSON and the policy-compiler output:
//
//   address <port> <ip>/<plen>
//   route <cidr> <exit_port> <next_hop>
//   block <src> <dst> <proto> <sport> <dport>
//   route-f <src> <dst> <proto> <sport> <dport> <exit_port>
//   disable <port>
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigEntry {
    Address {
        port: String,
        address: Ipv4Network,
    },
    Route {
        destination: Ipv4Network,
        exit_port: String,
        next_hop: Ipv4Addr,
    },
    Block {
        flow: FlowMatch,
    },
    RouteForward {
        flow: FlowMatch,
        exit_port: String,
    },
    Disable {
        port: String,
    },
}

// ===== impl ConfigEntry =====

impl ConfigEntry {
    // Port referenced by the entry, if any. `Route` and `RouteForward`
    // reference their exit port; `Block` is device-wide.
    pub fn port(&self) -> Option<&str> {
        match self {
            ConfigEntry::Address { port, .. } => Some(port),
            ConfigEntry::Route { exit_port, .. } => Some(exit_port),
            ConfigEntry::RouteForward { exit_port, .. } => Some(exit_port),
            ConfigEntry::Disable { port } => Some(port),
            ConfigEntry::Block { .. } => None,
        }
    }
}

impl std::fmt::Display for ConfigEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigEntry::Address { port, address } => {
                write!(f, "address {port} {address}")
            }
            ConfigEntry::Route {
                destination,
                exit_port,
                next_hop,
            } => {
                write!(f, "route {destination} {exit_port} {next_hop}")
            }
            ConfigEntry::Block { flow } => write!(f, "block {flow}"),
            ConfigEntry::RouteForward { flow, exit_port } => {
                write!(f, "route-f {flow} {exit_port}")
            }
            ConfigEntry::Disable { port } => write!(f, "disable {port}"),
        }
    }
}

impl FromStr for ConfigEntry {
    type Err = PolicyParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words = line.split_whitespace().collect::<Vec<_>>();
        let (kind, args) = words
            .split_first()
            .ok_or(PolicyParseError::WrongArgumentCount)?;

        match *kind {
            "address" => {
                let [port, address] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(ConfigEntry::Address {
                    port: port.to_string(),
                    address: parse_cidr(address)?,
                })
            }
            "route" => {
                let [destination, exit_port, next_hop] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(ConfigEntry::Route {
                    destination: parse_cidr(destination)?,
                    exit_port: exit_port.to_string(),
                    next_hop: next_hop.parse().map_err(|_| {
                        PolicyParseError::InvalidAddress(next_hop.to_string())
                    })?,
                })
            }
            "block" => Ok(ConfigEntry::Block {
                flow: FlowMatch::parse_words(args)?,
            }),
            "route-f" => {
                let [flow @ .., exit_port] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(ConfigEntry::RouteForward {
                    flow: FlowMatch::parse_words(flow)?,
                    exit_port: exit_port.to_string(),
                })
            }
            "disable" => {
                let [port] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(ConfigEntry::Disable {
                    port: port.to_string(),
                })
            }
            _ => Err(PolicyParseError::UnknownType(kind.to_string())),
        }
    }
}

// Configuration entries serialize as their canonical line.
impl Serialize for ConfigEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let line = String::deserialize(deserializer)?;
        line.parse().map_err(D::Error::custom)
    }
}

// ===== global functions =====

// Splits a reconciliation pass into the entries to deconfigure (present
// in `applied` but not in `desired`, in their original insertion order)
// and the entries to configure (present in `desired` but not in
// `applied`). Unchanged entries appear in neither list.
pub fn reconcile(
    applied: &[ConfigEntry],
    desired: &[ConfigEntry],
) -> (Vec<ConfigEntry>, Vec<ConfigEntry>) {
    let deconfigure = applied
        .iter()
        .filter(|entry| !desired.contains(entry))
        .cloned()
        .collect();
    let configure = desired
        .iter()
        .filter(|entry| !applied.contains(entry))
        .cloned()
        .collect();
    (deconfigure, configure)
}
