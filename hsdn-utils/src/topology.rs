//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mac_addr::MacAddr;

// Device population a device belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DeviceKind {
    Classic,
    #[serde(rename = "SDN")]
    Sdn,
}

// Port of a NETCONF-managed device, identified by interface name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ClassicPort {
    pub interface_name: String,
    pub hw_addr: MacAddr,
}

// Port of an OpenFlow datapath, identified by port number.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SdnPort {
    pub port_no: u32,
    pub hw_addr: MacAddr,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
pub enum Port {
    Classic(ClassicPort),
    Sdn(SdnPort),
}

// Device in the fused topology. The name is globally unique and
// user-visible: the hostname for classic devices, the assigned `S<n>`
// label for SDN datapaths.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Device {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub ports: Vec<Port>,
}

// Link endpoint port reference: interface name on classic devices, port
// number on SDN devices.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(u32),
    Name(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Endpoint {
    pub device: String,
    pub port: PortRef,
}

// Bidirectional link. Endpoints are kept sorted by (device, port) so the
// unordered-pair equality is structural.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
}

// Fused topology snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Topology {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
}

// LLDP neighbor entry of an SDN datapath: the ingress port the neighbor
// was heard on and the remaining advertised lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LldpEntry {
    pub port: u32,
    pub ttl: f64,
}

// Discovery snapshot of the classic population: per-host port lists and
// the neighbor → local-interface relation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ClassicSnapshot {
    pub interfaces: BTreeMap<String, Vec<ClassicPort>>,
    pub neighbors: BTreeMap<String, BTreeMap<String, String>>,
}

// Discovery snapshot of the SDN population: per-label port lists and the
// LLDP database.
#[derive(Clone, Debug, Default, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SdnSnapshot {
    pub ports: BTreeMap<String, Vec<SdnPort>>,
    pub neighbors: BTreeMap<String, BTreeMap<String, LldpEntry>>,
}

// ===== impl Port =====

impl Port {
    pub fn hw_addr(&self) -> MacAddr {
        match self {
            Port::Classic(port) => port.hw_addr,
            Port::Sdn(port) => port.hw_addr,
        }
    }

    // The port identifier as used in canonical configuration entries.
    pub fn config_name(&self) -> String {
        match self {
            Port::Classic(port) => port.interface_name.clone(),
            Port::Sdn(port) => port.port_no.to_string(),
        }
    }
}

// ===== impl PortRef =====

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortRef::Number(port_no) => write!(f, "{port_no}"),
            PortRef::Name(name) => write!(f, "{name}"),
        }
    }
}

// ===== impl Endpoint =====

impl Endpoint {
    pub fn new(device: impl Into<String>, port: impl Into<PortRef>) -> Self {
        Endpoint {
            device: device.into(),
            port: port.into(),
        }
    }

    fn sort_key(&self) -> (&str, &PortRef) {
        (&self.device, &self.port)
    }
}

impl From<u32> for PortRef {
    fn from(port_no: u32) -> Self {
        PortRef::Number(port_no)
    }
}

impl From<String> for PortRef {
    fn from(name: String) -> Self {
        PortRef::Name(name)
    }
}

impl From<&str> for PortRef {
    fn from(name: &str) -> Self {
        PortRef::Name(name.to_string())
    }
}

// ===== impl Link =====

impl Link {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        if a.sort_key() <= b.sort_key() {
            Link { a, b }
        } else {
            Link { a: b, b: a }
        }
    }

    // The endpoint owned by `device`, if the link touches it.
    pub fn endpoint_of(&self, device: &str) -> Option<&Endpoint> {
        if self.a.device == device {
            Some(&self.a)
        } else if self.b.device == device {
            Some(&self.b)
        } else {
            None
        }
    }

    // The endpoint facing away from `device`, if the link touches it.
    pub fn peer_of(&self, device: &str) -> Option<&Endpoint> {
        if self.a.device == device {
            Some(&self.b)
        } else if self.b.device == device {
            Some(&self.a)
        } else {
            None
        }
    }
}
