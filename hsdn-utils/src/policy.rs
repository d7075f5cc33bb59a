//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

// User-defined policy.
//
// Policies are declared one per line in the policy file; the first word
// selects the variant. `Display` emits the canonical line and `FromStr`
// parses it back, so encode-then-parse is the identity.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Policy {
    Global(GlobalPolicy),
    Address(AddressPolicy),
    Flow(FlowPolicy),
    Block(BlockPolicy),
    Route(RoutePolicy),
    #[serde(rename = "route-f")]
    RouteForward(RouteForwardPolicy),
    Zone(ZonePolicy),
    Disable(DisablePolicy),
}

// Network-wide commands enabled by a `global` policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalCommand {
    Routing,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct GlobalPolicy {
    pub command: GlobalCommand,
}

// Assigns an IPv4 address to the Nth port of a device.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AddressPolicy {
    pub device: String,
    pub interface: usize,
    pub address: Ipv4Network,
}

// Named traffic flow definition.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct FlowPolicy {
    pub name: String,
    #[serde(flatten)]
    pub flow: FlowMatch,
}

// Drops matching IPv4 traffic egressing the device.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BlockPolicy {
    pub device: String,
    #[serde(flatten)]
    pub flow: FlowMatch,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RoutePolicy {
    pub device: String,
    #[serde(flatten)]
    pub flow: FlowMatch,
    pub port: String,
}

// Policy-based forwarding of matching traffic out a specific port.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteForwardPolicy {
    pub device: String,
    #[serde(flatten)]
    pub flow: FlowMatch,
    pub port: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ZonePolicy {
    pub device: String,
    pub zone: String,
}

// Administratively shuts a port.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DisablePolicy {
    pub device: String,
    pub port: String,
}

// IPv4 five-tuple match. `None` stands for the `*` wildcard.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct FlowMatch {
    pub src: Option<Ipv4Network>,
    pub dst: Option<Ipv4Network>,
    pub proto: Option<u8>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

// Policy line parse failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PolicyParseError {
    UnknownType(String),
    WrongArgumentCount,
    InvalidAddress(String),
    InvalidInteger(String),
    InvalidCommand(String),
}

// ===== impl Policy =====

impl Policy {
    // Device the policy applies to, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            Policy::Global(_) | Policy::Flow(_) => None,
            Policy::Address(p) => Some(&p.device),
            Policy::Block(p) => Some(&p.device),
            Policy::Route(p) => Some(&p.device),
            Policy::RouteForward(p) => Some(&p.device),
            Policy::Zone(p) => Some(&p.device),
            Policy::Disable(p) => Some(&p.device),
        }
    }

    // Rewrites the device field if it matches `old`. Returns whether the
    // policy changed.
    pub fn rename_device(&mut self, old: &str, new: &str) -> bool {
        let device = match self {
            Policy::Global(_) | Policy::Flow(_) => return false,
            Policy::Address(p) => &mut p.device,
            Policy::Block(p) => &mut p.device,
            Policy::Route(p) => &mut p.device,
            Policy::RouteForward(p) => &mut p.device,
            Policy::Zone(p) => &mut p.device,
            Policy::Disable(p) => &mut p.device,
        };
        if device == old {
            *device = new.to_owned();
            true
        } else {
            false
        }
    }

    pub fn as_address(&self) -> Option<&AddressPolicy> {
        match self {
            Policy::Address(p) => Some(p),
            _ => None,
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Global(p) => {
                let command = match p.command {
                    GlobalCommand::Routing => "routing",
                };
                write!(f, "global {command}")
            }
            Policy::Address(p) => {
                write!(f, "address {} {} {}", p.device, p.interface, p.address)
            }
            Policy::Flow(p) => write!(f, "flow {} {}", p.name, p.flow),
            Policy::Block(p) => write!(f, "block {} {}", p.device, p.flow),
            Policy::Route(p) => {
                write!(f, "route {} {} {}", p.device, p.flow, p.port)
            }
            Policy::RouteForward(p) => {
                write!(f, "route-f {} {} {}", p.device, p.flow, p.port)
            }
            Policy::Zone(p) => write!(f, "zone {} {}", p.device, p.zone),
            Policy::Disable(p) => write!(f, "disable {} {}", p.device, p.port),
        }
    }
}

impl FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words = line.split_whitespace().collect::<Vec<_>>();
        let (kind, args) = words
            .split_first()
            .ok_or(PolicyParseError::WrongArgumentCount)?;

        match *kind {
            "global" => {
                let [command] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                let command = match *command {
                    "routing" => GlobalCommand::Routing,
                    _ => {
                        return Err(PolicyParseError::InvalidCommand(
                            command.to_string(),
                        ));
                    }
                };
                Ok(Policy::Global(GlobalPolicy { command }))
            }
            "address" => {
                let [device, interface, address] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Address(AddressPolicy {
                    device: device.to_string(),
                    interface: parse_int(interface)?,
                    address: parse_cidr(address)?,
                }))
            }
            "flow" => {
                let [name, flow @ ..] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Flow(FlowPolicy {
                    name: name.to_string(),
                    flow: FlowMatch::parse_words(flow)?,
                }))
            }
            "block" => {
                let [device, flow @ ..] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Block(BlockPolicy {
                    device: device.to_string(),
                    flow: FlowMatch::parse_words(flow)?,
                }))
            }
            "route" => {
                let [device, flow @ .., port] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Route(RoutePolicy {
                    device: device.to_string(),
                    flow: FlowMatch::parse_words(flow)?,
                    port: port.to_string(),
                }))
            }
            "route-f" => {
                let [device, flow @ .., port] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::RouteForward(RouteForwardPolicy {
                    device: device.to_string(),
                    flow: FlowMatch::parse_words(flow)?,
                    port: port.to_string(),
                }))
            }
            "zone" => {
                let [device, zone] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Zone(ZonePolicy {
                    device: device.to_string(),
                    zone: zone.to_string(),
                }))
            }
            "disable" => {
                let [device, port] = args else {
                    return Err(PolicyParseError::WrongArgumentCount);
                };
                Ok(Policy::Disable(DisablePolicy {
                    device: device.to_string(),
                    port: port.to_string(),
                }))
            }
            _ => Err(PolicyParseError::UnknownType(kind.to_string())),
        }
    }
}

// ===== impl FlowMatch =====

impl FlowMatch {
    // Parses the `<src> <dst> <proto> <sport> <dport>` word sequence.
    pub fn parse_words(words: &[&str]) -> Result<Self, PolicyParseError> {
        let [src, dst, proto, src_port, dst_port] = words else {
            return Err(PolicyParseError::WrongArgumentCount);
        };
        Ok(FlowMatch {
            src: parse_wildcard(src, parse_cidr)?,
            dst: parse_wildcard(dst, parse_cidr)?,
            proto: parse_wildcard(proto, parse_int)?,
            src_port: parse_wildcard(src_port, parse_int)?,
            dst_port: parse_wildcard(dst_port, parse_int)?,
        })
    }
}

impl std::fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn field<T: std::fmt::Display>(value: &Option<T>) -> String {
            match value {
                Some(value) => value.to_string(),
                None => "*".to_string(),
            }
        }
        write!(
            f,
            "{} {} {} {} {}",
            field(&self.src),
            field(&self.dst),
            field(&self.proto),
            field(&self.src_port),
            field(&self.dst_port),
        )
    }
}

// ===== impl PolicyParseError =====

impl std::fmt::Display for PolicyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyParseError::UnknownType(kind) => {
                write!(f, "unknown policy type: {kind}")
            }
            PolicyParseError::WrongArgumentCount => {
                write!(f, "wrong number of arguments")
            }
            PolicyParseError::InvalidAddress(addr) => {
                write!(f, "invalid IPv4 address: {addr}")
            }
            PolicyParseError::InvalidInteger(value) => {
                write!(f, "invalid integer: {value}")
            }
            PolicyParseError::InvalidCommand(command) => {
                write!(f, "invalid global command: {command}")
            }
        }
    }
}

impl std::error::Error for PolicyParseError {}

// ===== helper functions =====

fn parse_wildcard<T>(
    word: &str,
    parse: impl Fn(&str) -> Result<T, PolicyParseError>,
) -> Result<Option<T>, PolicyParseError> {
    match word {
        "*" => Ok(None),
        _ => parse(word).map(Some),
    }
}

fn parse_int<T: FromStr>(word: &str) -> Result<T, PolicyParseError> {
    word.parse()
        .map_err(|_| PolicyParseError::InvalidInteger(word.to_string()))
}

// Accepts `a.b.c.d/plen` or a bare `a.b.c.d` (treated as /32). Host bits
// are preserved as written.
pub fn parse_cidr(word: &str) -> Result<Ipv4Network, PolicyParseError> {
    let (addr, prefix) = match word.split_once('/') {
        Some((addr, prefix)) => {
            let prefix = prefix.parse::<u8>().map_err(|_| {
                PolicyParseError::InvalidInteger(word.to_string())
            })?;
            (addr, prefix)
        }
        None => (word, 32),
    };
    let addr = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| PolicyParseError::InvalidAddress(word.to_string()))?;
    Ipv4Network::new(addr, prefix)
        .map_err(|_| PolicyParseError::InvalidAddress(word.to_string()))
}
