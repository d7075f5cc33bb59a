//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use hsdn_utils::ip::network_address;
use hsdn_utils::mac_addr::MacAddr;
use hsdn_utils::policy::FlowMatch;
use ipnetwork::Ipv4Network;
use serde::Deserialize;

use crate::error::Error;

// XML namespaces of the models the driver edits.
const NS_NETCONF: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
const NS_INTERFACES: &str = "http://openconfig.net/yang/interfaces";
const NS_IF_IP: &str = "http://openconfig.net/yang/interfaces/ip";
const NS_IF_ETHERNET: &str = "http://openconfig.net/yang/interfaces/ethernet";
const NS_LLDP: &str = "http://openconfig.net/yang/lldp";
const NS_ACL: &str = "http://openconfig.net/yang/acl";
const NS_NETINST: &str = "http://openconfig.net/yang/network-instance";
const NS_IOS_XE_NATIVE: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-native";
const NS_IOS_XE_ROUTE_MAP: &str =
    "http://cisco.com/ns/yang/Cisco-IOS-XE-route-map";

// Interface state extracted from an `openconfig-interfaces` reply, in
// document order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterfaceInfo {
    pub name: String,
    pub enabled: bool,
    pub mac_address: Option<MacAddr>,
    pub addresses: Vec<Ipv4Network>,
}

// Per-interface LLDP state from an `openconfig-lldp` reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LldpInterfaceInfo {
    pub name: String,
    pub enabled: bool,
    pub neighbors: Vec<String>,
}

// ===== get filters =====

pub fn interfaces_filter() -> String {
    format!(
        r#"<filter xmlns="{NS_NETCONF}">
            <interfaces xmlns="{NS_INTERFACES}">
                <interface>
                    <name></name>
                    <state>
                        <enabled></enabled>
                    </state>
                    <ethernet xmlns="{NS_IF_ETHERNET}">
                        <state>
                            <mac-address></mac-address>
                        </state>
                    </ethernet>
                    <subinterfaces>
                        <subinterface>
                            <ipv4 xmlns="{NS_IF_IP}">
                                <addresses>
                                    <address>
                                        <config>
                                            <ip></ip>
                                            <prefix-length></prefix-length>
                                        </config>
                                    </address>
                                </addresses>
                            </ipv4>
                        </subinterface>
                    </subinterfaces>
                </interface>
            </interfaces>
        </filter>"#
    )
}

// Separate from the interfaces filter because a single combined filter
// gets no reply from virtual devices reached over VXLAN tunnels.
pub fn lldp_filter() -> String {
    format!(
        r#"<filter xmlns="{NS_NETCONF}">
            <lldp xmlns="{NS_LLDP}">
                <interfaces>
                    <interface>
                        <name></name>
                        <state>
                            <enabled></enabled>
                        </state>
                        <neighbors>
                            <neighbor>
                                <state>
                                    <system-name></system-name>
                                </state>
                            </neighbor>
                        </neighbors>
                    </interface>
                </interfaces>
            </lldp>
        </filter>"#
    )
}

pub fn lldp_enabled_filter() -> String {
    format!(
        r#"<filter xmlns="{NS_NETCONF}">
            <lldp xmlns="{NS_LLDP}">
                <state>
                    <enabled></enabled>
                </state>
            </lldp>
        </filter>"#
    )
}

// ===== edit payloads =====

fn config_wrapper(payload: String) -> String {
    format!(
        r#"<config xmlns="{NS_NETCONF}" xmlns:nc="{NS_NETCONF}">{payload}</config>"#
    )
}

// Enables LLDP globally.
pub fn lldp_enable_config() -> String {
    config_wrapper(format!(
        r#"<lldp xmlns="{NS_LLDP}">
            <config>
                <enabled>true</enabled>
            </config>
        </lldp>"#
    ))
}

// Re-enables a batch of interfaces, administratively and for LLDP. The
// interface entry has the same shape in both models.
pub fn interfaces_activate_config(interfaces: &[String]) -> String {
    let entries = interfaces
        .iter()
        .map(|name| {
            format!(
                r#"<interface>
                    <name>{name}</name>
                    <config>
                        <name>{name}</name>
                        <enabled>true</enabled>
                    </config>
                </interface>"#
            )
        })
        .collect::<String>();
    config_wrapper(format!(
        r#"<lldp xmlns="{NS_LLDP}">
            <interfaces>{entries}</interfaces>
        </lldp>
        <interfaces xmlns="{NS_INTERFACES}">{entries}</interfaces>"#
    ))
}

// Sets the administrative state of one interface.
pub fn interface_enabled_config(name: &str, enabled: bool) -> String {
    config_wrapper(format!(
        r#"<interfaces xmlns="{NS_INTERFACES}">
            <interface>
                <name>{name}</name>
                <config>
                    <name>{name}</name>
                    <enabled>{enabled}</enabled>
                </config>
            </interface>
        </interfaces>"#
    ))
}

// Configures an IPv4 address on subinterface 0.
pub fn address_config(interface: &str, address: Ipv4Network) -> String {
    let ip = address.ip();
    let prefix = address.prefix();
    config_wrapper(format!(
        r#"<interfaces xmlns="{NS_INTERFACES}">
            <interface>
                <name>{interface}</name>
                <subinterfaces>
                    <subinterface>
                        <index>0</index>
                        <ipv4 xmlns="{NS_IF_IP}">
                            <addresses>
                                <address>
                                    <ip>{ip}</ip>
                                    <config>
                                        <ip>{ip}</ip>
                                        <prefix-length>{prefix}</prefix-length>
                                    </config>
                                </address>
                            </addresses>
                        </ipv4>
                    </subinterface>
                </subinterfaces>
            </interface>
        </interfaces>"#
    ))
}

// Removes every IPv4 address from subinterface 0.
pub fn address_delete(interface: &str) -> String {
    config_wrapper(format!(
        r#"<interfaces xmlns="{NS_INTERFACES}">
            <interface>
                <name>{interface}</name>
                <subinterfaces>
                    <subinterface>
                        <index>0</index>
                        <ipv4 xmlns="{NS_IF_IP}">
                            <addresses nc:operation="delete">
                            </addresses>
                        </ipv4>
                    </subinterface>
                </subinterfaces>
            </interface>
        </interfaces>"#
    ))
}

// Next-hop list index for a static route, unique per (exit, next-hop,
// destination) triple.
pub fn static_route_index(
    exit_port: &str,
    next_hop: Ipv4Addr,
    destination: Ipv4Network,
) -> String {
    let network = network_address(destination.ip(), destination.prefix());
    format!("{exit_port}_{next_hop}_{network}_{}", destination.prefix())
}

fn static_route_container(payload: String) -> String {
    format!(
        r#"<network-instances xmlns="{NS_NETINST}">
            <network-instance>
                <name>default</name>
                <protocols>
                    <protocol>
                        <identifier>STATIC</identifier>
                        <name>DEFAULT</name>
                        {payload}
                    </protocol>
                </protocols>
            </network-instance>
        </network-instances>"#
    )
}

// Installs a static route for the destination network.
pub fn static_route_config(
    destination: Ipv4Network,
    exit_port: &str,
    next_hop: Ipv4Addr,
) -> String {
    let network = network_address(destination.ip(), destination.prefix());
    let prefix = destination.prefix();
    let index = static_route_index(exit_port, next_hop, destination);
    config_wrapper(static_route_container(format!(
        r#"<static-routes>
            <static>
                <prefix>{network}/{prefix}</prefix>
                <config>
                    <prefix>{network}/{prefix}</prefix>
                </config>
                <next-hops>
                    <next-hop>
                        <index>{index}</index>
                        <config>
                            <index>{index}</index>
                            <next-hop>{next_hop}</next-hop>
                            <metric>1</metric>
                        </config>
                        <interface-ref>
                            <config>
                                <interface>{exit_port}</interface>
                            </config>
                        </interface-ref>
                    </next-hop>
                </next-hops>
            </static>
        </static-routes>"#
    )))
}

// Removes the whole static entry for the destination network, next-hops
// included.
pub fn static_route_delete(destination: Ipv4Network) -> String {
    let network = network_address(destination.ip(), destination.prefix());
    let prefix = destination.prefix();
    config_wrapper(static_route_container(format!(
        r#"<static-routes>
            <static nc:operation="delete">
                <prefix>{network}/{prefix}</prefix>
            </static>
        </static-routes>"#
    )))
}

pub fn static_routes_delete_all() -> String {
    config_wrapper(static_route_container(
        r#"<static-routes nc:operation="remove"></static-routes>"#.to_string(),
    ))
}

// ACL match field rendering: `*` source/destination → 0.0.0.0/0, `*`
// protocol → IP, `*` port → ANY.
fn acl_address(addr: Option<Ipv4Network>) -> String {
    match addr {
        Some(addr) => addr.to_string(),
        None => "0.0.0.0/0".to_string(),
    }
}

fn acl_protocol(proto: Option<u8>) -> String {
    match proto {
        Some(proto) => proto.to_string(),
        None => "IP".to_string(),
    }
}

fn acl_port(port: Option<u16>) -> String {
    match port {
        Some(port) => port.to_string(),
        None => "ANY".to_string(),
    }
}

// Writes one ACL entry. The transport block is included only for TCP (6)
// and UDP (17), which are the protocols the model defines ports for.
pub fn acl_entry_config(
    acl_name: &str,
    sequence_id: u32,
    flow: &FlowMatch,
    forwarding_action: &str,
) -> String {
    let src = acl_address(flow.src);
    let dst = acl_address(flow.dst);
    let proto = acl_protocol(flow.proto);
    let transport = match flow.proto {
        Some(6) | Some(17) => {
            let sport = acl_port(flow.src_port);
            let dport = acl_port(flow.dst_port);
            format!(
                r#"<transport>
                    <config>
                        <source-port>{sport}</source-port>
                        <destination-port>{dport}</destination-port>
                    </config>
                </transport>"#
            )
        }
        _ => String::new(),
    };
    config_wrapper(format!(
        r#"<acl xmlns="{NS_ACL}">
            <acl-sets>
                <acl-set>
                    <name>{acl_name}</name>
                    <type>ACL_IPV4</type>
                    <config>
                        <name>{acl_name}</name>
                        <type>ACL_IPV4</type>
                    </config>
                    <acl-entries>
                        <acl-entry>
                            <sequence-id>{sequence_id}</sequence-id>
                            <config>
                                <sequence-id>{sequence_id}</sequence-id>
                            </config>
                            <ipv4>
                                <config>
                                    <source-address>{src}</source-address>
                                    <destination-address>{dst}</destination-address>
                                    <protocol>{proto}</protocol>
                                </config>
                            </ipv4>
                            {transport}
                            <actions>
                                <config>
                                    <forwarding-action>{forwarding_action}</forwarding-action>
                                </config>
                            </actions>
                        </acl-entry>
                    </acl-entries>
                </acl-set>
            </acl-sets>
        </acl>"#
    ))
}

// Removes one ACL entry by sequence id.
pub fn acl_entry_delete(acl_name: &str, sequence_id: u32) -> String {
    config_wrapper(format!(
        r#"<acl xmlns="{NS_ACL}">
            <acl-sets>
                <acl-set>
                    <name>{acl_name}</name>
                    <type>ACL_IPV4</type>
                    <acl-entries>
                        <acl-entry nc:operation="delete">
                            <sequence-id>{sequence_id}</sequence-id>
                        </acl-entry>
                    </acl-entries>
                </acl-set>
            </acl-sets>
        </acl>"#
    ))
}

pub fn acl_sets_delete_all() -> String {
    config_wrapper(format!(
        r#"<acl xmlns="{NS_ACL}">
            <acl-sets nc:operation="remove"></acl-sets>
        </acl>"#
    ))
}

// Applies (or removes) an ACL set as egress on an interface.
pub fn acl_interface_config(
    interface: &str,
    acl_name: &str,
    apply: bool,
) -> String {
    let operation = if apply { "" } else { r#" nc:operation="remove""# };
    config_wrapper(format!(
        r#"<acl xmlns="{NS_ACL}">
            <interfaces>
                <interface>
                    <id>{interface}</id>
                    <config>
                        <id>{interface}</id>
                    </config>
                    <interface-ref>
                        <config>
                            <interface>{interface}</interface>
                        </config>
                    </interface-ref>
                    <egress-acl-sets>
                        <egress-acl-set{operation}>
                            <set-name>{acl_name}</set-name>
                            <type>ACL_IPV4</type>
                            <config>
                                <set-name>{acl_name}</set-name>
                                <type>ACL_IPV4</type>
                            </config>
                        </egress-acl-set>
                    </egress-acl-sets>
                </interface>
            </interfaces>
        </acl>"#
    ))
}

// Writes a Cisco IOS-XE route-map sequence pointing matching traffic at
// a next-hop.
pub fn route_map_config(
    map_name: &str,
    sequence_id: u32,
    acl_name: &str,
    next_hop: Ipv4Addr,
) -> String {
    config_wrapper(format!(
        r#"<native xmlns="{NS_IOS_XE_NATIVE}">
            <route-map>
                <name>{map_name}</name>
                <route-map-without-order-seq xmlns="{NS_IOS_XE_ROUTE_MAP}">
                    <seq_no>{sequence_id}</seq_no>
                    <operation>permit</operation>
                    <match>
                        <ip>
                            <address>
                                <access-list>{acl_name}</access-list>
                            </address>
                        </ip>
                    </match>
                    <set>
                        <ip>
                            <next-hop>
                                <address>{next_hop}</address>
                            </next-hop>
                        </ip>
                    </set>
                </route-map-without-order-seq>
            </route-map>
        </native>"#
    ))
}

// Removes one route-map sequence.
pub fn route_map_delete(map_name: &str, sequence_id: u32) -> String {
    config_wrapper(format!(
        r#"<native xmlns="{NS_IOS_XE_NATIVE}">
            <route-map>
                <name>{map_name}</name>
                <route-map-without-order-seq xmlns="{NS_IOS_XE_ROUTE_MAP}" nc:operation="delete">
                    <seq_no>{sequence_id}</seq_no>
                </route-map-without-order-seq>
            </route-map>
        </native>"#
    ))
}

pub fn route_maps_delete_all() -> String {
    config_wrapper(format!(
        r#"<native xmlns="{NS_IOS_XE_NATIVE}">
            <route-map nc:operation="remove"></route-map>
        </native>"#
    ))
}

// ===== reply parsing =====

#[derive(Debug, Default, Deserialize)]
struct RpcReply {
    data: Option<ReplyData>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyData {
    interfaces: Option<InterfacesReply>,
    lldp: Option<LldpReply>,
}

#[derive(Debug, Default, Deserialize)]
struct InterfacesReply {
    #[serde(default)]
    interface: Vec<InterfaceReply>,
}

#[derive(Debug, Deserialize)]
struct InterfaceReply {
    name: String,
    state: Option<EnabledReply>,
    ethernet: Option<EthernetReply>,
    subinterfaces: Option<SubinterfacesReply>,
}

#[derive(Debug, Default, Deserialize)]
struct EnabledReply {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EthernetReply {
    state: Option<EthernetStateReply>,
}

#[derive(Debug, Deserialize)]
struct EthernetStateReply {
    #[serde(rename = "mac-address")]
    mac_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubinterfacesReply {
    #[serde(default)]
    subinterface: Vec<SubinterfaceReply>,
}

#[derive(Debug, Deserialize)]
struct SubinterfaceReply {
    ipv4: Option<Ipv4Reply>,
}

#[derive(Debug, Deserialize)]
struct Ipv4Reply {
    addresses: Option<AddressesReply>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressesReply {
    #[serde(default)]
    address: Vec<AddressReply>,
}

#[derive(Debug, Deserialize)]
struct AddressReply {
    config: Option<AddressConfigReply>,
}

#[derive(Debug, Deserialize)]
struct AddressConfigReply {
    ip: Option<Ipv4Addr>,
    #[serde(rename = "prefix-length")]
    prefix_length: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct LldpReply {
    state: Option<EnabledReply>,
    interfaces: Option<LldpInterfacesReply>,
}

#[derive(Debug, Default, Deserialize)]
struct LldpInterfacesReply {
    #[serde(default)]
    interface: Vec<LldpInterfaceReply>,
}

#[derive(Debug, Deserialize)]
struct LldpInterfaceReply {
    name: String,
    state: Option<EnabledReply>,
    neighbors: Option<NeighborsReply>,
}

#[derive(Debug, Default, Deserialize)]
struct NeighborsReply {
    #[serde(default)]
    neighbor: Vec<NeighborReply>,
}

#[derive(Debug, Deserialize)]
struct NeighborReply {
    state: Option<NeighborStateReply>,
}

#[derive(Debug, Deserialize)]
struct NeighborStateReply {
    #[serde(rename = "system-name")]
    system_name: Option<String>,
}

// Parses an `openconfig-interfaces` get reply into per-interface state,
// preserving document order.
pub fn parse_interfaces(reply: &str) -> Result<Vec<InterfaceInfo>, Error> {
    let reply: RpcReply = quick_xml::de::from_str(reply)?;
    let interfaces = reply
        .data
        .unwrap_or_default()
        .interfaces
        .unwrap_or_default()
        .interface;

    Ok(interfaces
        .into_iter()
        .map(|interface| {
            let enabled = interface
                .state
                .and_then(|state| state.enabled)
                .unwrap_or(false);
            let mac_address = interface
                .ethernet
                .and_then(|ethernet| ethernet.state)
                .and_then(|state| state.mac_address)
                .and_then(|mac_address| mac_address.parse().ok());
            let addresses = interface
                .subinterfaces
                .map(|subinterfaces| {
                    subinterfaces
                        .subinterface
                        .into_iter()
                        .filter_map(|subinterface| subinterface.ipv4)
                        .filter_map(|ipv4| ipv4.addresses)
                        .flat_map(|addresses| addresses.address)
                        .filter_map(|address| address.config)
                        .filter_map(|config| {
                            let ip = config.ip?;
                            let prefix = config.prefix_length?;
                            Ipv4Network::new(ip, prefix).ok()
                        })
                        .collect()
                })
                .unwrap_or_default();
            InterfaceInfo {
                name: interface.name,
                enabled,
                mac_address,
                addresses,
            }
        })
        .collect())
}

// Parses the global LLDP enabled flag.
pub fn parse_lldp_enabled(reply: &str) -> Result<bool, Error> {
    let reply: RpcReply = quick_xml::de::from_str(reply)?;
    Ok(reply
        .data
        .unwrap_or_default()
        .lldp
        .unwrap_or_default()
        .state
        .and_then(|state| state.enabled)
        .unwrap_or(false))
}

// Parses an `openconfig-lldp` get reply into per-interface LLDP state.
pub fn parse_lldp_interfaces(
    reply: &str,
) -> Result<Vec<LldpInterfaceInfo>, Error> {
    let reply: RpcReply = quick_xml::de::from_str(reply)?;
    let interfaces = reply
        .data
        .unwrap_or_default()
        .lldp
        .unwrap_or_default()
        .interfaces
        .unwrap_or_default()
        .interface;

    Ok(interfaces
        .into_iter()
        .map(|interface| {
            let enabled = interface
                .state
                .and_then(|state| state.enabled)
                .unwrap_or(false);
            let neighbors = interface
                .neighbors
                .map(|neighbors| {
                    neighbors
                        .neighbor
                        .into_iter()
                        .filter_map(|neighbor| neighbor.state)
                        .filter_map(|state| state.system_name)
                        .collect()
                })
                .unwrap_or_default();
            LldpInterfaceInfo {
                name: interface.name,
                enabled,
                neighbors,
            }
        })
        .collect())
}
