//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_netconf::yang;

// Reply shaped like a Cisco IOS-XE openconfig-interfaces get: Gi1 is the
// management interface, Gi2 carries a pre-existing address, Gi3 is
// administratively down.
const INTERFACES_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="101">
  <data>
    <interfaces xmlns="http://openconfig.net/yang/interfaces">
      <interface>
        <name>GigabitEthernet1</name>
        <state><enabled>true</enabled></state>
        <ethernet xmlns="http://openconfig.net/yang/interfaces/ethernet">
          <state><mac-address>00:0c:29:01:01:01</mac-address></state>
        </ethernet>
        <subinterfaces>
          <subinterface>
            <ipv4 xmlns="http://openconfig.net/yang/interfaces/ip">
              <addresses>
                <address>
                  <config>
                    <ip>172.16.0.10</ip>
                    <prefix-length>24</prefix-length>
                  </config>
                </address>
              </addresses>
            </ipv4>
          </subinterface>
        </subinterfaces>
      </interface>
      <interface>
        <name>GigabitEthernet2</name>
        <state><enabled>true</enabled></state>
        <ethernet xmlns="http://openconfig.net/yang/interfaces/ethernet">
          <state><mac-address>00:0c:29:01:01:02</mac-address></state>
        </ethernet>
        <subinterfaces>
          <subinterface>
            <ipv4 xmlns="http://openconfig.net/yang/interfaces/ip">
              <addresses>
                <address>
                  <config>
                    <ip>10.0.0.1</ip>
                    <prefix-length>24</prefix-length>
                  </config>
                </address>
              </addresses>
            </ipv4>
          </subinterface>
        </subinterfaces>
      </interface>
      <interface>
        <name>GigabitEthernet3</name>
        <state><enabled>false</enabled></state>
      </interface>
    </interfaces>
  </data>
</rpc-reply>"#;

const LLDP_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="102">
  <data>
    <lldp xmlns="http://openconfig.net/yang/lldp">
      <interfaces>
        <interface>
          <name>GigabitEthernet2</name>
          <state><enabled>true</enabled></state>
          <neighbors>
            <neighbor>
              <state><system-name>C2</system-name></state>
            </neighbor>
          </neighbors>
        </interface>
        <interface>
          <name>GigabitEthernet3</name>
          <state><enabled>false</enabled></state>
        </interface>
      </interfaces>
    </lldp>
  </data>
</rpc-reply>"#;

const LLDP_ENABLED_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="103">
  <data>
    <lldp xmlns="http://openconfig.net/yang/lldp">
      <state><enabled>false</enabled></state>
    </lldp>
  </data>
</rpc-reply>"#;

//
// Reply parsing.
//

#[test]
fn parse_interfaces_reply() {
    let interfaces = yang::parse_interfaces(INTERFACES_REPLY).unwrap();
    assert_eq!(interfaces.len(), 3);

    // Document order is preserved: Gi1 first.
    assert_eq!(interfaces[0].name, "GigabitEthernet1");
    assert!(interfaces[0].enabled);
    assert_eq!(
        interfaces[0].mac_address.unwrap().to_string(),
        "00:0c:29:01:01:01"
    );
    assert_eq!(
        interfaces[1].addresses,
        vec!["10.0.0.1/24".parse().unwrap()]
    );
    assert!(!interfaces[2].enabled);
    assert!(interfaces[2].addresses.is_empty());
}

#[test]
fn parse_lldp_interfaces_reply() {
    let interfaces = yang::parse_lldp_interfaces(LLDP_REPLY).unwrap();
    assert_eq!(interfaces.len(), 2);
    assert_eq!(interfaces[0].name, "GigabitEthernet2");
    assert!(interfaces[0].enabled);
    assert_eq!(interfaces[0].neighbors, vec!["C2".to_string()]);
    assert!(!interfaces[1].enabled);
    assert!(interfaces[1].neighbors.is_empty());
}

#[test]
fn parse_lldp_enabled_reply() {
    assert!(!yang::parse_lldp_enabled(LLDP_ENABLED_REPLY).unwrap());

    let empty = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
        <data></data></rpc-reply>"#;
    assert!(!yang::parse_lldp_enabled(empty).unwrap());
}

//
// Edit payloads.
//

#[test]
fn address_edit_paths() {
    let config =
        yang::address_config("GigabitEthernet2", "10.0.0.1/24".parse().unwrap());
    assert!(config.contains("<name>GigabitEthernet2</name>"));
    assert!(config.contains("<index>0</index>"));
    assert!(config.contains("<ip>10.0.0.1</ip>"));
    assert!(config.contains("<prefix-length>24</prefix-length>"));

    let delete = yang::address_delete("GigabitEthernet2");
    assert!(delete.contains(r#"<addresses nc:operation="delete">"#));
}

#[test]
fn static_route_network_and_index() {
    // Host bits are zeroed when writing the prefix.
    let config = yang::static_route_config(
        "10.0.3.1/24".parse().unwrap(),
        "GigabitEthernet2",
        "192.168.99.2".parse().unwrap(),
    );
    assert!(config.contains("<prefix>10.0.3.0/24</prefix>"));
    assert!(config.contains(
        "<index>GigabitEthernet2_192.168.99.2_10.0.3.0_24</index>"
    ));
    assert!(config.contains("<metric>1</metric>"));
    assert!(config.contains("<interface>GigabitEthernet2</interface>"));

    // Deletion removes the whole static entry.
    let delete = yang::static_route_delete("10.0.3.1/24".parse().unwrap());
    assert!(delete.contains(r#"<static nc:operation="delete">"#));
    assert!(delete.contains("<prefix>10.0.3.0/24</prefix>"));
    assert!(!delete.contains("<next-hop>"));
}

#[test]
fn acl_entry_wildcards_and_transport() {
    // TCP entry: transport block present.
    let flow = "block 10.0.0.0/24 * 6 * 80"
        .parse::<hsdn_utils::config::ConfigEntry>()
        .unwrap();
    let hsdn_utils::config::ConfigEntry::Block { flow } = flow else {
        panic!("expected block");
    };
    let config = yang::acl_entry_config("ACL_C1", 10, &flow, "DROP");
    assert!(config.contains("<source-address>10.0.0.0/24</source-address>"));
    assert!(
        config.contains("<destination-address>0.0.0.0/0</destination-address>")
    );
    assert!(config.contains("<protocol>6</protocol>"));
    assert!(config.contains("<source-port>ANY</source-port>"));
    assert!(config.contains("<destination-port>80</destination-port>"));
    assert!(config.contains("<forwarding-action>DROP</forwarding-action>"));

    // Wildcard protocol: IP keyword, no transport block.
    let flow = hsdn_utils::policy::FlowMatch::default();
    let config = yang::acl_entry_config("ACL_C1", 20, &flow, "DROP");
    assert!(config.contains("<protocol>IP</protocol>"));
    assert!(!config.contains("<transport>"));

    let delete = yang::acl_entry_delete("ACL_C1", 10);
    assert!(delete.contains(r#"<acl-entry nc:operation="delete">"#));
    assert!(delete.contains("<sequence-id>10</sequence-id>"));
}

#[test]
fn acl_interface_application() {
    let apply = yang::acl_interface_config("GigabitEthernet2", "ACL_C1", true);
    assert!(apply.contains("<id>GigabitEthernet2</id>"));
    assert!(apply.contains("<set-name>ACL_C1</set-name>"));
    assert!(apply.contains("<egress-acl-set>"));

    let remove =
        yang::acl_interface_config("GigabitEthernet2", "ACL_C1", false);
    assert!(remove.contains(r#"<egress-acl-set nc:operation="remove">"#));
}

#[test]
fn route_map_payload() {
    let config = yang::route_map_config(
        "MAP_C1",
        10,
        "ACL_route-f_C1_10",
        "192.168.99.2".parse().unwrap(),
    );
    assert!(config.contains("<name>MAP_C1</name>"));
    assert!(config.contains("<seq_no>10</seq_no>"));
    assert!(config.contains("<operation>permit</operation>"));
    assert!(config.contains("<access-list>ACL_route-f_C1_10</access-list>"));
    assert!(config.contains("<address>192.168.99.2</address>"));
}

#[test]
fn housekeeping_payloads_use_remove() {
    assert!(
        yang::static_routes_delete_all()
            .contains(r#"<static-routes nc:operation="remove">"#)
    );
    assert!(
        yang::acl_sets_delete_all()
            .contains(r#"<acl-sets nc:operation="remove">"#)
    );
    assert!(
        yang::route_maps_delete_all()
            .contains(r#"<route-map nc:operation="remove">"#)
    );
}
