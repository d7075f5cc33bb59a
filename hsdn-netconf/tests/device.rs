//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_netconf::config::DeviceFile;
use hsdn_netconf::device::{route_forward_next_hop, seed_applied};
use hsdn_netconf::error::Error;
use hsdn_netconf::yang::InterfaceInfo;
use hsdn_utils::config::{ConfigEntry, reconcile};

fn entry(line: &str) -> ConfigEntry {
    line.parse().unwrap()
}

//
// Applied-list seeding.
//

#[test]
fn seeding_skips_the_management_interface() {
    // Device with a management address on Gi1 and a user address on Gi2.
    let interfaces = vec![
        InterfaceInfo {
            name: "GigabitEthernet1".to_string(),
            enabled: true,
            mac_address: None,
            addresses: vec!["172.16.0.10/24".parse().unwrap()],
        },
        InterfaceInfo {
            name: "GigabitEthernet2".to_string(),
            enabled: true,
            mac_address: None,
            addresses: vec!["10.0.0.1/24".parse().unwrap()],
        },
        InterfaceInfo {
            name: "GigabitEthernet3".to_string(),
            enabled: false,
            mac_address: None,
            addresses: vec![],
        },
    ];

    let applied = seed_applied(&interfaces);
    assert_eq!(applied, vec![entry("address GigabitEthernet2 10.0.0.1/24")]);
}

//
// Reconciliation diffing.
//

#[test]
fn reconcile_orders_deconfigure_before_configure() {
    let applied = vec![
        entry("address Gi2 10.0.0.1/24"),
        entry("route 10.0.3.0/24 Gi2 192.168.99.2"),
        entry("disable Gi4"),
    ];
    let desired = vec![
        entry("address Gi2 10.0.0.1/24"),
        entry("route 10.0.4.0/24 Gi3 192.168.99.6"),
    ];

    let (deconfigure, configure) = reconcile(&applied, &desired);
    // Stale entries leave in their original insertion order.
    assert_eq!(
        deconfigure,
        vec![
            entry("route 10.0.3.0/24 Gi2 192.168.99.2"),
            entry("disable Gi4"),
        ]
    );
    assert_eq!(
        configure,
        vec![entry("route 10.0.4.0/24 Gi3 192.168.99.6")]
    );
}

#[test]
fn reconcile_of_equal_lists_is_empty() {
    let applied = vec![entry("address Gi2 10.0.0.1/24")];
    let (deconfigure, configure) = reconcile(&applied, &applied.clone());
    assert!(deconfigure.is_empty());
    assert!(configure.is_empty());
}

//
// Route-forward next-hop derivation.
//

#[test]
fn route_forward_next_hop_from_slash30() {
    let applied = vec![entry("address Gi2 192.168.99.1/30")];
    let next_hop = route_forward_next_hop(&applied, "Gi2").unwrap();
    assert_eq!(next_hop, "192.168.99.2".parse::<std::net::Ipv4Addr>().unwrap());
}

#[test]
fn route_forward_rejects_non_slash30_exit_port() {
    // A /24 on the exit port would make the "other host" computation
    // meaningless; the entry must fail validation instead.
    let applied = vec![entry("address Gi2 10.0.0.1/24")];
    assert!(matches!(
        route_forward_next_hop(&applied, "Gi2"),
        Err(Error::ValidationError(_))
    ));

    // No address on the exit port at all.
    assert!(matches!(
        route_forward_next_hop(&applied, "Gi3"),
        Err(Error::ValidationError(_))
    ));
}

//
// Device file parsing.
//

#[test]
fn device_file_roundtrip() {
    let contents = "\
# NETCONF managed devices
user = admin
password = secret

10.255.0.1 C1
10.255.0.2 C2
not-an-ip C3
";
    let file = DeviceFile::parse(contents);
    assert_eq!(file.user, "admin");
    assert_eq!(file.password, "secret");
    // The malformed line is skipped, the rest survive.
    assert_eq!(
        file.devices,
        vec![
            ("10.255.0.1".parse().unwrap(), "C1".to_string()),
            ("10.255.0.2".parse().unwrap(), "C2".to_string()),
        ]
    );

    let stored_path = std::env::temp_dir().join(format!(
        "hsdn-netconf-test-{}.txt",
        std::process::id()
    ));
    file.store(&stored_path).unwrap();
    let reloaded = DeviceFile::load(&stored_path).unwrap();
    let _ = std::fs::remove_file(&stored_path);
    assert_eq!(file, reloaded);
}
