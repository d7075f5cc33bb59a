//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_topology::merge;
use hsdn_utils::topology::{
    ClassicPort, ClassicSnapshot, DeviceKind, Endpoint, LldpEntry, Link,
    PortRef, SdnPort, SdnSnapshot,
};

//
// Helper functions.
//

fn classic_snapshot(
    devices: &[(&str, &[&str])],
    neighbors: &[(&str, &str, &str)],
) -> ClassicSnapshot {
    let mut snapshot = ClassicSnapshot::default();
    for (hostname, interfaces) in devices {
        snapshot.interfaces.insert(
            hostname.to_string(),
            interfaces
                .iter()
                .map(|name| ClassicPort {
                    interface_name: name.to_string(),
                    hw_addr: Default::default(),
                })
                .collect(),
        );
    }
    for (hostname, neighbor, interface) in neighbors {
        snapshot
            .neighbors
            .entry(hostname.to_string())
            .or_default()
            .insert(neighbor.to_string(), interface.to_string());
    }
    snapshot
}

fn sdn_snapshot(
    devices: &[(&str, &[u32])],
    neighbors: &[(&str, &str, u32)],
) -> SdnSnapshot {
    let mut snapshot = SdnSnapshot::default();
    for (label, ports) in devices {
        snapshot.ports.insert(
            label.to_string(),
            ports
                .iter()
                .map(|port_no| SdnPort {
                    port_no: *port_no,
                    hw_addr: Default::default(),
                })
                .collect(),
        );
    }
    for (label, neighbor, port) in neighbors {
        snapshot.neighbors.entry(label.to_string()).or_default().insert(
            neighbor.to_string(),
            LldpEntry {
                port: *port,
                ttl: 120.0,
            },
        );
    }
    snapshot
}

fn link(
    device_a: &str,
    port_a: PortRef,
    device_b: &str,
    port_b: PortRef,
) -> Link {
    Link::new(
        Endpoint::new(device_a, port_a),
        Endpoint::new(device_b, port_b),
    )
}

//
// Fusion.
//

#[test]
fn devices_from_both_populations() {
    let classic = classic_snapshot(&[("C1", &["Gi2", "Gi3"])], &[]);
    let sdn = sdn_snapshot(&[("S0", &[2, 1])], &[]);

    let topology = merge(&classic, &sdn);
    assert_eq!(topology.devices.len(), 2);
    assert_eq!(topology.devices[0].name, "C1");
    assert_eq!(topology.devices[0].kind, DeviceKind::Classic);
    assert_eq!(topology.devices[1].name, "S0");
    assert_eq!(topology.devices[1].kind, DeviceKind::Sdn);
    // SDN ports come out sorted by port number.
    assert_eq!(topology.devices[1].ports[0].config_name(), "1");
    assert_eq!(topology.devices[1].ports[1].config_name(), "2");
    assert!(topology.links.is_empty());
}

#[test]
fn bidirectional_classic_link() {
    let classic = classic_snapshot(
        &[("C1", &["Gi2"]), ("C2", &["Gi2"])],
        &[("C1", "C2", "Gi2"), ("C2", "C1", "Gi2")],
    );
    let topology = merge(&classic, &SdnSnapshot::default());

    // One link, duplicate direction suppressed.
    assert_eq!(
        topology.links,
        vec![link(
            "C1",
            PortRef::Name("Gi2".to_string()),
            "C2",
            PortRef::Name("Gi2".to_string()),
        )]
    );
}

#[test]
fn unidirectional_neighbor_is_not_a_link() {
    // C1 sees C2, but C2 doesn't see C1 (yet).
    let classic = classic_snapshot(
        &[("C1", &["Gi2"]), ("C2", &["Gi2"])],
        &[("C1", "C2", "Gi2")],
    );
    let topology = merge(&classic, &SdnSnapshot::default());
    assert!(topology.links.is_empty());
}

#[test]
fn mixed_classic_sdn_link() {
    // C1:Gi2 <-> S0:port2, observed from both sides.
    let classic =
        classic_snapshot(&[("C1", &["Gi2"])], &[("C1", "S0", "Gi2")]);
    let sdn = sdn_snapshot(&[("S0", &[1, 2])], &[("S0", "C1", 2)]);

    let topology = merge(&classic, &sdn);
    assert_eq!(
        topology.links,
        vec![link(
            "C1",
            PortRef::Name("Gi2".to_string()),
            "S0",
            PortRef::Number(2),
        )]
    );
}

#[test]
fn sdn_only_link() {
    let sdn = sdn_snapshot(
        &[("S0", &[1]), ("S1", &[1])],
        &[("S0", "S1", 1), ("S1", "S0", 1)],
    );
    let topology = merge(&ClassicSnapshot::default(), &sdn);
    assert_eq!(
        topology.links,
        vec![link("S0", PortRef::Number(1), "S1", PortRef::Number(1))]
    );
}

#[test]
fn merge_is_pure_and_comparable() {
    // Equal inputs produce equal topologies, the basis of
    // publish-on-change suppression.
    let classic = classic_snapshot(
        &[("C1", &["Gi2"]), ("C2", &["Gi2"])],
        &[("C1", "C2", "Gi2"), ("C2", "C1", "Gi2")],
    );
    let sdn = sdn_snapshot(&[("S0", &[1])], &[]);

    assert_eq!(merge(&classic, &sdn), merge(&classic, &sdn));
    assert_ne!(merge(&classic, &sdn), merge(&classic, &SdnSnapshot::default()));
}
