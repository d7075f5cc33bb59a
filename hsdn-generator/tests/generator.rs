//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

use hsdn_generator::routing::{LinkAddresses, shortest_paths};
use hsdn_generator::{DEBOUNCE_INTERVAL, compile, should_run, split};
use hsdn_utils::policy::Policy;
use hsdn_utils::topology::{
    ClassicPort, Device, DeviceKind, Endpoint, Link, Port, PortRef, SdnPort,
    Topology,
};

//
// Helper functions.
//

fn classic_device(name: &str, interfaces: &[&str]) -> Device {
    Device {
        name: name.to_string(),
        kind: DeviceKind::Classic,
        ports: interfaces
            .iter()
            .map(|interface| {
                Port::Classic(ClassicPort {
                    interface_name: interface.to_string(),
                    hw_addr: Default::default(),
                })
            })
            .collect(),
    }
}

fn sdn_device(name: &str, ports: &[u32]) -> Device {
    Device {
        name: name.to_string(),
        kind: DeviceKind::Sdn,
        ports: ports
            .iter()
            .map(|port_no| {
                Port::Sdn(SdnPort {
                    port_no: *port_no,
                    hw_addr: Default::default(),
                })
            })
            .collect(),
    }
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

fn name(port: &str) -> PortRef {
    PortRef::Name(port.to_string())
}

fn policies(lines: &[&str]) -> Vec<Policy> {
    lines.iter().map(|line| line.parse().unwrap()).collect()
}

fn lines(entries: &[hsdn_utils::config::ConfigEntry]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_string()).collect()
}

//
// Compilation scenarios.
//

// Two SDN switches directly linked, one address policy on S0.
#[test]
fn two_sdn_switches_one_address() {
    let topology = Topology {
        devices: vec![sdn_device("S0", &[1, 2]), sdn_device("S1", &[1])],
        links: vec![link("S0", PortRef::Number(2), "S1", PortRef::Number(1))],
    };
    let policies = policies(&["address S0 0 10.0.0.1/24"]);

    let mut allocator = LinkAddresses::new();
    let configurations = compile(&policies, &topology, &mut allocator);

    assert_eq!(
        lines(&configurations["S0"]),
        vec![
            "address 1 10.0.0.1/24",
            "address 2 192.168.99.1/30",
        ]
    );
    assert_eq!(
        lines(&configurations["S1"]),
        vec![
            "address 1 192.168.99.2/30",
            "route 10.0.0.1/24 1 192.168.99.1",
        ]
    );

    // Everything lands on the SDN side of the split.
    let (classic, sdn) = split(&configurations, &topology);
    assert!(classic.is_empty());
    assert_eq!(sdn.len(), 2);
}

// Three classic devices in a line; the far end routes through the
// middle.
#[test]
fn three_classic_devices_in_a_line() {
    let topology = Topology {
        devices: vec![
            classic_device("C1", &["Gi2"]),
            classic_device("C2", &["Gi2", "Gi3"]),
            classic_device("C3", &["Gi2"]),
        ],
        links: vec![
            link("C1", name("Gi2"), "C2", name("Gi2")),
            link("C2", name("Gi3"), "C3", name("Gi2")),
        ],
    };
    let policies = policies(&["address C3 0 10.0.3.1/24"]);

    let mut allocator = LinkAddresses::new();
    let configurations = compile(&policies, &topology, &mut allocator);

    // C1-C2 gets the first /30, C2-C3 the second.
    let c2_side_of_c2_c3 = "192.168.99.5";
    let c3_side_of_c2_c3 = "192.168.99.6";

    // C1 is two hops from C3: next hop is C2, out Gi2, towards C2's
    // address on the C1-C2 link.
    assert!(
        lines(&configurations["C1"])
            .contains(&"route 10.0.3.1/24 Gi2 192.168.99.2".to_string())
    );
    // C2 is adjacent to C3: out Gi3, towards C3's side of the link.
    assert!(
        lines(&configurations["C2"]).contains(&format!(
            "route 10.0.3.1/24 Gi3 {c3_side_of_c2_c3}"
        ))
    );
    // C3 originates the address, no route to itself.
    assert!(
        !lines(&configurations["C3"])
            .iter()
            .any(|line| line.starts_with("route"))
    );
    // Sanity-check the C2-C3 link addressing.
    assert!(
        lines(&configurations["C2"]).contains(&format!(
            "address Gi3 {c2_side_of_c2_c3}/30"
        ))
    );
}

// Link allocations are stable across recompilations: adding an
// unrelated policy must not move existing subnets.
#[test]
fn link_allocations_are_stable() {
    let topology = Topology {
        devices: vec![
            classic_device("C1", &["Gi2", "Gi3"]),
            classic_device("C2", &["Gi2"]),
        ],
        links: vec![link("C1", name("Gi2"), "C2", name("Gi2"))],
    };

    let mut allocator = LinkAddresses::new();
    let first = compile(
        &policies(&["address C1 0 10.0.0.1/24"]),
        &topology,
        &mut allocator,
    );
    let second = compile(
        &policies(&["address C1 0 10.0.0.1/24", "address C2 0 10.0.2.1/24"]),
        &topology,
        &mut allocator,
    );

    let link_address = "address Gi2 192.168.99.1/30".to_string();
    assert!(lines(&first["C1"]).contains(&link_address));
    assert!(lines(&second["C1"]).contains(&link_address));
}

// The allocator hands the first host to the lexicographically smaller
// endpoint regardless of link orientation.
#[test]
fn link_allocation_is_order_independent() {
    let forward = link("A", name("p1"), "B", name("p1"));
    let backward = link("B", name("p1"), "A", name("p1"));

    let mut allocator = LinkAddresses::new();
    let (a_fwd, b_fwd) = allocator.allocate(&forward).unwrap();
    let mut allocator = LinkAddresses::new();
    let (a_bwd, b_bwd) = allocator.allocate(&backward).unwrap();
    assert_eq!((a_fwd, b_fwd), (a_bwd, b_bwd));
}

// An address policy whose interface index is out of range is skipped,
// and an unknown device likewise.
#[test]
fn invalid_address_policies_are_skipped() {
    let topology = Topology {
        devices: vec![classic_device("C1", &["Gi2"])],
        links: vec![],
    };
    let policies = policies(&[
        "address C1 5 10.0.0.1/24",
        "address C9 0 10.0.0.1/24",
    ]);

    let mut allocator = LinkAddresses::new();
    let configurations = compile(&policies, &topology, &mut allocator);
    assert!(configurations.is_empty());
}

// Disconnected targets produce no route entries.
#[test]
fn unreachable_targets_have_no_routes() {
    let topology = Topology {
        devices: vec![
            classic_device("C1", &["Gi2"]),
            classic_device("C2", &["Gi2"]),
        ],
        links: vec![],
    };
    let policies = policies(&["address C2 0 10.0.2.1/24"]);

    let mut allocator = LinkAddresses::new();
    let configurations = compile(&policies, &topology, &mut allocator);
    assert!(!configurations.contains_key("C1"));
}

// Block, route-f and disable policies pass through for known devices.
#[test]
fn device_local_policies_pass_through() {
    let topology = Topology {
        devices: vec![classic_device("C1", &["Gi2"])],
        links: vec![],
    };
    let policies = policies(&[
        "block C1 * 10.0.1.5/32 6 * 80",
        "route-f C1 10.0.0.0/8 * 6 * 443 Gi2",
        "disable C1 Gi2",
        "block C9 * * * * *",
    ]);

    let mut allocator = LinkAddresses::new();
    let configurations = compile(&policies, &topology, &mut allocator);
    // Route-forward entries trail the rest: their next hop derives from
    // the exit port's address, which must be configured first.
    assert_eq!(
        lines(&configurations["C1"]),
        vec![
            "block * 10.0.1.5/32 6 * 80",
            "disable Gi2",
            "route-f 10.0.0.0/8 * 6 * 443 Gi2",
        ]
    );
    assert!(!configurations.contains_key("C9"));
}

// Identical inputs compile to identical outputs.
#[test]
fn compilation_is_deterministic() {
    let topology = Topology {
        devices: vec![
            classic_device("C1", &["Gi2"]),
            classic_device("C2", &["Gi2"]),
        ],
        links: vec![link("C1", name("Gi2"), "C2", name("Gi2"))],
    };
    let policies = policies(&["address C2 0 10.0.2.1/24"]);

    let mut allocator = LinkAddresses::new();
    let first = compile(&policies, &topology, &mut allocator);
    let second = compile(&policies, &topology, &mut allocator);
    assert_eq!(first, second);
}

//
// Shortest paths.
//

#[test]
fn dijkstra_distances_and_next_hops() {
    let links = vec![
        link("C1", name("Gi2"), "C2", name("Gi2")),
        link("C2", name("Gi3"), "C3", name("Gi2")),
        link("C3", name("Gi3"), "C4", name("Gi2")),
    ];
    let paths = shortest_paths(&links, "C1");

    assert_eq!(paths.distances.get("C4"), Some(&3));
    assert_eq!(paths.next_hop("C2"), Some("C2"));
    assert_eq!(paths.next_hop("C3"), Some("C2"));
    assert_eq!(paths.next_hop("C4"), Some("C2"));
    assert_eq!(paths.next_hop("C1"), None);
    assert_eq!(paths.next_hop("C9"), None);
}

//
// Debounce.
//

#[test]
fn debounce_suppresses_runs_within_the_interval() {
    let now = Instant::now();
    assert!(should_run(None, now));
    assert!(!should_run(Some(now), now + Duration::from_millis(500)));
    assert!(should_run(Some(now), now + DEBOUNCE_INTERVAL));
}
