//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_utils::config::ConfigEntry;
use hsdn_utils::policy::{Policy, PolicyParseError};

//
// Helper functions.
//

fn test_policy_roundtrip(line: &str) {
    let policy: Policy = line.parse().unwrap();
    assert_eq!(policy.to_string(), line);
    let reparsed: Policy = policy.to_string().parse().unwrap();
    assert_eq!(policy, reparsed);
}

fn test_config_roundtrip(line: &str) {
    let entry: ConfigEntry = line.parse().unwrap();
    assert_eq!(entry.to_string(), line);
    let reparsed: ConfigEntry = entry.to_string().parse().unwrap();
    assert_eq!(entry, reparsed);
}

//
// Policy line grammar.
//

#[test]
fn policy_roundtrip() {
    test_policy_roundtrip("global routing");
    test_policy_roundtrip("address C1 0 10.0.0.1/24");
    test_policy_roundtrip("flow voip 10.0.0.0/24 10.0.1.0/24 17 * 5060");
    test_policy_roundtrip("block C1 * 10.0.1.5/32 6 * 80");
    test_policy_roundtrip("route C2 * * * * * Gi3");
    test_policy_roundtrip("route-f C2 10.0.0.0/8 * 6 * 443 Gi2");
    test_policy_roundtrip("zone C3 dmz");
    test_policy_roundtrip("disable S0 2");
}

#[test]
fn policy_bare_address_is_host_route() {
    let policy: Policy = "block C1 10.0.0.9 * * * *".parse().unwrap();
    assert_eq!(policy.to_string(), "block C1 10.0.0.9/32 * * * *");
}

#[test]
fn policy_invalid_lines() {
    assert_eq!(
        "teleport C1 somewhere".parse::<Policy>(),
        Err(PolicyParseError::UnknownType("teleport".to_string()))
    );
    assert_eq!(
        "address C1 0".parse::<Policy>(),
        Err(PolicyParseError::WrongArgumentCount)
    );
    assert_eq!(
        "address C1 x 10.0.0.1/24".parse::<Policy>(),
        Err(PolicyParseError::InvalidInteger("x".to_string()))
    );
    assert_eq!(
        "address C1 0 10.0.0.300/24".parse::<Policy>(),
        Err(PolicyParseError::InvalidAddress("10.0.0.300/24".to_string()))
    );
    assert_eq!(
        "global rooting".parse::<Policy>(),
        Err(PolicyParseError::InvalidCommand("rooting".to_string()))
    );
    assert_eq!(
        "block C1 * * * *".parse::<Policy>(),
        Err(PolicyParseError::WrongArgumentCount)
    );
}

#[test]
fn policy_device_rename_dispatches_on_variant() {
    let mut policies = [
        "address C1 0 10.0.0.1/24".parse::<Policy>().unwrap(),
        "block C1 * * * * *".parse::<Policy>().unwrap(),
        "route-f C1 * * * * * Gi2".parse::<Policy>().unwrap(),
        "flow C1 * * * * *".parse::<Policy>().unwrap(),
    ];
    for policy in policies.iter_mut() {
        policy.rename_device("C1", "C9");
    }
    assert_eq!(policies[0].to_string(), "address C9 0 10.0.0.1/24");
    assert_eq!(policies[1].to_string(), "block C9 * * * * *");
    assert_eq!(policies[2].to_string(), "route-f C9 * * * * * Gi2");
    // The flow policy's second word is a flow name, not a device.
    assert_eq!(policies[3].to_string(), "flow C1 * * * * *");
}

#[test]
fn policy_facade_json_carries_type_tag() {
    let policy: Policy = "address C1 0 10.0.0.1/24".parse().unwrap();
    let json = serde_json::to_value(&policy).unwrap();
    assert_eq!(json["type"], "address");
    assert_eq!(json["device"], "C1");
    assert_eq!(json["interface"], 0);

    let policy: Policy = "route-f C2 * * * * * Gi2".parse().unwrap();
    let json = serde_json::to_value(&policy).unwrap();
    assert_eq!(json["type"], "route-f");
}

//
// Canonical configuration grammar.
//

#[test]
fn config_roundtrip() {
    test_config_roundtrip("address Gi2 10.0.0.1/24");
    test_config_roundtrip("address 1 192.168.99.1/30");
    test_config_roundtrip("route 10.0.3.1/24 Gi2 192.168.99.2");
    test_config_roundtrip("block 10.0.0.0/24 * 6 * 80");
    test_config_roundtrip("route-f * 10.1.0.0/16 17 * * Gi3");
    test_config_roundtrip("disable Gi4");
}

#[test]
fn config_serializes_as_canonical_line() {
    let entry: ConfigEntry = "route 10.0.3.1/24 Gi2 192.168.99.2".parse().unwrap();
    let json = serde_json::to_string(&entry).unwrap();
    assert_eq!(json, "\"route 10.0.3.1/24 Gi2 192.168.99.2\"");

    let back: ConfigEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back, entry);
}
