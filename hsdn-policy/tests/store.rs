//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_policy::store::PolicyStore;
use hsdn_utils::policy::Policy;

const POLICY_FILE: &str = "\
# user policies
global routing

address C1 0 10.0.0.1/24
block C1 * 10.0.1.5/32 6 * 80
not-a-policy line
disable S0 2
";

#[test]
fn load_skips_invalid_lines() {
    let store = PolicyStore::parse(POLICY_FILE);
    let policies = store.policies();
    // The malformed line is skipped, everything else parses.
    assert_eq!(policies.len(), 4);
    assert_eq!(policies[0].to_string(), "global routing");
    assert_eq!(policies[3].to_string(), "disable S0 2");
}

#[test]
fn add_validates_and_appends() {
    let mut store = PolicyStore::parse(POLICY_FILE);
    assert!(store.add("address C2 1 10.0.2.1/24").is_ok());
    assert!(store.add("address C2 badindex 10.0.2.1/24").is_err());

    let contents = store.contents();
    assert!(contents.ends_with("address C2 1 10.0.2.1/24\n"));
    assert_eq!(store.policies().len(), 5);
}

#[test]
fn edit_replaces_exact_line_text() {
    let mut store = PolicyStore::parse(POLICY_FILE);
    assert_eq!(
        store.edit("address C1 0 10.0.9.1/24", "address C1 0 10.0.0.1/24"),
        Ok(true)
    );
    assert!(store.contents().contains("address C1 0 10.0.9.1/24"));
    assert!(!store.contents().contains("address C1 0 10.0.0.1/24"));

    // Unknown old text leaves the store unchanged.
    assert_eq!(
        store.edit("address C1 0 10.0.9.1/24", "address C9 0 1.2.3.4/24"),
        Ok(false)
    );
}

#[test]
fn delete_removes_one_matching_line() {
    let mut store = PolicyStore::parse(POLICY_FILE);
    assert!(store.delete("block C1 * 10.0.1.5/32 6 * 80"));
    assert!(!store.contents().contains("block C1"));
    assert!(!store.delete("block C1 * 10.0.1.5/32 6 * 80"));
}

#[test]
fn rename_device_preserves_comments_and_other_devices() {
    let mut store = PolicyStore::parse(POLICY_FILE);
    assert!(store.rename_device("C1", "C1new"));

    let contents = store.contents();
    // Comment and blank lines survive verbatim.
    assert!(contents.starts_with("# user policies\nglobal routing\n\n"));
    assert!(contents.contains("address C1new 0 10.0.0.1/24"));
    assert!(contents.contains("block C1new * 10.0.1.5/32 6 * 80"));
    // The malformed line is left alone.
    assert!(contents.contains("not-a-policy line"));
    assert!(contents.contains("disable S0 2"));

    // Renaming an unknown device changes nothing.
    assert!(!store.rename_device("C7", "C8"));
}

#[test]
fn rename_block_policy_device_not_by_word_position() {
    // The device of a block policy is the second word, but a flow
    // policy's second word is its name; renames must not touch it.
    let mut store = PolicyStore::parse(
        "flow C1 * * * * *\nblock C1 * * * * *\n",
    );
    assert!(store.rename_device("C1", "C2"));
    let policies = store.policies();
    assert!(matches!(&policies[0], Policy::Flow(p) if p.name == "C1"));
    assert!(matches!(&policies[1], Policy::Block(p) if p.device == "C2"));
}
