//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use hsdn_openflow::labels::LabelMap;

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> TempFile {
        let path = std::env::temp_dir()
            .join(format!("hsdn-labels-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        TempFile(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
        let _ = std::fs::remove_file(self.0.with_extension("tmp"));
    }
}

#[test]
fn allocation_is_monotonic_and_persistent() {
    let file = TempFile::new("alloc");

    let mut labels = LabelMap::load(&file.0);
    assert_eq!(labels.get(42), None);
    assert_eq!(labels.allocate(42).unwrap(), "S0");
    assert_eq!(labels.allocate(77).unwrap(), "S1");
    assert_eq!(labels.get(42), Some("S0"));

    // A fresh load resumes from the persisted state.
    let mut labels = LabelMap::load(&file.0);
    assert_eq!(labels.get(42), Some("S0"));
    assert_eq!(labels.get(77), Some("S1"));
    assert_eq!(labels.allocate(99).unwrap(), "S2");

    let contents = std::fs::read_to_string(&file.0).unwrap();
    assert_eq!(contents, "42:S0\n77:S1\n99:S2\n");
}

#[test]
fn rename_rewrites_only_the_matching_line() {
    let file = TempFile::new("rename");

    let mut labels = LabelMap::load(&file.0);
    labels.allocate(1).unwrap();
    labels.allocate(2).unwrap();

    assert_eq!(labels.rename("S0", "edge0").unwrap(), Some(1));
    assert_eq!(labels.get(1), Some("edge0"));
    assert_eq!(labels.get(2), Some("S1"));

    let contents = std::fs::read_to_string(&file.0).unwrap();
    assert_eq!(contents, "1:edge0\n2:S1\n");

    // Unknown labels are a no-op.
    assert_eq!(labels.rename("S9", "x").unwrap(), None);
}

#[test]
fn renamed_labels_do_not_advance_the_counter() {
    let file = TempFile::new("counter");

    let mut labels = LabelMap::load(&file.0);
    labels.allocate(1).unwrap();
    labels.rename("S0", "core").unwrap();

    // The counter tracks file lines, so the next datapath still gets S1.
    let mut labels = LabelMap::load(&file.0);
    assert_eq!(labels.allocate(2).unwrap(), "S1");
}
