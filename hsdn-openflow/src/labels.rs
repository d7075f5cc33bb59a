//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

// Persistent datapath-id → label map backed by the SDN label file.
//
// The file is append-only (`<datapath_id>:<label>` per line): every new
// datapath gets the next `S<n>` label and its line appended, so labels
// survive restarts and reconnects. The file is rewritten in full only
// when a label is renamed.
#[derive(Debug)]
pub struct LabelMap {
    path: PathBuf,
    labels: HashMap<u64, String>,
    count: usize,
}

// ===== impl LabelMap =====

impl LabelMap {
    // Loads the label file. A missing file is an empty map.
    pub fn load(path: impl Into<PathBuf>) -> LabelMap {
        let path = path.into();
        let mut labels = HashMap::new();
        let mut count = 0;

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    let Some((datapath_id, label)) = line.split_once(':')
                    else {
                        warn!(%line, "malformed label file line");
                        continue;
                    };
                    match datapath_id.parse::<u64>() {
                        Ok(datapath_id) => {
                            labels.insert(datapath_id, label.to_string());
                        }
                        Err(_) => {
                            warn!(%line, "malformed label file line");
                        }
                    }
                    count += 1;
                }
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "label file does not exist");
            }
            Err(error) => {
                warn!(%error, path = %path.display(), "error loading label file");
            }
        }

        LabelMap {
            path,
            labels,
            count,
        }
    }

    pub fn get(&self, datapath_id: u64) -> Option<&str> {
        self.labels.get(&datapath_id).map(String::as_str)
    }

    // Allocates the next label for a new datapath and appends it to the
    // file. The in-memory allocation sticks even if the append fails.
    pub fn allocate(&mut self, datapath_id: u64) -> std::io::Result<String> {
        let label = format!("S{}", self.count);
        self.count += 1;
        self.labels.insert(datapath_id, label.clone());

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{datapath_id}:{label}")?;
        Ok(label)
    }

    // Renames a label, rewriting the file in place. Returns the datapath
    // id that carried the old label, if any.
    pub fn rename(
        &mut self,
        old: &str,
        new: &str,
    ) -> std::io::Result<Option<u64>> {
        let Some(datapath_id) = self
            .labels
            .iter()
            .find_map(|(id, label)| (label == old).then_some(*id))
        else {
            return Ok(None);
        };
        self.labels.insert(datapath_id, new.to_string());

        let contents = std::fs::read_to_string(&self.path)?;
        let mut lines = vec![];
        for line in contents.lines() {
            if line.trim() == format!("{datapath_id}:{old}") {
                lines.push(format!("{datapath_id}:{new}"));
            } else {
                lines.push(line.to_string());
            }
        }
        let mut contents = lines.join("\n");
        contents.push('\n');

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(Some(datapath_id))
    }
}
