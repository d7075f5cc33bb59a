//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use hsdn_utils::policy::{Policy, PolicyParseError};
use tracing::error;

// In-memory image of the policy file.
//
// The raw lines are the source of truth (comments and blank lines
// included, so user formatting survives rewrites); the typed policy list
// is derived from them. Mutations operate on exact line text, matching
// the way the facade queue phrases them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PolicyStore {
    lines: Vec<String>,
}

// ===== impl PolicyStore =====

impl PolicyStore {
    pub fn parse(contents: &str) -> PolicyStore {
        PolicyStore {
            lines: contents.lines().map(str::to_string).collect(),
        }
    }

    pub fn contents(&self) -> String {
        let mut contents = self.lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        contents
    }

    // Parses the policy lines, logging and skipping invalid ones.
    pub fn policies(&self) -> Vec<Policy> {
        self.lines
            .iter()
            .filter(|line| !is_comment(line))
            .filter_map(|line| match line.parse() {
                Ok(policy) => Some(policy),
                Err(error) => {
                    error!(%line, %error, "invalid policy");
                    None
                }
            })
            .collect()
    }

    // Appends a new policy line after validating it.
    pub fn add(&mut self, line: &str) -> Result<(), PolicyParseError> {
        line.parse::<Policy>()?;
        self.lines.push(line.to_string());
        Ok(())
    }

    // Replaces the exact old line text with the new line.
    pub fn edit(
        &mut self,
        new: &str,
        old: &str,
    ) -> Result<bool, PolicyParseError> {
        new.parse::<Policy>()?;
        match self.lines.iter_mut().find(|line| line.trim() == old.trim()) {
            Some(line) => {
                *line = new.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // Removes the exact line text. Returns whether a line was removed.
    pub fn delete(&mut self, line: &str) -> bool {
        let before = self.lines.len();
        let mut deleted = false;
        self.lines.retain(|candidate| {
            if !deleted && candidate.trim() == line.trim() {
                deleted = true;
                false
            } else {
                true
            }
        });
        self.lines.len() != before
    }

    // Rewrites every policy whose device field equals `old`. Lines are
    // re-emitted from the parsed policy, dispatching the device field on
    // the policy variant, so grammars that don't put the device second
    // are rewritten correctly too.
    pub fn rename_device(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for line in self.lines.iter_mut() {
            if is_comment(line) {
                continue;
            }
            let Ok(mut policy) = line.parse::<Policy>() else {
                continue;
            };
            if policy.rename_device(old, new) {
                *line = policy.to_string();
                changed = true;
            }
        }
        changed
    }
}

// ===== helper functions =====

fn is_comment(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with('#')
}
