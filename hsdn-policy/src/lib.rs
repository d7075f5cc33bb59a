//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use hsdn_utils::ibus::{IbusChannelsTx, IbusMsg, IbusReceiver};
use tracing::{Instrument, debug, debug_span, warn};

use crate::store::PolicyStore;

#[derive(Debug)]
pub struct Master {
    // Internal bus Tx channel.
    ibus_tx: IbusChannelsTx,
    // Path of the policy file.
    path: PathBuf,
    // Policy file image.
    store: PolicyStore,
}

// ===== impl Master =====

impl Master {
    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        while let Some(msg) = ibus_rx.recv().await {
            match msg {
                IbusMsg::PolicyCommand(words) => {
                    self.process_command(&words);
                }
                IbusMsg::DeviceRename { old, new } => {
                    if self.store.rename_device(&old, &new) {
                        debug!(%old, %new, "renamed device in policies");
                        self.store_and_publish();
                    }
                }
                _ => (),
            }
        }
    }

    // `policy new <line>` / `policy edit <new> old <old>` /
    // `policy delete <line>` commands from the facade queue.
    fn process_command(&mut self, words: &[String]) {
        match words.first().map(String::as_str) {
            Some("new") => {
                let line = words[1..].join(" ");
                match self.store.add(&line) {
                    Ok(()) => self.store_and_publish(),
                    Err(error) => warn!(%line, %error, "invalid policy"),
                }
            }
            Some("edit") => {
                let Some(separator) =
                    words.iter().position(|word| word == "old")
                else {
                    warn!(?words, "malformed policy command");
                    return;
                };
                let new = words[1..separator].join(" ");
                let old = words[separator + 1..].join(" ");
                match self.store.edit(&new, &old) {
                    Ok(true) => self.store_and_publish(),
                    Ok(false) => warn!(%old, "no such policy line"),
                    Err(error) => warn!(%new, %error, "invalid policy"),
                }
            }
            Some("delete") => {
                let line = words[1..].join(" ");
                if self.store.delete(&line) {
                    self.store_and_publish();
                } else {
                    warn!(%line, "no such policy line");
                }
            }
            _ => warn!(?words, "unsupported policy command"),
        }
    }

    // Rewrites the policy file atomically and republishes the snapshot.
    fn store_and_publish(&mut self) {
        let tmp_path = self.path.with_extension("tmp");
        let result = std::fs::write(&tmp_path, self.store.contents())
            .and_then(|()| std::fs::rename(&tmp_path, &self.path));
        if let Err(error) = result {
            warn!(%error, path = %self.path.display(),
                "failed to rewrite policy file");
        }
        self.publish();
    }

    fn publish(&self) {
        self.ibus_tx.policies_upd(Arc::new(self.store.policies()));
    }
}

// ===== global functions =====

pub fn start(ibus_tx: IbusChannelsTx, ibus_rx: IbusReceiver, path: PathBuf) {
    tokio::spawn(
        async move {
            let store = match std::fs::read_to_string(&path) {
                Ok(contents) => PolicyStore::parse(&contents),
                Err(error) => {
                    warn!(%error, path = %path.display(),
                        "failed to read policy file");
                    PolicyStore::default()
                }
            };

            let mut master = Master {
                ibus_tx,
                path,
                store,
            };
            master.publish();

            // Run task main loop.
            master.run(ibus_rx).await;
        }
        .instrument(debug_span!("policy")),
    );
}
