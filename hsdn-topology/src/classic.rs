//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use hsdn_utils::ibus::{IbusChannelsTx, request_netconf_discovery};
use hsdn_utils::task::Task;
use tokio::time;
use tracing::debug;

// Discovery tick period. A cycle that runs longer than this is followed
// immediately by the next one.
const DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

// Spawns the classic discovery poller: one NETCONF discovery request per
// tick, published as the classic topology snapshot.
pub(crate) fn spawn_poller(ibus_tx: IbusChannelsTx) -> Task<()> {
    Task::spawn(async move {
        loop {
            let start = time::Instant::now();

            match request_netconf_discovery(&ibus_tx).await {
                Ok(snapshot) => {
                    debug!(
                        elapsed = ?start.elapsed(),
                        devices = snapshot.interfaces.len(),
                        "NETCONF topology discovery",
                    );
                    ibus_tx.classic_topology_upd(snapshot);
                }
                Err(error) => {
                    debug!(%error, "NETCONF discovery request failed");
                }
            }

            let elapsed = start.elapsed();
            if elapsed < DISCOVERY_INTERVAL {
                time::sleep(DISCOVERY_INTERVAL - elapsed).await;
            }
        }
    })
}
