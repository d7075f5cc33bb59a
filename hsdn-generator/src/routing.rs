//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use hsdn_utils::topology::Link;
use ipnetwork::Ipv4Network;
use tracing::error;

// Pool the link /30 subnets are carved from.
const LINK_POOL: Ipv4Addr = Ipv4Addr::new(192, 168, 99, 0);
// A /24 holds 64 point-to-point /30s.
const LINK_POOL_SIZE: u32 = 64;

// Link subnet allocator.
//
// Every link gets a /30 from the reserved pool; the two host addresses
// go to the two endpoints, the first one to the lexicographically
// smaller `<device>-<port>` key, so allocation doesn't depend on the
// order the endpoints were discovered in. Once allocated, a link keeps
// its subnet for the lifetime of the process.
#[derive(Debug, Default)]
pub struct LinkAddresses {
    allocations: BTreeMap<(String, String), u32>,
    next_index: u32,
}

// Shortest-path tree from one source device, unit edge weights.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct ShortestPaths {
    pub distances: BTreeMap<String, u32>,
    pub predecessors: BTreeMap<String, String>,
}

// ===== impl LinkAddresses =====

impl LinkAddresses {
    pub fn new() -> LinkAddresses {
        LinkAddresses::default()
    }

    // Returns the host addresses of the link's two endpoints, in the
    // link's endpoint order. `None` when the pool is exhausted.
    pub fn allocate(
        &mut self,
        link: &Link,
    ) -> Option<(Ipv4Network, Ipv4Network)> {
        let key_a = format!("{}-{}", link.a.device, link.a.port);
        let key_b = format!("{}-{}", link.b.device, link.b.port);
        let (key, swapped) = if key_a <= key_b {
            ((key_a, key_b), false)
        } else {
            ((key_b, key_a), true)
        };

        let index = match self.allocations.get(&key) {
            Some(index) => *index,
            None => {
                if self.next_index >= LINK_POOL_SIZE {
                    error!("link subnet pool exhausted");
                    return None;
                }
                let index = self.next_index;
                self.next_index += 1;
                self.allocations.insert(key, index);
                index
            }
        };

        let network = u32::from(LINK_POOL) + index * 4;
        let first = Ipv4Network::new(Ipv4Addr::from(network + 1), 30)
            .expect("/30 is a valid prefix");
        let second = Ipv4Network::new(Ipv4Addr::from(network + 2), 30)
            .expect("/30 is a valid prefix");
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }
}

// ===== impl ShortestPaths =====

impl ShortestPaths {
    // Next-hop device on the path to `target`: walk the predecessor
    // chain back until one hop from the source. A direct neighbor is its
    // own next hop; the source itself and unreachable devices have none.
    pub fn next_hop<'a>(&'a self, target: &'a str) -> Option<&'a str> {
        let mut current = target;
        loop {
            match self.distances.get(current)? {
                0 => return None,
                1 => return Some(current),
                _ => current = self.predecessors.get(current)?.as_str(),
            }
        }
    }
}

// ===== global functions =====

// Dijkstra over the link graph with unit edge weights. The candidate
// list is ordered by (distance, device), so tie-breaking is
// deterministic.
pub fn shortest_paths(links: &[Link], source: &str) -> ShortestPaths {
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for link in links {
        adjacency
            .entry(&link.a.device)
            .or_default()
            .push(&link.b.device);
        adjacency
            .entry(&link.b.device)
            .or_default()
            .push(&link.a.device);
    }

    let mut paths = ShortestPaths::default();
    let mut candidates: BTreeMap<(u32, String), ()> = BTreeMap::new();
    paths.distances.insert(source.to_string(), 0);
    candidates.insert((0, source.to_string()), ());

    while let Some(((distance, device), ())) = candidates.pop_first() {
        if paths.distances.get(&device) != Some(&distance) {
            // A shorter path to this device was already settled.
            continue;
        }
        let Some(neighbors) = adjacency.get(device.as_str()) else {
            continue;
        };
        for neighbor in neighbors {
            let candidate = distance + 1;
            let known = paths.distances.get(*neighbor);
            if known.is_none_or(|known| candidate < *known) {
                paths.distances.insert(neighbor.to_string(), candidate);
                paths
                    .predecessors
                    .insert(neighbor.to_string(), device.clone());
                candidates.insert((candidate, neighbor.to_string()), ());
            }
        }
    }

    paths
}
