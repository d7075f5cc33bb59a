//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

// Returns the network address of `addr` under the given prefix length
// (host bits zeroed).
pub fn network_address(addr: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let mask = match prefix {
        0 => 0,
        _ => u32::MAX << (32 - u32::from(prefix)),
    };
    Ipv4Addr::from(u32::from(addr) & mask)
}

// Returns the other host address of a point-to-point /30 subnet, or
// `None` when the network isn't a /30.
//
// The two usable hosts of a /30 are network+1 and network+2.
pub fn slash30_peer(addr: Ipv4Network) -> Option<Ipv4Addr> {
    if addr.prefix() != 30 {
        return None;
    }
    let net = u32::from(addr.network());
    let host = u32::from(addr.ip());
    match host - net {
        1 => Some(Ipv4Addr::from(net + 2)),
        2 => Some(Ipv4Addr::from(net + 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_address_zeroes_host_bits() {
        let addr = Ipv4Addr::new(10, 1, 2, 3);
        assert_eq!(network_address(addr, 24), Ipv4Addr::new(10, 1, 2, 0));
        assert_eq!(network_address(addr, 16), Ipv4Addr::new(10, 1, 0, 0));
        assert_eq!(network_address(addr, 32), addr);
        assert_eq!(network_address(addr, 0), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn slash30_peer_addresses() {
        let a: Ipv4Network = "192.168.99.1/30".parse().unwrap();
        let b: Ipv4Network = "192.168.99.2/30".parse().unwrap();
        assert_eq!(slash30_peer(a), Some(Ipv4Addr::new(192, 168, 99, 2)));
        assert_eq!(slash30_peer(b), Some(Ipv4Addr::new(192, 168, 99, 1)));

        // Not a /30.
        let c: Ipv4Network = "10.0.0.1/24".parse().unwrap();
        assert_eq!(slash30_peer(c), None);

        // Network address itself has no peer.
        let d: Ipv4Network = "192.168.99.0/30".parse().unwrap();
        assert_eq!(slash30_peer(d), None);
    }
}
