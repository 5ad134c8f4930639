//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

// Address Family identifier.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum AddressFamily {
    Ipv4 = 1,
    Ipv6 = 2,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns the address family of the address.
    fn address_family(&self) -> AddressFamily;

    // Converts this IP address into a host prefix network.
    fn to_host_prefix(&self) -> IpNetwork;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Returns the address family of the network.
    fn address_family(&self) -> AddressFamily;

    // Returns true for host prefixes (/32 or /128).
    fn is_host_prefix(&self) -> bool;

    // Applies the network mask to the network address.
    fn apply_mask(&self) -> IpNetwork;
}

// Extension methods for Ipv4Network.
pub trait Ipv4NetworkExt {
    const MAX_PREFIXLEN: u8 = 32;
}

// Extension methods for Ipv6Network.
pub trait Ipv6NetworkExt {
    const MAX_PREFIXLEN: u8 = 128;
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn to_host_prefix(&self) -> IpNetwork {
        match self {
            IpAddr::V4(addr) => {
                IpNetwork::V4(Ipv4Network::from(*addr))
            }
            IpAddr::V6(addr) => {
                IpNetwork::V6(Ipv6Network::from(*addr))
            }
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn address_family(&self) -> AddressFamily {
        match self {
            IpNetwork::V4(_) => AddressFamily::Ipv4,
            IpNetwork::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn is_host_prefix(&self) -> bool {
        match self {
            IpNetwork::V4(network) => {
                network.prefix() == Ipv4Network::MAX_PREFIXLEN
            }
            IpNetwork::V6(network) => {
                network.prefix() == Ipv6Network::MAX_PREFIXLEN
            }
        }
    }

    fn apply_mask(&self) -> IpNetwork {
        match self {
            IpNetwork::V4(network) => {
                match Ipv4Network::new(network.network(), network.prefix()) {
                    Ok(network) => IpNetwork::V4(network),
                    Err(_) => *self,
                }
            }
            IpNetwork::V6(network) => {
                match Ipv6Network::new(network.network(), network.prefix()) {
                    Ok(network) => IpNetwork::V6(network),
                    Err(_) => *self,
                }
            }
        }
    }
}

// ===== impl Ipv4Network =====

impl Ipv4NetworkExt for Ipv4Network {}

// ===== impl Ipv6Network =====

impl Ipv6NetworkExt for Ipv6Network {}
