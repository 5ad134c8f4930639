//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use prefix_trie::map::PrefixMap;
use prefix_trie::Prefix;
use vxland_utils::ip::{Ipv4NetworkExt, Ipv6NetworkExt};
use vxland_utils::route::{Path, Peer};

use crate::evpn::PathDelete;

// Per-VRF IP-unicast tables, one per address family.
#[derive(Debug, Default)]
pub struct InetTable {
    pub ipv4: PrefixMap<Ipv4Network, InetRoute>,
    pub ipv6: PrefixMap<Ipv6Network, InetRoute>,
}

// One IP-unicast table row, holding at most one path per peer.
#[derive(Clone, Debug, Default)]
pub struct InetRoute {
    pub paths: BTreeMap<Peer, Path>,
}

// ===== impl InetTable =====

impl InetTable {
    // Exact-prefix lookup.
    pub fn get(&self, prefix: &IpNetwork) -> Option<&InetRoute> {
        match prefix {
            IpNetwork::V4(prefix) => self.ipv4.get(prefix),
            IpNetwork::V6(prefix) => self.ipv6.get(prefix),
        }
    }

    // Longest prefix match for the given address.
    pub fn get_lpm(&self, addr: &IpAddr) -> Option<(IpNetwork, &InetRoute)> {
        match addr {
            IpAddr::V4(addr) => {
                let prefix =
                    Ipv4Network::new(*addr, Ipv4Network::MAX_PREFIXLEN)
                        .ok()?;
                let (lpm_prefix, route) = self.ipv4.get_lpm(&prefix)?;
                Some((IpNetwork::V4(*lpm_prefix), route))
            }
            IpAddr::V6(addr) => {
                let prefix =
                    Ipv6Network::new(*addr, Ipv6Network::MAX_PREFIXLEN)
                        .ok()?;
                let (lpm_prefix, route) = self.ipv6.get_lpm(&prefix)?;
                Some((IpNetwork::V6(*lpm_prefix), route))
            }
        }
    }

    // Adds or refreshes a peer path. Returns true if the table changed.
    pub fn add_path(
        &mut self,
        prefix: IpNetwork,
        peer: Peer,
        path: Path,
    ) -> bool {
        match prefix {
            IpNetwork::V4(prefix) => {
                Self::add_path_in(&mut self.ipv4, prefix, peer, path)
            }
            IpNetwork::V6(prefix) => {
                Self::add_path_in(&mut self.ipv6, prefix, peer, path)
            }
        }
    }

    // Removes a peer path, destroying the row once no path remains.
    pub fn delete_path(
        &mut self,
        prefix: &IpNetwork,
        peer: Peer,
    ) -> PathDelete<InetRoute> {
        match prefix {
            IpNetwork::V4(prefix) => {
                Self::delete_path_in(&mut self.ipv4, prefix, peer)
            }
            IpNetwork::V6(prefix) => {
                Self::delete_path_in(&mut self.ipv6, prefix, peer)
            }
        }
    }

    // All prefixes currently present in the table.
    pub fn prefixes(&self) -> Vec<IpNetwork> {
        self.ipv4
            .iter()
            .map(|(prefix, _)| IpNetwork::V4(*prefix))
            .chain(self.ipv6.iter().map(|(prefix, _)| IpNetwork::V6(*prefix)))
            .collect()
    }

    // Empties the table, returning its rows.
    pub(crate) fn take_all(&mut self) -> Vec<(IpNetwork, InetRoute)> {
        let mut routes = Vec::new();
        let ipv4 = std::mem::take(&mut self.ipv4);
        for (prefix, route) in &ipv4 {
            routes.push((IpNetwork::V4(*prefix), route.clone()));
        }
        let ipv6 = std::mem::take(&mut self.ipv6);
        for (prefix, route) in &ipv6 {
            routes.push((IpNetwork::V6(*prefix), route.clone()));
        }
        routes
    }

    fn add_path_in<P>(
        map: &mut PrefixMap<P, InetRoute>,
        prefix: P,
        peer: Peer,
        path: Path,
    ) -> bool
    where
        P: Prefix,
    {
        let route = map.entry(prefix).or_default();
        if let Some(old_path) = route.paths.get(&peer) {
            if old_path.same_as(&path) {
                return false;
            }
        }
        route.paths.insert(peer, path);
        true
    }

    fn delete_path_in<P>(
        map: &mut PrefixMap<P, InetRoute>,
        prefix: &P,
        peer: Peer,
    ) -> PathDelete<InetRoute>
    where
        P: Prefix,
    {
        let empty = match map.get_mut(prefix) {
            Some(route) => {
                if route.paths.remove(&peer).is_none() {
                    return PathDelete::Unchanged;
                }
                route.paths.is_empty()
            }
            None => return PathDelete::Unchanged,
        };
        if empty {
            match map.remove(prefix) {
                Some(route) => PathDelete::RouteRemoved(route),
                None => PathDelete::Unchanged,
            }
        } else {
            PathDelete::PathRemoved
        }
    }
}

// ===== impl InetRoute =====

impl InetRoute {
    pub fn path(&self, peer: Peer) -> Option<&Path> {
        self.paths.get(&peer)
    }
}
