//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use ipnetwork::IpNetwork;
use vxland_utils::route::{EvpnRouteKey, Path, Peer};

// Per-VRF EVPN table: Type-2 MAC/IP rows and Type-5 prefix rows.
#[derive(Debug, Default)]
pub struct EvpnTable {
    pub routes: BTreeMap<EvpnRouteKey, EvpnRoute>,
}

// One EVPN table row, holding at most one path per peer.
#[derive(Clone, Debug, Default)]
pub struct EvpnRoute {
    pub paths: BTreeMap<Peer, Path>,
}

// Outcome of removing a peer path from a route.
#[derive(Debug)]
pub enum PathDelete<R> {
    // The path was not present.
    Unchanged,
    // The path was removed; other paths remain.
    PathRemoved,
    // The last path was removed and the row destroyed.
    RouteRemoved(R),
}

// ===== impl EvpnTable =====

impl EvpnTable {
    pub fn get(&self, key: &EvpnRouteKey) -> Option<&EvpnRoute> {
        self.routes.get(key)
    }

    // Adds or refreshes a peer path. Returns true if the table changed.
    pub fn add_path(
        &mut self,
        key: EvpnRouteKey,
        peer: Peer,
        path: Path,
    ) -> bool {
        let route = self.routes.entry(key).or_default();
        if let Some(old_path) = route.paths.get(&peer) {
            if old_path.same_as(&path) {
                return false;
            }
        }
        route.paths.insert(peer, path);
        true
    }

    // Removes a peer path, destroying the row once no path remains.
    pub fn delete_path(
        &mut self,
        key: &EvpnRouteKey,
        peer: Peer,
    ) -> PathDelete<EvpnRoute> {
        let empty = match self.routes.get_mut(key) {
            Some(route) => {
                if route.paths.remove(&peer).is_none() {
                    return PathDelete::Unchanged;
                }
                route.paths.is_empty()
            }
            None => return PathDelete::Unchanged,
        };
        if empty {
            match self.routes.remove(key) {
                Some(route) => PathDelete::RouteRemoved(route),
                None => PathDelete::Unchanged,
            }
        } else {
            PathDelete::PathRemoved
        }
    }

    // Type-5 prefixes currently present in the table.
    pub fn type5_prefixes(&self) -> impl Iterator<Item = IpNetwork> + '_ {
        self.routes.keys().filter_map(|key| key.as_prefix().copied())
    }

    // Type-2 keys currently present in the table.
    pub fn type2_keys(&self) -> impl Iterator<Item = EvpnRouteKey> + '_ {
        self.routes.keys().filter(|key| key.is_mac_ip()).cloned()
    }
}

// ===== impl EvpnRoute =====

impl EvpnRoute {
    // Returns the preferred path and its peer.
    pub fn active(&self) -> Option<(Peer, &Path)> {
        self.paths.iter().next().map(|(peer, path)| (*peer, path))
    }

    pub fn path(&self, peer: Peer) -> Option<&Path> {
        self.paths.get(&peer)
    }
}
