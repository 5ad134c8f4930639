//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use tracing::debug;
use uuid::Uuid;
use vxland_utils::route::{Nexthop, Path, PathAttrs, Peer};

use crate::evpn::PathDelete;
use crate::leak::RouteEvent;
use crate::Master;

// ===== global functions =====

// Realigns subnet routes for a VRF after a membership or VRF change: a
// bridge VRF bound to a logical router exchanges subnet routes with its
// peer bridges; one without a routing VRF (or being deleted) loses them.
pub(crate) fn handle_subnet_route(
    master: &mut Master,
    vrf_name: &str,
    is_bridge_state: bool,
) {
    let Some(vrf) = master.vrfs.get(vrf_name) else {
        return;
    };
    let deleted = vrf.deleted;
    let vn_name = vrf.vn.clone();

    let is_bridge_vn = vn_name
        .as_deref()
        .and_then(|vn| master.vns.get(vn))
        .map(|vn| !vn.vxlan_routing_vn);
    match is_bridge_vn {
        Some(true) => {
            let routing_vrf = vn_name
                .as_deref()
                .and_then(|vn| master.routers.routing_vrf_of_vn(vn))
                .map(str::to_owned);
            match routing_vrf {
                Some(routing_vrf) if !deleted => {
                    update_subnet_routes(master, vrf_name, &routing_vrf);
                }
                _ => delete_subnet_routes(master, vrf_name),
            }
        }
        _ if is_bridge_state && deleted => {
            delete_subnet_routes(master, vrf_name);
        }
        _ => (),
    }
}

// Installs this bridge's subnets into its peers and its peers' subnets into
// it, all pointing at the LR's routing VRF.
fn update_subnet_routes(
    master: &mut Master,
    bridge_vrf: &str,
    routing_vrf: &str,
) {
    let Some((vn_name, ipam)) = vrf_vn_ipam(master, bridge_vrf) else {
        return;
    };
    if ipam.is_empty() {
        return;
    }
    let Some(lr_uuid) = master.routers.lr_of_vn(&vn_name) else {
        return;
    };
    let vxlan_id = master
        .vrfs
        .get(routing_vrf)
        .map(|vrf| vrf.vxlan_id)
        .unwrap_or(0);

    for (peer_vrf, peer_ipam) in bridge_peers(master, lr_uuid, &vn_name) {
        for prefix in &ipam {
            add_subnet_route(master, &peer_vrf, *prefix, routing_vrf, vxlan_id);
        }
        for prefix in &peer_ipam {
            add_subnet_route(
                master, bridge_vrf, *prefix, routing_vrf, vxlan_id,
            );
        }
    }
}

// Withdraws the subnet routes exchanged between this bridge and its peers.
pub(crate) fn delete_subnet_routes(master: &mut Master, bridge_vrf: &str) {
    let Some((vn_name, ipam)) = vrf_vn_ipam(master, bridge_vrf) else {
        return;
    };
    if ipam.is_empty() {
        return;
    }
    let Some(lr_uuid) = master.routers.lr_of_vn(&vn_name) else {
        return;
    };

    for (peer_vrf, peer_ipam) in bridge_peers(master, lr_uuid, &vn_name) {
        for prefix in &ipam {
            del_subnet_route(master, &peer_vrf, *prefix);
        }
        for prefix in &peer_ipam {
            del_subnet_route(master, bridge_vrf, *prefix);
        }
    }
}

// ===== helper functions =====

// The VRF's VN and that VN's configured subnets.
fn vrf_vn_ipam(
    master: &Master,
    vrf_name: &str,
) -> Option<(String, Vec<IpNetwork>)> {
    let vrf = master.vrfs.get(vrf_name)?;
    let vn_name = vrf.vn.clone()?;
    let ipam = master.vns.get(&vn_name)?.ipam.clone();
    Some((vn_name, ipam))
}

// Peer bridge VNs of the same LR: their VRF names and subnets. The VN
// itself is never a peer of its own subnets.
fn bridge_peers(
    master: &Master,
    lr_uuid: Uuid,
    skip_vn: &str,
) -> Vec<(String, Vec<IpNetwork>)> {
    let Some(lr) = master.routers.get(&lr_uuid) else {
        return Vec::new();
    };
    let mut peers = Vec::new();
    for vn_name in &lr.bridge_vns {
        if vn_name == skip_vn {
            continue;
        }
        let Some(entry) = master.vns.get(vn_name) else {
            continue;
        };
        let Some(vrf_name) = entry.vrf.clone() else {
            continue;
        };
        peers.push((vrf_name, entry.ipam.clone()));
    }
    peers
}

fn add_subnet_route(
    master: &mut Master,
    vrf_name: &str,
    prefix: IpNetwork,
    routing_vrf: &str,
    vxlan_id: u32,
) {
    let path = Path::new(
        Nexthop::Vrf {
            vrf_name: routing_vrf.to_owned(),
        },
        PathAttrs::default(),
        vxlan_id,
        None,
    );
    let changed = match master.vrfs.get_mut(vrf_name) {
        Some(vrf) => vrf.inet.add_path(prefix, Peer::EvpnRouting, path),
        None => false,
    };
    if changed {
        debug!(vrf = %vrf_name, %prefix, "subnet route installed");
        master.notify_route_event(RouteEvent::InetUpd {
            vrf: vrf_name.to_owned(),
            prefix,
        });
    }
}

fn del_subnet_route(master: &mut Master, vrf_name: &str, prefix: IpNetwork) {
    let result = match master.vrfs.get_mut(vrf_name) {
        Some(vrf) => vrf.inet.delete_path(&prefix, Peer::EvpnRouting),
        None => PathDelete::Unchanged,
    };
    match result {
        PathDelete::Unchanged => (),
        PathDelete::PathRemoved => {
            debug!(vrf = %vrf_name, %prefix, "subnet route removed");
            master.notify_route_event(RouteEvent::InetUpd {
                vrf: vrf_name.to_owned(),
                prefix,
            });
        }
        PathDelete::RouteRemoved(route) => {
            debug!(vrf = %vrf_name, %prefix, "subnet route removed");
            master.notify_route_event(RouteEvent::InetDel {
                vrf: vrf_name.to_owned(),
                prefix,
                route,
            });
        }
    }
}
