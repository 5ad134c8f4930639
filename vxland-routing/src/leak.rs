//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use tracing::debug;
use uuid::Uuid;
use vxland_utils::ip::{IpAddrExt, IpNetworkExt};
use vxland_utils::route::{EvpnRouteKey, Nexthop, Path, PathAttrs, Peer};

use crate::evpn::PathDelete;
use crate::inet::InetRoute;
use crate::walk::WalkOp;
use crate::Master;

// Route-table change notification. The controller's own table writes
// re-enter the reconciler through these, exactly like external updates.
#[derive(Debug)]
pub(crate) enum RouteEvent {
    EvpnUpd {
        vrf: String,
        key: EvpnRouteKey,
    },
    EvpnDel {
        vrf: String,
        key: EvpnRouteKey,
    },
    InetUpd {
        vrf: String,
        prefix: IpNetwork,
    },
    // Deletes carry the final row so retraction targets survive the row.
    InetDel {
        vrf: String,
        prefix: IpNetwork,
        route: InetRoute,
    },
}

// ===== global functions =====

// Dispatches one route-table notification to the matching handler.
pub(crate) fn route_notify(master: &mut Master, event: RouteEvent) {
    match event {
        RouteEvent::EvpnUpd { vrf, key } | RouteEvent::EvpnDel { vrf, key } => {
            evpn_route_notify(master, &vrf, &key);
        }
        RouteEvent::InetUpd { vrf, prefix } => {
            inet_route_notify(master, &vrf, prefix, None);
        }
        RouteEvent::InetDel { vrf, prefix, route } => {
            inet_route_notify(master, &vrf, prefix, Some(route));
        }
    }
}

// Routes an EVPN row to the Type-2 or Type-5 handler. Rows in VRFs the
// tracker does not subscribe to are dropped here.
fn evpn_route_notify(master: &mut Master, vrf_name: &str, key: &EvpnRouteKey) {
    if !master.vrf_states.contains_key(vrf_name) {
        return;
    }
    let Some(vn_name) =
        master.vrfs.get(vrf_name).and_then(|vrf| vrf.vn.clone())
    else {
        return;
    };
    let Some(vn) = master.vns.get(&vn_name) else {
        return;
    };
    let routing_vn = vn.vxlan_routing_vn;

    match key {
        EvpnRouteKey::Prefix(prefix) => {
            if routing_vn {
                evpn_type5_route_notify(master, vrf_name, *prefix);
            }
        }
        EvpnRouteKey::MacIp { .. } => {
            if !routing_vn {
                evpn_type2_route_notify(master, vrf_name, key);
            }
        }
    }
}

// Leaks local VM routes designated for routing into the routing VRF's EVPN
// table as Type-5 rows, and retracts the leak when the designation or the
// local path goes away.
fn inet_route_notify(
    master: &mut Master,
    vrf_name: &str,
    prefix: IpNetwork,
    removed: Option<InetRoute>,
) {
    if !master.vrf_states.contains_key(vrf_name) {
        return;
    }
    if master
        .vrfs
        .get(vrf_name)
        .and_then(|vrf| vrf.vn.as_ref())
        .is_none()
    {
        return;
    }

    let live = master
        .vrfs
        .get(vrf_name)
        .and_then(|vrf| vrf.inet.get(&prefix))
        .cloned();
    let deleted = live.is_none();
    let Some(route) = live.or(removed) else {
        return;
    };

    // Only rows already designated for routing carry the EVPN-routing peer
    // path.
    let Some(evpn_routing_path) = route.path(Peer::EvpnRouting) else {
        return;
    };
    let Some(routing_vrf) = evpn_routing_path
        .nexthop
        .indirection_vrf()
        .map(str::to_owned)
    else {
        return;
    };
    // The routing VRF is never the row's own VRF.
    if routing_vrf == vrf_name {
        return;
    }

    let local_path = route.path(Peer::LocalVmPort).cloned();
    let routing_vrf_live = master
        .vrfs
        .get(&routing_vrf)
        .is_some_and(|vrf| !vrf.deleted);

    match local_path {
        Some(local_path) if !deleted && routing_vrf_live => {
            update_evpn_type5_route(master, prefix, &local_path, &routing_vrf);
        }
        _ => {
            delete_evpn_type5_leak(master, &routing_vrf, prefix);
        }
    }
}

// Installs the Type-5 leak for a local VM route: the local interface
// next-hop with the VXLAN_ROUTING flag, attributes inherited from the
// local path.
fn update_evpn_type5_route(
    master: &mut Master,
    prefix: IpNetwork,
    local_path: &Path,
    routing_vrf_name: &str,
) {
    let Some(routing_vrf) = master.vrfs.get(routing_vrf_name) else {
        return;
    };
    let vxlan_id = routing_vrf.vxlan_id;
    let path = Path::new(
        local_path.nexthop.vxlan_routing(),
        local_path.attrs.clone(),
        vxlan_id,
        None,
    );
    let key = EvpnRouteKey::Prefix(prefix);
    let changed = match master.vrfs.get_mut(routing_vrf_name) {
        Some(vrf) => vrf.evpn.add_path(key.clone(), Peer::LocalVmExport, path),
        None => false,
    };
    if changed {
        debug!(vrf = %routing_vrf_name, %prefix, "type-5 route leaked");
        master.notify_route_event(RouteEvent::EvpnUpd {
            vrf: routing_vrf_name.to_owned(),
            key,
        });
    }
}

// Retracts a Type-5 leak from the routing VRF's EVPN table.
fn delete_evpn_type5_leak(
    master: &mut Master,
    routing_vrf: &str,
    prefix: IpNetwork,
) {
    let key = EvpnRouteKey::Prefix(prefix);
    let result = match master.vrfs.get_mut(routing_vrf) {
        Some(vrf) => vrf.evpn.delete_path(&key, Peer::LocalVmExport),
        None => PathDelete::Unchanged,
    };
    match result {
        PathDelete::Unchanged => (),
        PathDelete::PathRemoved => {
            debug!(vrf = %routing_vrf, %prefix, "type-5 leak retracted");
            master.notify_route_event(RouteEvent::EvpnUpd {
                vrf: routing_vrf.to_owned(),
                key,
            });
        }
        PathDelete::RouteRemoved(_) => {
            debug!(vrf = %routing_vrf, %prefix, "type-5 leak retracted");
            master.notify_route_event(RouteEvent::EvpnDel {
                vrf: routing_vrf.to_owned(),
                key,
            });
        }
    }
}

// Handles a Type-5 row change in a routing VRF: fans the prefix out to the
// attached bridges and mirrors it as an IP route inside the routing VRF
// itself.
fn evpn_type5_route_notify(
    master: &mut Master,
    vrf_name: &str,
    prefix: IpNetwork,
) {
    let Some(vn_name) =
        master.vrfs.get(vrf_name).and_then(|vrf| vrf.vn.clone())
    else {
        return;
    };
    let lr_uuid =
        master.vns.get(&vn_name).and_then(|vn| vn.logical_router_uuid);

    let live = master
        .vrfs
        .get(vrf_name)
        .and_then(|vrf| vrf.evpn.get(&EvpnRouteKey::Prefix(prefix)))
        .cloned();

    // Label the mirrored route with the bridge VN that originated the
    // prefix, when one matches exactly. Resolved before the fanout below
    // copies the prefix into the bridge tables themselves.
    let origin_vn = match &live {
        Some(_) => {
            lr_uuid.and_then(|uuid| origin_vn_lookup(master, uuid, &prefix))
        }
        None => None,
    };

    // Only non-host prefixes are copied to the bridges.
    if !prefix.is_host_prefix() {
        if let Some(lr_uuid) = lr_uuid {
            route_notify_in_lr_evpn_table(
                master,
                vrf_name,
                prefix,
                lr_uuid,
                None,
                WalkOp::Update,
            );
        }
    }

    match live {
        None => {
            // Row gone; drop the IP route mirrored inside the routing VRF.
            let result = match master.vrfs.get_mut(vrf_name) {
                Some(vrf) => {
                    vrf.inet.delete_path(&prefix, Peer::EvpnRouting)
                }
                None => PathDelete::Unchanged,
            };
            notify_inet_delete(master, vrf_name, prefix, result);
        }
        Some(route) => {
            let Some((_, active)) = route.active() else {
                return;
            };
            let path = Path::new(
                active.nexthop.clone(),
                active.attrs.clone(),
                active.vxlan_id,
                origin_vn,
            );
            let changed = match master.vrfs.get_mut(vrf_name) {
                Some(vrf) => {
                    vrf.inet.add_path(prefix, Peer::EvpnRouting, path)
                }
                None => false,
            };
            if changed {
                debug!(vrf = %vrf_name, %prefix, "routing VRF route updated");
                master.notify_route_event(RouteEvent::InetUpd {
                    vrf: vrf_name.to_owned(),
                    prefix,
                });
            }
        }
    }
}

// First bridge VN of the LR whose IP table carries exactly this prefix.
fn origin_vn_lookup(
    master: &Master,
    lr_uuid: Uuid,
    prefix: &IpNetwork,
) -> Option<String> {
    let lr = master.routers.get(&lr_uuid)?;
    for vn_name in &lr.bridge_vns {
        let Some(vrf_name) =
            master.vns.get(vn_name).and_then(|vn| vn.vrf.as_deref())
        else {
            continue;
        };
        let Some(vrf) = master.vrfs.get(vrf_name) else {
            continue;
        };
        if let Some((found, _)) = vrf.inet.get_lpm(&prefix.network()) {
            if found == *prefix {
                return Some(vn_name.clone());
            }
        }
    }
    None
}

// Visitor over a routing VRF's Type-5 rows, acting on one target bridge VN
// (membership change) or on every bridge VN of the LR (re-scan). LR state
// is read here, at visit time.
pub(crate) fn route_notify_in_lr_evpn_table(
    master: &mut Master,
    routing_vrf: &str,
    prefix: IpNetwork,
    lr_uuid: Uuid,
    target_vn: Option<&str>,
    op: WalkOp,
) {
    // Host routes stay in the routing VRF; bridges reach them via Type-2.
    if prefix.is_host_prefix() {
        return;
    }

    if op == WalkOp::Withdraw {
        let Some(target_vn) = target_vn else {
            return;
        };
        let Some(bridge_vrf) =
            master.vns.get(target_vn).and_then(|vn| vn.vrf.clone())
        else {
            return;
        };
        delete_bridge_copy(master, &bridge_vrf, prefix);
        return;
    }

    let targets: Vec<String> = match target_vn {
        Some(vn_name) => vec![vn_name.to_owned()],
        None => match master.routers.get(&lr_uuid) {
            Some(lr) => lr.bridge_vns.iter().cloned().collect(),
            None => return,
        },
    };
    let live = master
        .vrfs
        .get(routing_vrf)
        .and_then(|vrf| vrf.evpn.get(&EvpnRouteKey::Prefix(prefix)))
        .cloned();
    let routing_vrf_name = master
        .routers
        .get(&lr_uuid)
        .and_then(|lr| lr.routing_vrf.clone());

    for vn_name in targets {
        let Some(bridge_vrf) =
            master.vns.get(&vn_name).and_then(|vn| vn.vrf.clone())
        else {
            continue;
        };
        match &live {
            Some(route) => {
                let Some((peer, active)) = route.active() else {
                    return;
                };
                let Some(routing_vrf_name) = routing_vrf_name.as_deref()
                else {
                    return;
                };
                // Only prefixes learned from the control node are copied.
                if peer != Peer::Bgp {
                    return;
                }
                let vxlan_id = master
                    .vrfs
                    .get(routing_vrf_name)
                    .map(|vrf| vrf.vxlan_id)
                    .unwrap_or(0);
                let path = Path::new(
                    Nexthop::Vrf {
                        vrf_name: routing_vrf_name.to_owned(),
                    },
                    active.attrs.clone(),
                    vxlan_id,
                    None,
                );
                let changed = match master.vrfs.get_mut(&bridge_vrf) {
                    Some(vrf) => {
                        vrf.inet.add_path(prefix, Peer::EvpnRouting, path)
                    }
                    None => false,
                };
                if changed {
                    debug!(vrf = %bridge_vrf, %prefix,
                        "prefix copied to bridge");
                    master.notify_route_event(RouteEvent::InetUpd {
                        vrf: bridge_vrf,
                        prefix,
                    });
                }
            }
            None => delete_bridge_copy(master, &bridge_vrf, prefix),
        }
    }
}

// Removes a leaked prefix copy from a bridge VRF's IP table.
fn delete_bridge_copy(
    master: &mut Master,
    bridge_vrf: &str,
    prefix: IpNetwork,
) {
    let result = match master.vrfs.get_mut(bridge_vrf) {
        Some(vrf) => vrf.inet.delete_path(&prefix, Peer::EvpnRouting),
        None => PathDelete::Unchanged,
    };
    if !matches!(result, PathDelete::Unchanged) {
        debug!(vrf = %bridge_vrf, %prefix, "prefix copy removed");
    }
    notify_inet_delete(master, bridge_vrf, prefix, result);
}

// Maintains the bridge-side IP host route derived from a Type-2 row.
pub(crate) fn evpn_type2_route_notify(
    master: &mut Master,
    vrf_name: &str,
    key: &EvpnRouteKey,
) {
    let EvpnRouteKey::MacIp { ip, .. } = key else {
        return;
    };
    if ip.is_unspecified() {
        return;
    }
    let Some(vn_name) =
        master.vrfs.get(vrf_name).and_then(|vrf| vrf.vn.clone())
    else {
        return;
    };

    let routing_vrf = master
        .routers
        .routing_vrf_of_vn(&vn_name)
        .map(str::to_owned)
        .filter(|name| {
            master.vrfs.get(name).is_some_and(|vrf| !vrf.deleted)
        });
    let live = master
        .vrfs
        .get(vrf_name)
        .and_then(|vrf| vrf.evpn.get(key))
        .cloned();

    match (live, routing_vrf) {
        (Some(route), Some(routing_vrf)) => {
            let Some((_, active)) = route.active() else {
                return;
            };
            let attrs = active.attrs.clone();
            update_inet_route(master, vrf_name, *ip, attrs, &routing_vrf);
        }
        _ => delete_inet_route(master, vrf_name, *ip),
    }
}

// Installs/refreshes the host route pointing at the routing VRF.
fn update_inet_route(
    master: &mut Master,
    vrf_name: &str,
    ip: IpAddr,
    attrs: PathAttrs,
    routing_vrf_name: &str,
) {
    let vxlan_id = master
        .vrfs
        .get(routing_vrf_name)
        .map(|vrf| vrf.vxlan_id)
        .unwrap_or(0);
    let prefix = ip.to_host_prefix();
    let path = Path::new(
        Nexthop::Vrf {
            vrf_name: routing_vrf_name.to_owned(),
        },
        attrs,
        vxlan_id,
        None,
    );
    let changed = match master.vrfs.get_mut(vrf_name) {
        Some(vrf) => vrf.inet.add_path(prefix, Peer::EvpnRouting, path),
        None => false,
    };
    if changed {
        debug!(vrf = %vrf_name, %prefix, "host route installed");
        master.notify_route_event(RouteEvent::InetUpd {
            vrf: vrf_name.to_owned(),
            prefix,
        });
    }
}

// Withdraws the host route, retracting the Type-5 leak that hung off it
// first.
fn delete_inet_route(master: &mut Master, vrf_name: &str, ip: IpAddr) {
    let host_prefix = ip.to_host_prefix();

    // Longest match on the exact IP; the row may be a covering one.
    let mut leak_target = None;
    if let Some(vrf) = master.vrfs.get(vrf_name) {
        if let Some((found_prefix, route)) = vrf.inet.get_lpm(&ip) {
            if let Some(path) = route.path(Peer::EvpnRouting) {
                if let Some(routing_vrf) = path.nexthop.indirection_vrf() {
                    leak_target = Some((routing_vrf.to_owned(), found_prefix));
                }
            }
        }
    }
    if let Some((routing_vrf, prefix)) = leak_target {
        delete_evpn_type5_leak(master, &routing_vrf, prefix);
    }

    let result = match master.vrfs.get_mut(vrf_name) {
        Some(vrf) => vrf.inet.delete_path(&host_prefix, Peer::EvpnRouting),
        None => PathDelete::Unchanged,
    };
    if !matches!(result, PathDelete::Unchanged) {
        debug!(vrf = %vrf_name, prefix = %host_prefix, "host route removed");
    }
    notify_inet_delete(master, vrf_name, host_prefix, result);
}

// Emits a delete notification for every row of a VRF being torn down, so
// dependent leaks unwind exactly as they would for row-by-row deletes.
pub(crate) fn flush_route_tables(master: &mut Master, vrf_name: &str) {
    let (evpn_keys, inet_routes) = match master.vrfs.get_mut(vrf_name) {
        Some(vrf) => {
            let evpn_keys: Vec<EvpnRouteKey> =
                std::mem::take(&mut vrf.evpn.routes).into_keys().collect();
            let inet_routes = vrf.inet.take_all();
            (evpn_keys, inet_routes)
        }
        None => return,
    };
    debug!(vrf = %vrf_name, evpn = evpn_keys.len(),
        inet = inet_routes.len(), "route tables flushed");
    for key in evpn_keys {
        master.notify_route_event(RouteEvent::EvpnDel {
            vrf: vrf_name.to_owned(),
            key,
        });
    }
    for (prefix, route) in inet_routes {
        master.notify_route_event(RouteEvent::InetDel {
            vrf: vrf_name.to_owned(),
            prefix,
            route,
        });
    }
}

// ===== helper functions =====

fn notify_inet_delete(
    master: &mut Master,
    vrf_name: &str,
    prefix: IpNetwork,
    result: PathDelete<InetRoute>,
) {
    match result {
        PathDelete::Unchanged => (),
        PathDelete::PathRemoved => {
            master.notify_route_event(RouteEvent::InetUpd {
                vrf: vrf_name.to_owned(),
                prefix,
            });
        }
        PathDelete::RouteRemoved(route) => {
            master.notify_route_event(RouteEvent::InetDel {
                vrf: vrf_name.to_owned(),
                prefix,
                route,
            });
        }
    }
}
