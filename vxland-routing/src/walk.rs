//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, VecDeque};

use derive_new::new;
use ipnetwork::IpNetwork;
use tracing::debug;
use uuid::Uuid;
use vxland_utils::route::EvpnRouteKey;

use crate::{leak, subnet, Master};

// Direction of a routing-VRF walk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WalkOp {
    Update,
    Withdraw,
}

// One queued walk over a routing VRF's EVPN table, acting on a single
// bridge VN or, without a target, on every bridge VN of the LR.
#[derive(Debug, new)]
pub(crate) struct RoutingVrfWalk {
    pub lr: Uuid,
    pub vn: Option<String>,
    pub op: WalkOp,
}

// Pending table walks.
#[derive(Debug, Default)]
pub(crate) struct Walks {
    // Bridge EVPN walks, at most one per table. Re-scheduling an already
    // queued table re-arms the pending walk instead of adding another.
    bridge: BTreeSet<String>,
    // Routing-VRF walks, one per request; the visitor parameters differ,
    // so no de-duplication.
    routing: VecDeque<RoutingVrfWalk>,
}

// ===== impl Walks =====

impl Walks {
    pub(crate) fn schedule_routing_walk(
        &mut self,
        lr: Uuid,
        vn: Option<String>,
        op: WalkOp,
    ) {
        self.routing.push_back(RoutingVrfWalk::new(lr, vn, op));
    }

    fn pop_bridge(&mut self) -> Option<String> {
        self.bridge.pop_first()
    }

    fn pop_routing(&mut self) -> Option<RoutingVrfWalk> {
        self.routing.pop_front()
    }
}

// ===== global functions =====

// Schedules a walk over a bridge VRF's EVPN table. Subnet routes are
// revisited on every schedule; the rows are revisited on the next drain.
pub(crate) fn schedule_bridge_walk(master: &mut Master, vrf_name: &str) {
    let is_bridge_state = master
        .vrf_states
        .get(vrf_name)
        .is_some_and(|state| state.is_bridge_vrf);
    subnet::handle_subnet_route(master, vrf_name, is_bridge_state);
    master.walks.bridge.insert(vrf_name.to_owned());
}

// Runs queued route notifications and walks until quiescent.
pub(crate) fn process_pending(master: &mut Master) {
    loop {
        if let Some(event) = master.route_events.pop_front() {
            leak::route_notify(master, event);
            continue;
        }
        if let Some(vrf_name) = master.walks.pop_bridge() {
            run_bridge_walk(master, &vrf_name);
            continue;
        }
        if let Some(walk) = master.walks.pop_routing() {
            run_routing_walk(master, walk);
            continue;
        }
        break;
    }
}

// Revisits every Type-2 row of a bridge EVPN table.
fn run_bridge_walk(master: &mut Master, vrf_name: &str) {
    let Some(vrf) = master.vrfs.get(vrf_name) else {
        return;
    };
    let keys: Vec<EvpnRouteKey> = vrf.evpn.type2_keys().collect();
    debug!(vrf = %vrf_name, routes = keys.len(), "bridge EVPN walk");
    for key in keys {
        leak::evpn_type2_route_notify(master, vrf_name, &key);
    }
}

// Revisits every Type-5 row of a routing VRF's EVPN table on behalf of one
// bridge VN (or all of them). LR state is re-read here, not captured at
// schedule time.
fn run_routing_walk(master: &mut Master, walk: RoutingVrfWalk) {
    let Some(lr) = master.routers.get(&walk.lr) else {
        return;
    };
    let Some(routing_vrf) = lr.routing_vrf.clone() else {
        return;
    };
    let Some(vrf) = master.vrfs.get(&routing_vrf) else {
        return;
    };
    let prefixes: Vec<IpNetwork> = vrf.evpn.type5_prefixes().collect();
    debug!(lr = %walk.lr, vrf = %routing_vrf, routes = prefixes.len(),
        "routing VRF EVPN walk");
    for prefix in prefixes {
        leak::route_notify_in_lr_evpn_table(
            master,
            &routing_vrf,
            prefix,
            walk.lr,
            walk.vn.as_deref(),
            walk.op,
        );
    }
}

// ===== tests =====
