//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use uuid::Uuid;

use crate::walk::WalkOp;
use crate::{subnet, vn, walk, Master};

// One logical router: the owning routing VN, its VRF, and the attached
// bridge VNs.
#[derive(Debug, Default)]
pub struct LogicalRouter {
    pub routing_vrf: Option<String>,
    pub parent_vn: Option<String>,
    pub bridge_vns: BTreeSet<String>,
}

// Logical-router map and its VN reverse index.
#[derive(Debug, Default)]
pub struct LogicalRouters {
    routers: BTreeMap<Uuid, LogicalRouter>,
    vn_lr: BTreeMap<String, Uuid>,
}

// ===== impl LogicalRouters =====

impl LogicalRouters {
    pub fn get(&self, uuid: &Uuid) -> Option<&LogicalRouter> {
        self.routers.get(uuid)
    }

    pub(crate) fn get_mut(&mut self, uuid: &Uuid) -> Option<&mut LogicalRouter> {
        self.routers.get_mut(uuid)
    }

    pub(crate) fn entry(&mut self, uuid: Uuid) -> &mut LogicalRouter {
        self.routers.entry(uuid).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &LogicalRouter)> {
        self.routers.iter()
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    // LR the given VN is recorded under, if any.
    pub fn lr_of_vn(&self, vn: &str) -> Option<Uuid> {
        self.vn_lr.get(vn).copied()
    }

    // Routing VRF serving the given VN, when its LR has one assigned.
    pub fn routing_vrf_of_vn(&self, vn: &str) -> Option<&str> {
        let uuid = self.vn_lr.get(vn)?;
        self.routers.get(uuid)?.routing_vrf.as_deref()
    }

    pub(crate) fn record_vn(&mut self, vn: &str, uuid: Uuid) {
        self.vn_lr.insert(vn.to_owned(), uuid);
    }

    pub(crate) fn forget_vn(&mut self, vn: &str) {
        self.vn_lr.remove(vn);
    }

    // Drops an LR entry once it references nothing. Invoked on every
    // membership change that may have released the last reference.
    pub(crate) fn try_delete(&mut self, uuid: &Uuid) {
        if let Some(lr) = self.routers.get(uuid) {
            if lr.routing_vrf.is_none() && lr.bridge_vns.is_empty() {
                debug!(%uuid, "logical router released");
                self.routers.remove(uuid);
            }
        }
    }
}

// ===== global functions =====

// Realigns a bridge VN's LR membership with its derived UUID and reseeds
// Type-2 leakage through its EVPN table.
pub(crate) fn bridge_vn_notify(master: &mut Master, vn_name: &str) {
    let Some(entry) = master.vns.get(vn_name) else {
        return;
    };
    let entry = entry.clone();

    // A VN advertising its own LR UUID is a routing VN; not handled here.
    if entry.logical_router_uuid.is_some() {
        return;
    }

    // Refresh the derived UUID; attached VMIs may have come or gone.
    {
        let Some(state) = master.vn_states.get_mut(vn_name) else {
            return;
        };
        vn::update_logical_router_uuid(state, &master.vmis);
    }
    let state = match master.vn_states.get(vn_name) {
        Some(state) => state.clone(),
        None => return,
    };

    let cur = master.routers.lr_of_vn(vn_name);
    let new = state.logical_router_uuid;

    let mut withdraw = false;
    let mut update = true;
    if entry.deleted || entry.vrf.is_none() {
        withdraw = true;
        update = false;
    }
    if cur.is_some() && cur != new && new.is_some() {
        withdraw = true;
    }
    if new.is_none() {
        withdraw = true;
        update = false;
    }

    if withdraw {
        if let Some(cur) = cur {
            if master.routers.get(&cur).is_some() {
                // Detach the subnets first; the LR still lists this VN.
                if let Some(vrf_name) = entry.vrf.clone() {
                    let vrf_live = master
                        .vrfs
                        .get(&vrf_name)
                        .is_some_and(|vrf| !vrf.deleted);
                    if vrf_live {
                        subnet::delete_subnet_routes(master, &vrf_name);
                    }
                }
                let member = master
                    .routers
                    .get(&cur)
                    .is_some_and(|lr| lr.bridge_vns.contains(vn_name));
                if member {
                    master.walks.schedule_routing_walk(
                        cur,
                        Some(vn_name.to_owned()),
                        WalkOp::Withdraw,
                    );
                    if let Some(lr) = master.routers.get_mut(&cur) {
                        lr.bridge_vns.remove(vn_name);
                    }
                    debug!(vn = %vn_name, lr = %cur, "bridge VN detached");
                }
                master.routers.try_delete(&cur);
            }
        }
        master.routers.forget_vn(vn_name);
    }

    if update {
        let Some(new) = new else {
            return;
        };
        master.routers.record_vn(vn_name, new);
        let lr = master.routers.entry(new);
        if lr.bridge_vns.insert(vn_name.to_owned()) {
            debug!(vn = %vn_name, lr = %new, "bridge VN attached");
        }
        master.walks.schedule_routing_walk(
            new,
            Some(vn_name.to_owned()),
            WalkOp::Update,
        );
    }

    // Without a VRF no walk can be scheduled.
    let Some(vrf_ref) = state.vrf else {
        return;
    };
    if update || withdraw {
        walk::schedule_bridge_walk(master, &vrf_ref);
    }
}

// Maintains an LR's ownership and routing VRF, reseeding the attached
// bridge VRFs whenever the routing VRF is (re)assigned or released.
pub(crate) fn routing_vn_notify(master: &mut Master, vn_name: &str) {
    let Some(entry) = master.vns.get(vn_name) else {
        return;
    };
    let entry = entry.clone();
    let Some(state) = master.vn_states.get(vn_name) else {
        return;
    };
    let state = state.clone();

    let cur = master.routers.lr_of_vn(vn_name);
    let new = state.logical_router_uuid;

    let withdraw;
    let update;
    if entry.deleted || entry.vrf.is_none() || !state.is_routing_vn {
        update = false;
        withdraw = true;
    } else {
        update = true;
        // The LR UUID changed: withdraw from the old entry before claiming
        // the new one.
        withdraw = cur.is_some() && cur != new;
    }

    if withdraw {
        if let Some(cur) = cur {
            let mut rewalk = Vec::new();
            let mut released = false;
            if let Some(lr) = master.routers.get_mut(&cur) {
                // Clear ownership only when this VN still holds it; another
                // routing VN may have claimed the LR before this delete was
                // observed.
                if lr.parent_vn.as_deref() == Some(vn_name) {
                    lr.parent_vn = None;
                    lr.routing_vrf = None;
                    rewalk = lr.bridge_vns.iter().cloned().collect();
                    released = true;
                }
            }
            if released {
                debug!(vn = %vn_name, lr = %cur, "routing VRF released");
                walk_bridge_vns(master, &rewalk);
            }
            master.routers.try_delete(&cur);
            master.routers.forget_vn(vn_name);
        }
    }

    if update {
        let Some(new) = new else {
            return;
        };
        master.routers.record_vn(vn_name, new);
        let mut rewalk = Vec::new();
        let mut assigned = false;
        {
            let lr = master.routers.entry(new);
            // Take the ownership of the LR.
            lr.parent_vn = Some(vn_name.to_owned());
            if lr.routing_vrf != entry.vrf {
                lr.routing_vrf = entry.vrf.clone();
                rewalk = lr.bridge_vns.iter().cloned().collect();
                assigned = true;
            }
        }
        if assigned {
            debug!(vn = %vn_name, lr = %new, vrf = ?entry.vrf,
                "routing VRF assigned");
            walk_bridge_vns(master, &rewalk);
        }
    }
}

// Schedules a Type-2 reseed walk on every listed bridge VN's VRF.
fn walk_bridge_vns(master: &mut Master, vns: &[String]) {
    for vn_name in vns {
        let Some(vrf_name) =
            master.vns.get(vn_name).and_then(|vn| vn.vrf.clone())
        else {
            continue;
        };
        walk::schedule_bridge_walk(master, &vrf_name);
    }
}
