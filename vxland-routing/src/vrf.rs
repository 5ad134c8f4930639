//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use derive_new::new;
use vxland_utils::ibus::VrfUpdateMsg;

use crate::evpn::EvpnTable;
use crate::inet::InetTable;
use crate::{leak, subnet, Master};

// One observed VRF and its route tables.
#[derive(Debug, Default)]
pub struct VrfEntry {
    pub name: String,
    pub vn: Option<String>,
    pub vxlan_id: u32,
    pub evpn: EvpnTable,
    pub inet: InetTable,
    pub deleted: bool,
}

// Observed VRFs, keyed by name.
#[derive(Debug, Default)]
pub struct Vrfs {
    entries: BTreeMap<String, VrfEntry>,
}

// Per-VRF tracker state. Its creation stands in for arming the EVPN and
// IPv4/IPv6 unicast table subscriptions: route notifications for VRFs
// without state are discarded before they reach the reconciler.
#[derive(Debug, new)]
pub struct VrfState {
    pub is_bridge_vrf: bool,
}

// ===== impl Vrfs =====

impl Vrfs {
    pub fn get(&self, name: &str) -> Option<&VrfEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut VrfEntry> {
        self.entries.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VrfEntry> {
        self.entries.values()
    }

    pub(crate) fn update(&mut self, msg: &VrfUpdateMsg) {
        let entry = self.entries.entry(msg.name.clone()).or_default();
        entry.name = msg.name.clone();
        entry.vn = msg.vn.clone();
        entry.vxlan_id = msg.vxlan_id;
        entry.deleted = false;
    }

    pub(crate) fn mark_deleted(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.deleted = true;
        }
    }

    pub(crate) fn sweep(&mut self) {
        self.entries.retain(|_, entry| !entry.deleted);
    }
}

// ===== global functions =====

// Handles a VRF update notification.
pub(crate) fn process_vrf_update(master: &mut Master, msg: VrfUpdateMsg) {
    if msg.name == master.config.fabric_vrf_name
        || msg.name == master.config.fabric_policy_vrf_name
    {
        return;
    }

    master.vrfs.update(&msg);
    if !master.vrf_states.contains_key(&msg.name) {
        let is_bridge_vrf = msg
            .vn
            .as_deref()
            .and_then(|vn| master.vns.get(vn))
            .is_some_and(|vn| !vn.vxlan_routing_vn);
        master
            .vrf_states
            .insert(msg.name.clone(), VrfState::new(is_bridge_vrf));
    }

    let is_bridge_vrf = master
        .vrf_states
        .get(&msg.name)
        .is_some_and(|state| state.is_bridge_vrf);
    subnet::handle_subnet_route(master, &msg.name, is_bridge_vrf);
}

// Handles a VRF delete notification. The tracker state survives until the
// end-of-turn sweep so the flushed rows still reach the reconciler.
pub(crate) fn process_vrf_delete(master: &mut Master, name: &str) {
    master.vrfs.mark_deleted(name);
    let Some(state) = master.vrf_states.get(name) else {
        return;
    };
    let is_bridge_vrf = state.is_bridge_vrf;
    subnet::handle_subnet_route(master, name, is_bridge_vrf);
    leak::flush_route_tables(master, name);
}
