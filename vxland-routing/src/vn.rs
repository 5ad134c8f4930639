//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use ipnetwork::IpNetwork;
use uuid::Uuid;
use vxland_utils::ibus::VnUpdateMsg;
use vxland_utils::ip::IpNetworkExt;

use crate::logical_router;
use crate::vmi::Vmis;
use crate::Master;

// One observed virtual network.
#[derive(Clone, Debug, Default)]
pub struct VnEntry {
    pub name: String,
    pub vxlan_routing_vn: bool,
    // LR UUID advertised by the VN itself; set on routing VNs only.
    pub logical_router_uuid: Option<Uuid>,
    pub vrf: Option<String>,
    pub ipam: Vec<IpNetwork>,
    pub deleted: bool,
}

// Observed virtual networks, keyed by name.
#[derive(Debug, Default)]
pub struct Vns {
    entries: BTreeMap<String, VnEntry>,
}

// Derived per-VN state.
#[derive(Clone, Debug, Default)]
pub struct VnState {
    // Once a VN has been seen as a routing VN, it stays classified as one.
    pub is_routing_vn: bool,
    pub logical_router_uuid: Option<Uuid>,
    // Attached router VMIs, in insertion order. The first entry with a
    // non-nil LR UUID decides the bridge VN's logical router.
    pub vmis: Vec<String>,
    // Last known VRF, kept so deferred walks can still find the tables.
    pub vrf: Option<String>,
}

// ===== impl Vns =====

impl Vns {
    pub fn get(&self, name: &str) -> Option<&VnEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VnEntry> {
        self.entries.values()
    }

    pub(crate) fn update(&mut self, msg: &VnUpdateMsg) {
        let entry = self.entries.entry(msg.name.clone()).or_default();
        entry.name = msg.name.clone();
        entry.vxlan_routing_vn = msg.vxlan_routing_vn;
        entry.logical_router_uuid = msg.logical_router_uuid;
        entry.vrf = msg.vrf.clone();
        entry.ipam =
            msg.ipam.iter().map(|prefix| prefix.apply_mask()).collect();
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

// ===== impl VnState =====

impl VnState {
    // Records an attached VMI. Returns true when the insertion changes the
    // VN's derived LR UUID.
    pub(crate) fn add_vmi(&mut self, vmi: &str, lr_uuid: Option<Uuid>) -> bool {
        if self.vmis.iter().any(|name| name == vmi) {
            return false;
        }
        let was_empty = self.vmis.is_empty();
        self.vmis.push(vmi.to_owned());
        was_empty && self.logical_router_uuid != lr_uuid
    }

    // Forgets an attached VMI. Returns true if it was present.
    pub(crate) fn remove_vmi(&mut self, vmi: &str) -> bool {
        match self.vmis.iter().position(|name| name == vmi) {
            Some(pos) => {
                self.vmis.remove(pos);
                true
            }
            None => false,
        }
    }
}

// ===== global functions =====

// Handles a VN update notification.
pub(crate) fn process_vn_update(master: &mut Master, msg: VnUpdateMsg) {
    master.vns.update(&msg);
    vn_notify(master, &msg.name);
}

// Handles a VN delete notification.
pub(crate) fn process_vn_delete(master: &mut Master, name: &str) {
    let Some(state) = master.vn_states.get(name) else {
        master.vns.mark_deleted(name);
        return;
    };
    let is_routing_vn = state.is_routing_vn;
    master.vns.mark_deleted(name);
    if is_routing_vn {
        logical_router::routing_vn_notify(master, name);
    } else {
        logical_router::bridge_vn_notify(master, name);
    }
    master.vn_states.remove(name);
}

// Refreshes the derived state of a VN and dispatches the LR map notify
// rules. Also entered synchronously from the VMI path, so that VN state
// exists before the VMI set is touched.
pub(crate) fn vn_notify(master: &mut Master, name: &str) {
    let Some(entry) = master.vns.get(name) else {
        return;
    };
    let entry = entry.clone();

    let is_routing_vn = {
        let state = master.vn_states.entry(name.to_owned()).or_default();
        if entry.vxlan_routing_vn {
            state.is_routing_vn = true;
        }
        state.vrf = entry.vrf.clone();
        if state.is_routing_vn {
            state.logical_router_uuid = entry.logical_router_uuid;
        }
        state.is_routing_vn
    };

    if is_routing_vn {
        logical_router::routing_vn_notify(master, name);
    } else {
        logical_router::bridge_vn_notify(master, name);
    }
}

// Recomputes a bridge VN's LR UUID from its attached VMIs, pruning entries
// whose UUID went nil. The VMI update path rebuilds pruned entries.
pub(crate) fn update_logical_router_uuid(state: &mut VnState, vmis: &Vmis) {
    if state.vmis.is_empty() {
        state.logical_router_uuid = None;
    }
    while let Some(first) = state.vmis.first() {
        let lr_uuid =
            vmis.get(first).and_then(|vmi| vmi.logical_router_uuid);
        state.logical_router_uuid = lr_uuid;
        if lr_uuid.is_some() {
            return;
        }
        state.vmis.remove(0);
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use vxland_utils::ibus::{VmiDeviceType, VmiType, VmiUpdateMsg};

    use super::*;

    fn vmi_msg(name: &str, lr_uuid: Option<Uuid>) -> VmiUpdateMsg {
        VmiUpdateMsg {
            name: name.to_owned(),
            vn: Some("vn-blue".to_owned()),
            device_type: VmiDeviceType::LogicalRouter,
            vmi_type: VmiType::Router,
            logical_router_uuid: lr_uuid,
        }
    }

    #[test]
    fn derived_uuid_follows_first_inserted_vmi() {
        let mut vmis = Vmis::default();
        vmis.update(&vmi_msg("vmi-1", Some(Uuid::from_u128(1))));
        vmis.update(&vmi_msg("vmi-2", Some(Uuid::from_u128(2))));

        let mut state = VnState::default();
        assert!(state.add_vmi("vmi-1", Some(Uuid::from_u128(1))));
        assert!(!state.add_vmi("vmi-2", Some(Uuid::from_u128(2))));

        update_logical_router_uuid(&mut state, &vmis);
        assert_eq!(state.logical_router_uuid, Some(Uuid::from_u128(1)));

        // Dropping the first VMI hands the lead to the second.
        assert!(state.remove_vmi("vmi-1"));
        update_logical_router_uuid(&mut state, &vmis);
        assert_eq!(state.logical_router_uuid, Some(Uuid::from_u128(2)));
    }

    #[test]
    fn nil_uuid_vmis_are_pruned() {
        let mut vmis = Vmis::default();
        vmis.update(&vmi_msg("vmi-1", None));
        vmis.update(&vmi_msg("vmi-2", Some(Uuid::from_u128(7))));

        let mut state = VnState::default();
        state.vmis = vec!["vmi-1".to_owned(), "vmi-2".to_owned()];

        update_logical_router_uuid(&mut state, &vmis);
        assert_eq!(state.logical_router_uuid, Some(Uuid::from_u128(7)));
        assert_eq!(state.vmis, vec!["vmi-2".to_owned()]);
    }

    #[test]
    fn derived_uuid_clears_when_no_vmi_remains() {
        let vmis = Vmis::default();
        let mut state = VnState::default();
        state.logical_router_uuid = Some(Uuid::from_u128(3));
        state.vmis = vec!["vmi-gone".to_owned()];

        update_logical_router_uuid(&mut state, &vmis);
        assert_eq!(state.logical_router_uuid, None);
        assert!(state.vmis.is_empty());
    }
}
