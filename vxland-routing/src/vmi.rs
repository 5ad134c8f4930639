//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use derive_new::new;
use uuid::Uuid;
use vxland_utils::ibus::{VmiDeviceType, VmiType, VmiUpdateMsg};

use crate::error::Error;
use crate::logical_router;
use crate::vn;
use crate::Master;

// One observed VM interface.
#[derive(Clone, Debug, Default)]
pub struct VmiEntry {
    pub name: String,
    pub vn: Option<String>,
    pub device_type: VmiDeviceType,
    pub vmi_type: VmiType,
    pub logical_router_uuid: Option<Uuid>,
    pub deleted: bool,
}

// Observed VM interfaces, keyed by name.
#[derive(Debug, Default)]
pub struct Vmis {
    entries: BTreeMap<String, VmiEntry>,
}

// Derived per-VMI state, held only for router interfaces on a logical
// router.
#[derive(Debug, new)]
pub struct VmiState {
    pub vn: String,
    pub logical_router_uuid: Option<Uuid>,
}

// ===== impl Vmis =====

impl Vmis {
    pub fn get(&self, name: &str) -> Option<&VmiEntry> {
        self.entries.get(name)
    }

    pub(crate) fn update(&mut self, msg: &VmiUpdateMsg) {
        let entry = self.entries.entry(msg.name.clone()).or_default();
        entry.name = msg.name.clone();
        entry.vn = msg.vn.clone();
        entry.device_type = msg.device_type;
        entry.vmi_type = msg.vmi_type;
        entry.logical_router_uuid = msg.logical_router_uuid;
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

// Handles a VMI update notification.
pub(crate) fn process_vmi_update(
    master: &mut Master,
    msg: VmiUpdateMsg,
) -> Result<(), Error> {
    master.vmis.update(&msg);

    // An unbound VN or a cleared LR UUID withdraws the VMI.
    if msg.vn.is_none() || msg.logical_router_uuid.is_none() {
        vmi_teardown(master, &msg.name);
        return Ok(());
    }

    if msg.device_type != VmiDeviceType::LogicalRouter
        || msg.vmi_type != VmiType::Router
    {
        return Ok(());
    }

    let Some(vn_name) = msg.vn.clone() else {
        return Ok(());
    };
    if master.vns.get(&vn_name).is_none() {
        return Err(Error::VnNotFound(vn_name));
    }

    // A rebind to another VN first withdraws the VMI from the old one.
    if let Some(state) = master.vmi_states.get(&msg.name) {
        if state.vn != vn_name {
            vmi_teardown(master, &msg.name);
        }
    }

    let lr_uuid = msg.logical_router_uuid;
    master
        .vmi_states
        .entry(msg.name.clone())
        .and_modify(|state| state.logical_router_uuid = lr_uuid)
        .or_insert_with(|| VmiState::new(vn_name.clone(), lr_uuid));

    // The VN may not have been visited yet; enter its notify path first so
    // the state slot exists before the VMI is recorded.
    vn::vn_notify(master, &vn_name);

    let changed = match master.vn_states.get_mut(&vn_name) {
        Some(vn_state) => vn_state.add_vmi(&msg.name, lr_uuid),
        None => false,
    };
    if changed {
        logical_router::bridge_vn_notify(master, &vn_name);
    }
    Ok(())
}

// Handles a VMI delete notification.
pub(crate) fn process_vmi_delete(master: &mut Master, name: &str) {
    master.vmis.mark_deleted(name);
    vmi_teardown(master, name);
}

// Withdraws a VMI from its recorded VN and drops its state.
fn vmi_teardown(master: &mut Master, name: &str) {
    let Some(state) = master.vmi_states.remove(name) else {
        return;
    };
    let vn_name = state.vn;
    let present = match master.vn_states.get_mut(&vn_name) {
        Some(vn_state) => vn_state.remove_vmi(name),
        None => false,
    };
    if present {
        logical_router::bridge_vn_notify(master, &vn_name);
    }
}
