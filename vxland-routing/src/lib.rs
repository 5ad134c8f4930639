//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod config;
pub mod error;
pub mod evpn;
mod ibus;
pub mod inet;
mod leak;
pub mod logical_router;
pub mod northbound;
mod subnet;
pub mod vmi;
pub mod vn;
pub mod vrf;
mod walk;

use std::collections::{BTreeMap, VecDeque};

use tokio::sync::mpsc;
use vxland_utils::ibus::{IbusMsg, IbusReceiver, IbusSender};

use crate::config::Config;
use crate::leak::RouteEvent;
use crate::logical_router::LogicalRouters;
use crate::vmi::{VmiState, Vmis};
use crate::vn::{VnState, Vns};
use crate::vrf::{VrfState, Vrfs};
use crate::walk::Walks;

pub struct Master {
    // Static configuration.
    pub config: Config,
    // Observed virtual networks.
    pub vns: Vns,
    // Observed VM interfaces.
    pub vmis: Vmis,
    // Observed VRFs and their route tables.
    pub vrfs: Vrfs,
    // Derived per-VN state.
    pub vn_states: BTreeMap<String, VnState>,
    // Derived per-VMI state.
    pub vmi_states: BTreeMap<String, VmiState>,
    // Derived per-VRF state.
    pub vrf_states: BTreeMap<String, VrfState>,
    // Logical-router map.
    pub routers: LogicalRouters,
    // Pending table walks.
    pub(crate) walks: Walks,
    // Pending route-table notifications.
    pub(crate) route_events: VecDeque<RouteEvent>,
}

// ===== impl Master =====

impl Master {
    pub fn new(config: Config) -> Master {
        Master {
            config,
            vns: Default::default(),
            vmis: Default::default(),
            vrfs: Default::default(),
            vn_states: Default::default(),
            vmi_states: Default::default(),
            vrf_states: Default::default(),
            routers: Default::default(),
            walks: Default::default(),
            route_events: Default::default(),
        }
    }

    // Processes one notification and runs the resulting reconciliation to
    // quiescence before the next notification is looked at.
    pub fn process_msg(&mut self, msg: IbusMsg) {
        if let Err(error) = ibus::process_msg(self, msg) {
            error.log();
        }
        walk::process_pending(self);
        self.sweep_deleted();
    }

    // Enqueues a route-table change for the reconciler. The controller's
    // own writes re-enter the reconciler through the same queue.
    pub(crate) fn notify_route_event(&mut self, event: RouteEvent) {
        self.route_events.push_back(event);
    }

    // Drops observed entries whose delete notification has been fully
    // processed, together with any remaining per-VRF tracker state.
    fn sweep_deleted(&mut self) {
        self.vrf_states.retain(|name, _| {
            self.vrfs.get(name).is_some_and(|vrf| !vrf.deleted)
        });
        self.vns.sweep();
        self.vmis.sweep();
        self.vrfs.sweep();
    }

    async fn run(&mut self, mut ibus_rx: IbusReceiver) {
        while let Some(msg) = ibus_rx.recv().await {
            self.process_msg(msg);
        }
    }
}

// ===== global functions =====

// Starts the VXLAN routing task.
pub fn start(config: Config) -> IbusSender {
    let (ibus_tx, ibus_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut master = Master::new(config);
        master.run(ibus_rx).await;
    });

    ibus_tx
}
