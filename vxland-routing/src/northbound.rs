//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Serialize;
use uuid::Uuid;

use crate::Master;

// Operational view of one logical router, one record per LR.
#[derive(Debug, Serialize)]
pub struct LogicalRouterState {
    pub uuid: Uuid,
    pub routing_vrf: Option<String>,
    pub parent_vn: Option<String>,
    pub bridge_vns: Vec<BridgeVnState>,
}

#[derive(Debug, Serialize)]
pub struct BridgeVnState {
    pub vn: String,
    pub vrf: Option<String>,
}

// ===== global functions =====

// Builds the operational records answering a logical-router state query.
pub fn logical_routers(master: &Master) -> Vec<LogicalRouterState> {
    master
        .routers
        .iter()
        .map(|(uuid, lr)| LogicalRouterState {
            uuid: *uuid,
            routing_vrf: lr.routing_vrf.clone(),
            parent_vn: lr.parent_vn.clone(),
            bridge_vns: lr
                .bridge_vns
                .iter()
                .map(|vn_name| BridgeVnState {
                    vn: vn_name.clone(),
                    vrf: master
                        .vns
                        .get(vn_name)
                        .and_then(|vn| vn.vrf.clone()),
                })
                .collect(),
        })
        .collect()
}
