//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Deserialize;

// Static configuration of the VXLAN routing task.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Name of the fabric VRF, which is never tracked.
    pub fabric_vrf_name: String,
    // Name of the fabric policy VRF, which is never tracked.
    pub fabric_policy_vrf_name: String,
}

// ===== impl Config =====

impl Default for Config {
    fn default() -> Config {
        Config {
            fabric_vrf_name:
                "default-domain:default-project:ip-fabric:__default__"
                    .to_owned(),
            fabric_policy_vrf_name:
                "default-domain:default-project:ip-fabric:ip-fabric"
                    .to_owned(),
        }
    }
}
