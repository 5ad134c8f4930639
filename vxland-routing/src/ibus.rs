//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use vxland_utils::ibus::IbusMsg;
use vxland_utils::ip::IpNetworkExt;
use vxland_utils::route::EvpnRouteKey;

use crate::error::Error;
use crate::evpn::PathDelete;
use crate::leak::RouteEvent;
use crate::{vmi, vn, vrf, Master};

// ===== global functions =====

// Processes one ibus message.
pub(crate) fn process_msg(
    master: &mut Master,
    msg: IbusMsg,
) -> Result<(), Error> {
    match msg {
        // Virtual-network update notification.
        IbusMsg::VnUpd(msg) => {
            vn::process_vn_update(master, msg);
        }
        // Virtual-network delete notification.
        IbusMsg::VnDel(name) => {
            vn::process_vn_delete(master, &name);
        }
        // VM-interface update notification.
        IbusMsg::VmiUpd(msg) => {
            vmi::process_vmi_update(master, msg)?;
        }
        // VM-interface delete notification.
        IbusMsg::VmiDel(name) => {
            vmi::process_vmi_delete(master, &name);
        }
        // VRF update notification.
        IbusMsg::VrfUpd(msg) => {
            vrf::process_vrf_update(master, msg);
        }
        // VRF delete notification.
        IbusMsg::VrfDel(name) => {
            vrf::process_vrf_delete(master, &name);
        }
        // EVPN route path update.
        IbusMsg::EvpnRouteUpd(msg) => {
            let key = normalize_evpn_key(msg.key);
            let vrf = master
                .vrfs
                .get_mut(&msg.vrf)
                .ok_or_else(|| Error::VrfNotFound(msg.vrf.clone()))?;
            if vrf.evpn.add_path(key.clone(), msg.peer, msg.path) {
                master.notify_route_event(RouteEvent::EvpnUpd {
                    vrf: msg.vrf,
                    key,
                });
            }
        }
        // EVPN route path delete.
        IbusMsg::EvpnRouteDel(msg) => {
            let key = normalize_evpn_key(msg.key);
            let vrf = master
                .vrfs
                .get_mut(&msg.vrf)
                .ok_or_else(|| Error::VrfNotFound(msg.vrf.clone()))?;
            match vrf.evpn.delete_path(&key, msg.peer) {
                PathDelete::Unchanged => (),
                PathDelete::PathRemoved => {
                    master.notify_route_event(RouteEvent::EvpnUpd {
                        vrf: msg.vrf,
                        key,
                    });
                }
                PathDelete::RouteRemoved(_) => {
                    master.notify_route_event(RouteEvent::EvpnDel {
                        vrf: msg.vrf,
                        key,
                    });
                }
            }
        }
        // IP-unicast route path update.
        IbusMsg::InetRouteUpd(msg) => {
            let prefix = msg.prefix.apply_mask();
            let vrf = master
                .vrfs
                .get_mut(&msg.vrf)
                .ok_or_else(|| Error::VrfNotFound(msg.vrf.clone()))?;
            if vrf.inet.add_path(prefix, msg.peer, msg.path) {
                master.notify_route_event(RouteEvent::InetUpd {
                    vrf: msg.vrf,
                    prefix,
                });
            }
        }
        // IP-unicast route path delete.
        IbusMsg::InetRouteDel(msg) => {
            let prefix = msg.prefix.apply_mask();
            let vrf = master
                .vrfs
                .get_mut(&msg.vrf)
                .ok_or_else(|| Error::VrfNotFound(msg.vrf.clone()))?;
            match vrf.inet.delete_path(&prefix, msg.peer) {
                PathDelete::Unchanged => (),
                PathDelete::PathRemoved => {
                    master.notify_route_event(RouteEvent::InetUpd {
                        vrf: msg.vrf,
                        prefix,
                    });
                }
                PathDelete::RouteRemoved(route) => {
                    master.notify_route_event(RouteEvent::InetDel {
                        vrf: msg.vrf,
                        prefix,
                        route,
                    });
                }
            }
        }
    }

    Ok(())
}

// ===== helper functions =====

// Type-5 keys are stored masked, like any other prefix.
fn normalize_evpn_key(key: EvpnRouteKey) -> EvpnRouteKey {
    match key {
        EvpnRouteKey::Prefix(prefix) => {
            EvpnRouteKey::Prefix(prefix.apply_mask())
        }
        key => key,
    }
}
