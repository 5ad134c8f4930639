//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::route::{EvpnRouteKey, Path, Peer};
use crate::{UnboundedReceiver, UnboundedSender};

// Useful type definition(s).
pub type IbusReceiver = UnboundedReceiver<IbusMsg>;
pub type IbusSender = UnboundedSender<IbusMsg>;

// Ibus message feeding the VXLAN routing task from the agent's observable
// tables.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum IbusMsg {
    // Virtual-network update notification.
    VnUpd(VnUpdateMsg),
    // Virtual-network delete notification.
    VnDel(String),
    // VM-interface update notification.
    VmiUpd(VmiUpdateMsg),
    // VM-interface delete notification.
    VmiDel(String),
    // VRF update notification.
    VrfUpd(VrfUpdateMsg),
    // VRF delete notification.
    VrfDel(String),
    // EVPN route path update.
    EvpnRouteUpd(EvpnRouteMsg),
    // EVPN route path delete.
    EvpnRouteDel(EvpnRouteKeyMsg),
    // IP-unicast route path update.
    InetRouteUpd(InetRouteMsg),
    // IP-unicast route path delete.
    InetRouteDel(InetRouteKeyMsg),
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct VnUpdateMsg {
    pub name: String,
    pub vxlan_routing_vn: bool,
    pub logical_router_uuid: Option<Uuid>,
    pub vrf: Option<String>,
    pub ipam: Vec<IpNetwork>,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct VmiUpdateMsg {
    pub name: String,
    pub vn: Option<String>,
    pub device_type: VmiDeviceType,
    pub vmi_type: VmiType,
    pub logical_router_uuid: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum VmiDeviceType {
    #[default]
    Instance,
    // Interface hosted on a logical router.
    LogicalRouter,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum VmiType {
    #[default]
    Instance,
    Router,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct VrfUpdateMsg {
    pub name: String,
    pub vn: Option<String>,
    pub vxlan_id: u32,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct EvpnRouteMsg {
    pub vrf: String,
    pub key: EvpnRouteKey,
    pub peer: Peer,
    pub path: Path,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct EvpnRouteKeyMsg {
    pub vrf: String,
    pub key: EvpnRouteKey,
    pub peer: Peer,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct InetRouteMsg {
    pub vrf: String,
    pub prefix: IpNetwork,
    pub peer: Peer,
    pub path: Path,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct InetRouteKeyMsg {
    pub vrf: String,
    pub prefix: IpNetwork,
    pub peer: Peer,
}
