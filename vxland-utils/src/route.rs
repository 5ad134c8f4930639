//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use derive_new::new;
use enum_as_inner::EnumAsInner;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::ip::IpAddrExt;
use crate::mac_addr::MacAddr;

// Identity of the subsystem that installed a route path. The declaration
// order is the path-selection priority.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum Peer {
    // Routes contributed by local VM ports.
    LocalVmPort,
    // Type-5 routes exported from bridge VRFs into a routing VRF.
    LocalVmExport,
    // Routes learned from the control node.
    Bgp,
    // Routes leaked into bridge VRFs and routing-VRF IP tables.
    EvpnRouting,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct InterfaceNhFlags: u8 {
        const VXLAN_ROUTING = 0x01;
    }
}

bitflags! {
    // Header fields hashed for ECMP member selection.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct EcmpHashFields: u8 {
        const SRC_IP = 0x01;
        const DST_IP = 0x02;
        const IP_PROTOCOL = 0x04;
        const SRC_PORT = 0x08;
        const DST_PORT = 0x10;
    }
}

impl Default for EcmpHashFields {
    fn default() -> EcmpHashFields {
        EcmpHashFields::all()
    }
}

// Next-hop of an installed route.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, EnumAsInner)]
#[derive(Deserialize, Serialize)]
pub enum Nexthop {
    // Local interface next-hop.
    Interface {
        ifindex: u32,
        flags: InterfaceNhFlags,
    },
    // Reevaluate the lookup in the named VRF.
    Vrf {
        vrf_name: String,
    },
    // Overlay tunnel toward a remote VTEP.
    Tunnel {
        dest: IpAddr,
    },
}

// Attribute set carried on leaked routes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PathAttrs {
    pub sg_list: Vec<u32>,
    pub communities: Vec<String>,
    pub preference: u32,
    pub ecmp_fields: EcmpHashFields,
    pub tag_list: Vec<u32>,
    pub dest_vns: BTreeSet<String>,
}

// One peer's contribution to a route.
#[derive(Clone, Debug, new)]
#[derive(Deserialize, Serialize)]
pub struct Path {
    pub nexthop: Nexthop,
    pub attrs: PathAttrs,
    pub vxlan_id: u32,
    pub origin_vn: Option<String>,
    #[new(value = "Utc::now()")]
    pub last_updated: DateTime<Utc>,
}

// Key of an EVPN table row.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, EnumAsInner)]
#[derive(Deserialize, Serialize)]
pub enum EvpnRouteKey {
    // Type-2 MAC/IP advertisement.
    MacIp { mac: MacAddr, ip: IpAddr },
    // Type-5 IP prefix advertisement.
    Prefix(IpNetwork),
}

// ===== impl Nexthop =====

impl Nexthop {
    // Returns the VRF named by a VRF-indirection next-hop.
    pub fn indirection_vrf(&self) -> Option<&str> {
        match self {
            Nexthop::Vrf { vrf_name } => Some(vrf_name),
            _ => None,
        }
    }

    // Clones the next-hop with the VXLAN routing flag set. Type-5 leaks
    // built from local interface next-hops carry this flag.
    pub fn vxlan_routing(&self) -> Nexthop {
        match self {
            Nexthop::Interface { ifindex, flags } => Nexthop::Interface {
                ifindex: *ifindex,
                flags: *flags | InterfaceNhFlags::VXLAN_ROUTING,
            },
            nexthop => nexthop.clone(),
        }
    }
}

// ===== impl Path =====

impl Path {
    // Returns true when the path carries the same forwarding information.
    // The update timestamp is not part of the comparison.
    pub fn same_as(&self, other: &Path) -> bool {
        self.nexthop == other.nexthop
            && self.attrs == other.attrs
            && self.vxlan_id == other.vxlan_id
            && self.origin_vn == other.origin_vn
    }
}

// ===== impl EvpnRouteKey =====

impl EvpnRouteKey {
    // IP prefix advertised by the row. Type-2 rows advertise a host prefix.
    pub fn ip_prefix(&self) -> IpNetwork {
        match self {
            EvpnRouteKey::MacIp { ip, .. } => ip.to_host_prefix(),
            EvpnRouteKey::Prefix(prefix) => *prefix,
        }
    }
}
