//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use uuid::Uuid;
use vxland_routing::config::Config;
use vxland_routing::northbound;
use vxland_routing::Master;
use vxland_utils::ibus::{
    EvpnRouteKeyMsg, EvpnRouteMsg, IbusMsg, InetRouteKeyMsg, InetRouteMsg,
    VmiDeviceType, VmiType, VmiUpdateMsg, VnUpdateMsg, VrfUpdateMsg,
};
use vxland_utils::mac_addr::MacAddr;
use vxland_utils::route::{
    EvpnRouteKey, InterfaceNhFlags, Nexthop, Path, PathAttrs, Peer,
};

const LR1: u128 = 0x11;
const LR2: u128 = 0x22;

//
// Helper functions.
//

fn lr(id: u128) -> Uuid {
    Uuid::from_u128(id)
}

fn prefix(s: &str) -> IpNetwork {
    s.parse().unwrap()
}

fn master() -> Master {
    Master::new(Config::default())
}

fn send_vn(
    master: &mut Master,
    name: &str,
    routing: bool,
    lr_uuid: Option<Uuid>,
    vrf: Option<&str>,
    ipam: &[&str],
) {
    master.process_msg(IbusMsg::VnUpd(VnUpdateMsg {
        name: name.to_owned(),
        vxlan_routing_vn: routing,
        logical_router_uuid: lr_uuid,
        vrf: vrf.map(str::to_owned),
        ipam: ipam.iter().map(|p| p.parse().unwrap()).collect(),
    }));
}

fn send_vrf(master: &mut Master, name: &str, vn: Option<&str>, vxlan_id: u32) {
    master.process_msg(IbusMsg::VrfUpd(VrfUpdateMsg {
        name: name.to_owned(),
        vn: vn.map(str::to_owned),
        vxlan_id,
    }));
}

fn send_router_vmi(
    master: &mut Master,
    name: &str,
    vn: Option<&str>,
    lr_uuid: Option<Uuid>,
) {
    master.process_msg(IbusMsg::VmiUpd(VmiUpdateMsg {
        name: name.to_owned(),
        vn: vn.map(str::to_owned),
        device_type: VmiDeviceType::LogicalRouter,
        vmi_type: VmiType::Router,
        logical_router_uuid: lr_uuid,
    }));
}

fn type2_key(mac_last: u8, ip: &str) -> EvpnRouteKey {
    EvpnRouteKey::MacIp {
        mac: MacAddr::from([0x02, 0, 0, 0, 0, mac_last]),
        ip: ip.parse().unwrap(),
    }
}

fn type5_key(p: &str) -> EvpnRouteKey {
    EvpnRouteKey::Prefix(prefix(p))
}

// Type-2 row contributed by a local VM port.
fn send_type2(master: &mut Master, vrf: &str, mac_last: u8, ip: &str) {
    master.process_msg(IbusMsg::EvpnRouteUpd(EvpnRouteMsg {
        vrf: vrf.to_owned(),
        key: type2_key(mac_last, ip),
        peer: Peer::LocalVmPort,
        path: Path::new(
            Nexthop::Interface {
                ifindex: 7,
                flags: InterfaceNhFlags::empty(),
            },
            PathAttrs::default(),
            0,
            None,
        ),
    }));
}

// Type-5 row learned from the control node.
fn send_type5(master: &mut Master, vrf: &str, p: &str) {
    master.process_msg(IbusMsg::EvpnRouteUpd(EvpnRouteMsg {
        vrf: vrf.to_owned(),
        key: type5_key(p),
        peer: Peer::Bgp,
        path: Path::new(
            Nexthop::Tunnel {
                dest: "192.0.2.1".parse().unwrap(),
            },
            PathAttrs {
                preference: 200,
                ..Default::default()
            },
            5000,
            None,
        ),
    }));
}

// IP route contributed by a local VM port.
fn send_local_inet(master: &mut Master, vrf: &str, p: &str, ifindex: u32) {
    master.process_msg(IbusMsg::InetRouteUpd(InetRouteMsg {
        vrf: vrf.to_owned(),
        prefix: prefix(p),
        peer: Peer::LocalVmPort,
        path: Path::new(
            Nexthop::Interface {
                ifindex,
                flags: InterfaceNhFlags::empty(),
            },
            PathAttrs::default(),
            0,
            None,
        ),
    }));
}

fn inet_path<'a>(
    master: &'a Master,
    vrf: &str,
    p: &str,
    peer: Peer,
) -> Option<&'a Path> {
    master.vrfs.get(vrf)?.inet.get(&prefix(p))?.path(peer)
}

fn evpn_path<'a>(
    master: &'a Master,
    vrf: &str,
    key: &EvpnRouteKey,
    peer: Peer,
) -> Option<&'a Path> {
    master.vrfs.get(vrf)?.evpn.get(key)?.path(peer)
}

// Forwarding-relevant view of a VRF's IP tables, timestamps excluded.
type RouteSummary = Vec<(IpNetwork, Vec<(Peer, Nexthop, u32, Option<String>)>)>;

fn inet_summary(master: &Master, vrf: &str) -> RouteSummary {
    let vrf = master.vrfs.get(vrf).unwrap();
    vrf.inet
        .prefixes()
        .into_iter()
        .map(|p| {
            let route = vrf.inet.get(&p).unwrap();
            let paths = route
                .paths
                .iter()
                .map(|(peer, path)| {
                    (
                        *peer,
                        path.nexthop.clone(),
                        path.vxlan_id,
                        path.origin_vn.clone(),
                    )
                })
                .collect();
            (p, paths)
        })
        .collect()
}

fn evpn_summary(
    master: &Master,
    vrf: &str,
) -> Vec<(EvpnRouteKey, Vec<(Peer, Nexthop, u32)>)> {
    let vrf = master.vrfs.get(vrf).unwrap();
    vrf.evpn
        .routes
        .iter()
        .map(|(key, route)| {
            let paths = route
                .paths
                .iter()
                .map(|(peer, path)| (*peer, path.nexthop.clone(), path.vxlan_id))
                .collect();
            (key.clone(), paths)
        })
        .collect()
}

// No table may carry controller-installed paths.
fn assert_no_leaked_paths(master: &Master) {
    for vrf in master.vrfs.iter() {
        for p in vrf.inet.prefixes() {
            let route = vrf.inet.get(&p).unwrap();
            assert!(
                !route.paths.contains_key(&Peer::EvpnRouting),
                "leaked inet path left in {} at {}",
                vrf.name,
                p
            );
        }
        for (key, route) in &vrf.evpn.routes {
            assert!(
                !route.paths.contains_key(&Peer::LocalVmExport),
                "leaked type-5 left in {} at {:?}",
                vrf.name,
                key
            );
        }
    }
}

// Structural invariants of the LR map.
fn check_invariants(master: &Master) {
    for (uuid, entry) in master.routers.iter() {
        // An LR entry is kept only while it references something.
        assert!(
            entry.routing_vrf.is_some() || !entry.bridge_vns.is_empty(),
            "empty LR entry {} not released",
            uuid
        );
        // Reverse index agrees with the membership sets.
        for vn in &entry.bridge_vns {
            assert_eq!(master.routers.lr_of_vn(vn), Some(*uuid));
        }
        // A routing VRF implies a matching owner.
        if let Some(routing_vrf) = &entry.routing_vrf {
            let parent = entry.parent_vn.as_ref().expect("LR without owner");
            let parent_vrf =
                master.vns.get(parent).and_then(|vn| vn.vrf.as_ref());
            assert_eq!(parent_vrf, Some(routing_vrf));
        }
    }
}

// Two bridge VNs and one routing VN on the same logical router.
fn cold_attach() -> Master {
    let mut master = master();
    send_vrf(&mut master, "vrf-routing", Some("vn-routing"), 5000);
    send_vn(
        &mut master,
        "vn-routing",
        true,
        Some(lr(LR1)),
        Some("vrf-routing"),
        &[],
    );
    send_vn(
        &mut master,
        "vn-blue",
        false,
        None,
        Some("vrf-blue"),
        &["10.0.0.0/24", "2001:db8:0::/64"],
    );
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    send_router_vmi(&mut master, "vmi-blue", Some("vn-blue"), Some(lr(LR1)));
    send_vn(
        &mut master,
        "vn-red",
        false,
        None,
        Some("vrf-red"),
        &["10.0.1.0/24", "2001:db8:1::/64"],
    );
    send_vrf(&mut master, "vrf-red", Some("vn-red"), 102);
    send_router_vmi(&mut master, "vmi-red", Some("vn-red"), Some(lr(LR1)));
    master
}

//
// Test functions.
//

#[test]
fn cold_attach_builds_lr_and_subnet_routes() {
    let master = cold_attach();

    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.routing_vrf.as_deref(), Some("vrf-routing"));
    assert_eq!(entry.parent_vn.as_deref(), Some("vn-routing"));
    assert_eq!(entry.bridge_vns.len(), 2);
    assert!(entry.bridge_vns.contains("vn-blue"));
    assert!(entry.bridge_vns.contains("vn-red"));
    assert_eq!(master.routers.lr_of_vn("vn-blue"), Some(lr(LR1)));
    assert_eq!(master.routers.lr_of_vn("vn-red"), Some(lr(LR1)));

    // Peer subnets appear in each bridge, pointing at the routing VRF,
    // in both address families.
    for (vrf, peer_prefix) in [
        ("vrf-blue", "10.0.1.0/24"),
        ("vrf-blue", "2001:db8:1::/64"),
        ("vrf-red", "10.0.0.0/24"),
        ("vrf-red", "2001:db8:0::/64"),
    ] {
        let path =
            inet_path(&master, vrf, peer_prefix, Peer::EvpnRouting).unwrap();
        assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing"));
        assert_eq!(path.vxlan_id, 5000);
    }
    // A bridge never receives its own subnets.
    assert!(inet_path(&master, "vrf-blue", "10.0.0.0/24", Peer::EvpnRouting)
        .is_none());
    assert!(inet_path(&master, "vrf-red", "10.0.1.0/24", Peer::EvpnRouting)
        .is_none());

    check_invariants(&master);
}

#[test]
fn type2_leak_installs_host_route() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");

    let path =
        inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing"));
    assert_eq!(path.vxlan_id, 5000);
    check_invariants(&master);
}

#[test]
fn local_vm_route_leaks_as_type5() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);

    // The local route, once designated for routing, shows up as a Type-5
    // row in the routing VRF on the export peer, with the VXLAN routing
    // flag on the cloned interface next-hop.
    let path = evpn_path(
        &master,
        "vrf-routing",
        &type5_key("10.0.0.5/32"),
        Peer::LocalVmExport,
    )
    .unwrap();
    assert_eq!(
        path.nexthop,
        Nexthop::Interface {
            ifindex: 7,
            flags: InterfaceNhFlags::VXLAN_ROUTING,
        }
    );
    assert_eq!(path.vxlan_id, 5000);

    // The routing VRF mirrors the row in its own IP table, labeled with
    // the originating bridge VN.
    let path =
        inet_path(&master, "vrf-routing", "10.0.0.5/32", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.origin_vn.as_deref(), Some("vn-blue"));
    check_invariants(&master);
}

#[test]
fn local_path_removal_retracts_type5_leak() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);
    master.process_msg(IbusMsg::InetRouteDel(InetRouteKeyMsg {
        vrf: "vrf-blue".to_owned(),
        prefix: prefix("10.0.0.5/32"),
        peer: Peer::LocalVmPort,
    }));

    assert!(evpn_path(
        &master,
        "vrf-routing",
        &type5_key("10.0.0.5/32"),
        Peer::LocalVmExport
    )
    .is_none());
    assert!(inet_path(&master, "vrf-routing", "10.0.0.5/32", Peer::EvpnRouting)
        .is_none());
    // The host route survives; the MAC is still advertised.
    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
        .is_some());
}

#[test]
fn type2_withdraw_retracts_host_route_and_leak() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);
    master.process_msg(IbusMsg::EvpnRouteDel(EvpnRouteKeyMsg {
        vrf: "vrf-blue".to_owned(),
        key: type2_key(0xaa, "10.0.0.5"),
        peer: Peer::LocalVmPort,
    }));

    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
        .is_none());
    assert!(evpn_path(
        &master,
        "vrf-routing",
        &type5_key("10.0.0.5/32"),
        Peer::LocalVmExport
    )
    .is_none());
    assert!(inet_path(&master, "vrf-routing", "10.0.0.5/32", Peer::EvpnRouting)
        .is_none());
    // The local VM path itself is untouched.
    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::LocalVmPort)
        .is_some());
}

#[test]
fn type5_fanout_reaches_all_bridges() {
    let mut master = cold_attach();
    send_type5(&mut master, "vrf-routing", "10.0.2.0/24");

    for vrf in ["vrf-blue", "vrf-red"] {
        let path =
            inet_path(&master, vrf, "10.0.2.0/24", Peer::EvpnRouting).unwrap();
        assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing"));
        assert_eq!(path.vxlan_id, 5000);
    }

    // The routing VRF mirrors the prefix with the row's own next-hop; no
    // bridge originated it.
    let path =
        inet_path(&master, "vrf-routing", "10.0.2.0/24", Peer::EvpnRouting)
            .unwrap();
    assert!(path.nexthop.as_tunnel().is_some());
    assert_eq!(path.origin_vn, None);
    check_invariants(&master);
}

#[test]
fn type5_matching_a_bridge_subnet_records_origin() {
    let mut master = cold_attach();
    send_type5(&mut master, "vrf-routing", "10.0.0.0/24");

    // vrf-red carries 10.0.0.0/24 as a subnet route, so the lookup
    // resolves there; vn-blue's own table never contains its own subnet.
    let path =
        inet_path(&master, "vrf-routing", "10.0.0.0/24", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.origin_vn.as_deref(), Some("vn-red"));
}

#[test]
fn bridge_detach_retracts_routes() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_type5(&mut master, "vrf-routing", "10.0.2.0/24");

    // Clearing the VMI's LR UUID detaches vn-red.
    send_router_vmi(&mut master, "vmi-red", Some("vn-red"), None);

    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert!(!entry.bridge_vns.contains("vn-red"));
    assert_eq!(master.routers.lr_of_vn("vn-red"), None);

    // Everything the controller put into vrf-red is gone.
    let vrf = master.vrfs.get("vrf-red").unwrap();
    assert!(vrf.inet.prefixes().is_empty());
    // The peer loses the detached bridge's subnets, and only those.
    assert!(inet_path(&master, "vrf-blue", "10.0.1.0/24", Peer::EvpnRouting)
        .is_none());
    assert!(inet_path(&master, "vrf-blue", "2001:db8:1::/64", Peer::EvpnRouting)
        .is_none());
    assert!(inet_path(&master, "vrf-blue", "10.0.2.0/24", Peer::EvpnRouting)
        .is_some());
    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
        .is_some());
    check_invariants(&master);
}

#[test]
fn routing_vn_handoff_keeps_new_owner() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");

    // A second routing VN claims the same LR with its own VRF.
    send_vrf(&mut master, "vrf-routing2", Some("vn-routing2"), 5001);
    send_vn(
        &mut master,
        "vn-routing2",
        true,
        Some(lr(LR1)),
        Some("vrf-routing2"),
        &[],
    );

    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.parent_vn.as_deref(), Some("vn-routing2"));
    assert_eq!(entry.routing_vrf.as_deref(), Some("vrf-routing2"));

    // The bridges were rewalked against the new routing VRF.
    let path =
        inet_path(&master, "vrf-blue", "10.0.1.0/24", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing2"));
    assert_eq!(path.vxlan_id, 5001);
    let path =
        inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing2"));

    // The old owner's delete must not clear the handed-off LR.
    master.process_msg(IbusMsg::VnDel("vn-routing".to_owned()));
    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.parent_vn.as_deref(), Some("vn-routing2"));
    assert_eq!(entry.routing_vrf.as_deref(), Some("vrf-routing2"));
    check_invariants(&master);
}

#[test]
fn attach_detach_roundtrip_restores_tables() {
    let mut master = master();
    send_vrf(&mut master, "vrf-routing", Some("vn-routing"), 5000);
    send_vn(
        &mut master,
        "vn-routing",
        true,
        Some(lr(LR1)),
        Some("vrf-routing"),
        &[],
    );
    send_vn(
        &mut master,
        "vn-blue",
        false,
        None,
        Some("vrf-blue"),
        &["10.0.0.0/24"],
    );
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    send_router_vmi(&mut master, "vmi-blue", Some("vn-blue"), Some(lr(LR1)));
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);
    send_type5(&mut master, "vrf-routing", "10.0.2.0/24");

    let blue_before = inet_summary(&master, "vrf-blue");
    let routing_inet_before = inet_summary(&master, "vrf-routing");
    let routing_evpn_before = evpn_summary(&master, "vrf-routing");

    // Attach a second bridge, then tear it down completely.
    send_vn(
        &mut master,
        "vn-red",
        false,
        None,
        Some("vrf-red"),
        &["10.0.1.0/24"],
    );
    send_vrf(&mut master, "vrf-red", Some("vn-red"), 102);
    send_router_vmi(&mut master, "vmi-red", Some("vn-red"), Some(lr(LR1)));
    assert!(inet_path(&master, "vrf-blue", "10.0.1.0/24", Peer::EvpnRouting)
        .is_some());

    master.process_msg(IbusMsg::VmiDel("vmi-red".to_owned()));
    master.process_msg(IbusMsg::VnDel("vn-red".to_owned()));
    master.process_msg(IbusMsg::VrfDel("vrf-red".to_owned()));

    assert_eq!(inet_summary(&master, "vrf-blue"), blue_before);
    assert_eq!(inet_summary(&master, "vrf-routing"), routing_inet_before);
    assert_eq!(evpn_summary(&master, "vrf-routing"), routing_evpn_before);
    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.bridge_vns.len(), 1);
    assert!(entry.bridge_vns.contains("vn-blue"));
    check_invariants(&master);
}

#[test]
fn routing_vrf_clear_retracts_dependent_routes() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);
    send_type5(&mut master, "vrf-routing", "10.0.2.0/24");

    // The routing VN loses its VRF; the routing VRF itself goes next.
    send_vn(&mut master, "vn-routing", true, Some(lr(LR1)), None, &[]);
    master.process_msg(IbusMsg::VrfDel("vrf-routing".to_owned()));

    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.routing_vrf, None);
    assert_eq!(entry.parent_vn, None);
    assert_eq!(entry.bridge_vns.len(), 2);

    // Bridge VRFs keep only what the VMs themselves contributed.
    assert_no_leaked_paths(&master);
    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::LocalVmPort)
        .is_some());
    assert!(master
        .vrfs
        .get("vrf-blue")
        .unwrap()
        .evpn
        .get(&type2_key(0xaa, "10.0.0.5"))
        .is_some());
    check_invariants(&master);
}

#[test]
fn cold_teardown_releases_everything() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");
    send_local_inet(&mut master, "vrf-blue", "10.0.0.5/32", 7);
    send_type5(&mut master, "vrf-routing", "10.0.2.0/24");

    master.process_msg(IbusMsg::VmiDel("vmi-blue".to_owned()));
    master.process_msg(IbusMsg::VmiDel("vmi-red".to_owned()));
    master.process_msg(IbusMsg::VnDel("vn-blue".to_owned()));
    master.process_msg(IbusMsg::VnDel("vn-red".to_owned()));
    master.process_msg(IbusMsg::VnDel("vn-routing".to_owned()));

    assert!(master.routers.is_empty());
    assert!(master.vn_states.is_empty());
    assert!(master.vmi_states.is_empty());
    // Leaked bridge-side routes are gone; VM-contributed rows remain
    // until their tables go.
    for vrf in ["vrf-blue", "vrf-red"] {
        let vrf = master.vrfs.get(vrf).unwrap();
        for p in vrf.inet.prefixes() {
            let route = vrf.inet.get(&p).unwrap();
            assert!(!route.paths.contains_key(&Peer::EvpnRouting));
        }
    }
    assert!(evpn_path(
        &master,
        "vrf-routing",
        &type5_key("10.0.0.5/32"),
        Peer::LocalVmExport
    )
    .is_none());

    master.process_msg(IbusMsg::VrfDel("vrf-blue".to_owned()));
    master.process_msg(IbusMsg::VrfDel("vrf-red".to_owned()));
    master.process_msg(IbusMsg::VrfDel("vrf-routing".to_owned()));
    assert_eq!(master.vrfs.iter().count(), 0);
    assert!(master.vrf_states.is_empty());
}

#[test]
fn routing_vn_classification_is_sticky() {
    let mut master = cold_attach();

    // A flap clearing the flag must not demote the VN.
    send_vn(
        &mut master,
        "vn-routing",
        false,
        Some(lr(LR1)),
        Some("vrf-routing"),
        &[],
    );

    let entry = master.routers.get(&lr(LR1)).unwrap();
    assert_eq!(entry.parent_vn.as_deref(), Some("vn-routing"));
    assert_eq!(entry.routing_vrf.as_deref(), Some("vrf-routing"));
    check_invariants(&master);
}

#[test]
fn first_inserted_vmi_decides_lr() {
    let mut master = master();
    send_vn(&mut master, "vn-blue", false, None, Some("vrf-blue"), &[]);
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    send_router_vmi(&mut master, "vmi-1", Some("vn-blue"), Some(lr(LR1)));
    send_router_vmi(&mut master, "vmi-2", Some("vn-blue"), Some(lr(LR2)));

    // The first-inserted VMI wins; the second LR never materializes.
    assert_eq!(master.routers.lr_of_vn("vn-blue"), Some(lr(LR1)));
    assert!(master.routers.get(&lr(LR2)).is_none());

    // Dropping the first VMI hands the VN to the second LR, and the
    // now-empty first entry is released.
    master.process_msg(IbusMsg::VmiDel("vmi-1".to_owned()));
    assert_eq!(master.routers.lr_of_vn("vn-blue"), Some(lr(LR2)));
    assert!(master.routers.get(&lr(LR1)).is_none());
    assert!(master
        .routers
        .get(&lr(LR2))
        .unwrap()
        .bridge_vns
        .contains("vn-blue"));
    check_invariants(&master);
}

#[test]
fn fabric_vrfs_are_ignored() {
    let mut master = master();
    let fabric = master.config.fabric_vrf_name.clone();
    let fabric_policy = master.config.fabric_policy_vrf_name.clone();
    send_vrf(&mut master, &fabric, None, 0);
    send_vrf(&mut master, &fabric_policy, None, 0);

    assert!(master.vrfs.get(&fabric).is_none());
    assert!(master.vrfs.get(&fabric_policy).is_none());
    assert!(master.vrf_states.is_empty());
}

#[test]
fn non_router_vmis_are_ignored() {
    let mut master = master();
    send_vn(&mut master, "vn-blue", false, None, Some("vrf-blue"), &[]);
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    master.process_msg(IbusMsg::VmiUpd(VmiUpdateMsg {
        name: "vmi-vm".to_owned(),
        vn: Some("vn-blue".to_owned()),
        device_type: VmiDeviceType::Instance,
        vmi_type: VmiType::Instance,
        logical_router_uuid: Some(lr(LR1)),
    }));

    assert!(master.vmi_states.is_empty());
    assert!(master.routers.is_empty());
}

#[test]
fn unspecified_type2_ip_is_ignored() {
    let mut master = cold_attach();
    send_type2(&mut master, "vrf-blue", 0xaa, "0.0.0.0");

    assert!(master
        .vrfs
        .get("vrf-blue")
        .unwrap()
        .inet
        .get(&prefix("0.0.0.0/32"))
        .is_none());
}

#[test]
fn vmi_before_vn_is_deferred() {
    let mut master = master();

    // The VMI references a VN that has not been observed yet; the update
    // is dropped and retried by the publisher after the VN shows up.
    send_router_vmi(&mut master, "vmi-blue", Some("vn-blue"), Some(lr(LR1)));
    assert!(master.vmi_states.is_empty());

    send_vn(&mut master, "vn-blue", false, None, Some("vrf-blue"), &[]);
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    send_router_vmi(&mut master, "vmi-blue", Some("vn-blue"), Some(lr(LR1)));
    assert_eq!(master.routers.lr_of_vn("vn-blue"), Some(lr(LR1)));
    check_invariants(&master);
}

#[test]
fn late_routing_vn_reseeds_bridges() {
    let mut master = master();

    // Bridges come up and attach before any routing VN exists.
    send_vn(
        &mut master,
        "vn-blue",
        false,
        None,
        Some("vrf-blue"),
        &["10.0.0.0/24"],
    );
    send_vrf(&mut master, "vrf-blue", Some("vn-blue"), 101);
    send_router_vmi(&mut master, "vmi-blue", Some("vn-blue"), Some(lr(LR1)));
    send_vn(
        &mut master,
        "vn-red",
        false,
        None,
        Some("vrf-red"),
        &["10.0.1.0/24"],
    );
    send_vrf(&mut master, "vrf-red", Some("vn-red"), 102);
    send_router_vmi(&mut master, "vmi-red", Some("vn-red"), Some(lr(LR1)));
    send_type2(&mut master, "vrf-blue", 0xaa, "10.0.0.5");

    // No routing VRF yet, so nothing can be leaked.
    assert!(inet_path(&master, "vrf-blue", "10.0.1.0/24", Peer::EvpnRouting)
        .is_none());
    assert!(inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
        .is_none());

    // The routing VN arrives last and everything reconciles.
    send_vrf(&mut master, "vrf-routing", Some("vn-routing"), 5000);
    send_vn(
        &mut master,
        "vn-routing",
        true,
        Some(lr(LR1)),
        Some("vrf-routing"),
        &[],
    );
    assert!(inet_path(&master, "vrf-blue", "10.0.1.0/24", Peer::EvpnRouting)
        .is_some());
    assert!(inet_path(&master, "vrf-red", "10.0.0.0/24", Peer::EvpnRouting)
        .is_some());
    let path =
        inet_path(&master, "vrf-blue", "10.0.0.5/32", Peer::EvpnRouting)
            .unwrap();
    assert_eq!(path.nexthop.indirection_vrf(), Some("vrf-routing"));
    check_invariants(&master);
}

#[test]
fn operational_state_reports_lr_topology() {
    let master = cold_attach();

    let records = northbound::logical_routers(&master);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.uuid, lr(LR1));
    assert_eq!(record.routing_vrf.as_deref(), Some("vrf-routing"));
    assert_eq!(record.parent_vn.as_deref(), Some("vn-routing"));
    let bridges: Vec<_> = record
        .bridge_vns
        .iter()
        .map(|bridge| (bridge.vn.as_str(), bridge.vrf.as_deref()))
        .collect();
    assert_eq!(
        bridges,
        vec![("vn-blue", Some("vrf-blue")), ("vn-red", Some("vrf-red"))]
    );
}
