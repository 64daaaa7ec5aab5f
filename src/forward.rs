//! The "route a locally-generated IP packet back out" path shared by the
//! dispatcher (ICMP errors and replies it builds while handling a frame)
//! and the resolver loop (host-unreachable on ARP timeout). Per spec
//! §4.E: "After composition, the error travels the ordinary forwarding
//! path."
//!
//! Pulled out of `dispatch.rs` so the sweeper doesn't have to duplicate
//! (and risk drifting from) the dispatcher's own route-then-ARP logic.

use std::net::Ipv4Addr;

use log::{debug, warn};

use crate::arp::cache::ArpCache;
use crate::iface::{Interface, InterfaceTable};
use crate::link::LinkLayer;
use crate::route::RoutingTable;
use crate::wire::arp::{ArpOp, ArpPacket};
use crate::wire::ethernet::{self, EthernetFrame, ETHERTYPE_ARP, ETHERTYPE_IPV4};

/// Route a locally-generated IP packet (an ICMP error or echo reply)
/// toward `dst_ip` exactly as if it were an ordinary forwarded packet:
/// look up the route, resolve the next hop's MAC (queuing behind a
/// pending ARP request on a miss), and transmit.
pub fn route_and_send(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    arp_cache: &ArpCache,
    link: &dyn LinkLayer,
    dst_ip: Ipv4Addr,
    ip_packet: &[u8],
) {
    let Some(route) = routes.lookup(dst_ip) else {
        debug!("drop: no route to deliver locally-generated packet to {dst_ip}");
        return;
    };
    let Some(out_iface) = interfaces.by_name(&route.iface) else {
        return;
    };

    let mut outbound =
        EthernetFrame::build(out_iface.mac, ethernet::ZERO_MAC, ETHERTYPE_IPV4, ip_packet);
    let next_hop = route.next_hop(dst_ip);

    match arp_cache.lookup(next_hop) {
        Some(mac) => {
            ethernet::patch_dst_mac(&mut outbound, mac);
            if let Err(e) = link.send_frame(&out_iface.name, &outbound) {
                warn!(
                    "IP: failed to send locally-generated packet on {}: {e}",
                    out_iface.name
                );
            }
        }
        None => {
            let is_new = arp_cache.queue(next_hop, outbound, &out_iface.name);
            if is_new {
                send_arp_request_for(link, out_iface, next_hop);
            }
        }
    }
}

/// Broadcast an ARP request for `target_ip` out `out_iface`, the same
/// request shape used for both the dispatcher's first attempt and the
/// sweeper's retries.
pub fn send_arp_request_for(link: &dyn LinkLayer, out_iface: &Interface, target_ip: Ipv4Addr) {
    let arp = ArpPacket::build(
        ArpOp::Request,
        out_iface.mac,
        out_iface.ip,
        ethernet::ZERO_MAC,
        target_ip,
    );
    let frame = EthernetFrame::build(out_iface.mac, ethernet::BROADCAST_MAC, ETHERTYPE_ARP, &arp);
    if let Err(e) = link.send_frame(&out_iface.name, &frame) {
        warn!("ARP: failed to send request on {}: {e}", out_iface.name);
    }
}
