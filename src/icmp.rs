//! The ICMP builder: composes echo replies and error messages with the
//! right source address and routes them back out through the ordinary
//! forwarding path, never generating an ICMP in response to another one.

use std::net::Ipv4Addr;

use crate::iface::InterfaceTable;
use crate::route::RoutingTable;
use crate::wire::ethernet::EthernetFrame;
use crate::wire::icmp::{
    self, CODE_HOST_UNREACHABLE, CODE_NET_UNREACHABLE, CODE_TTL_EXCEEDED_IN_TRANSIT,
    ICMP_TIME_EXCEEDED,
};
use crate::wire::ipv4::{Ipv4Packet, PROTOCOL_ICMP};

/// Build an echo reply IPv4 packet: source is the interface that
/// received the echo, destination is the original source, TTL restored
/// to 64 by [`Ipv4Packet::build`].
pub fn echo_reply(
    responding_iface_ip: Ipv4Addr,
    original_src: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    payload: &[u8],
) -> Vec<u8> {
    let icmp = icmp::IcmpEcho::build_reply(identifier, sequence, payload);
    Ipv4Packet::build(responding_iface_ip, original_src, PROTOCOL_ICMP, &icmp)
}

/// Does `offending` (a complete IP header + payload) look like something
/// we must never generate an ICMP error in response to: another ICMP
/// error, or a broadcast/multicast destination?
///
/// Non-initial fragments are excluded by construction: this router never
/// reassembles or forwards fragments (spec Non-goals), so every IPv4
/// packet it ever builds an error for is, by definition, unfragmented.
/// Is `dst_ip` a broadcast or multicast address: the limited broadcast
/// address, a 224.0.0.0/4 multicast address, or a configured subnet's
/// directed broadcast address?
fn is_broadcast_or_multicast(dst_ip: Ipv4Addr, routes: &RoutingTable) -> bool {
    if dst_ip == Ipv4Addr::BROADCAST {
        return true;
    }
    if dst_ip.octets()[0] & 0xF0 == 0xE0 {
        return true;
    }
    routes.is_subnet_broadcast(dst_ip)
}

fn must_not_error(offending: &Ipv4Packet, dst_is_broadcast_or_multicast: bool) -> bool {
    if dst_is_broadcast_or_multicast {
        return true;
    }
    if offending.protocol == PROTOCOL_ICMP {
        if let Ok(echo) = icmp::IcmpEcho::parse(offending.payload) {
            let is_error = matches!(
                echo.icmp_type,
                icmp::ICMP_DEST_UNREACHABLE | icmp::ICMP_TIME_EXCEEDED
            );
            return is_error;
        }
    }
    false
}

/// Pick the router's outgoing-interface IP to use as source for an ICMP
/// error responding to `offending`: the interface selected by routing
/// the error back toward the offending packet's source, not the
/// interface that received the offending packet.
fn error_source_ip(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending_src: Ipv4Addr,
) -> Option<Ipv4Addr> {
    if let Some(iface) = interfaces.by_ip(offending_src) {
        return Some(iface.ip);
    }
    let route = routes.lookup(offending_src)?;
    interfaces.by_name(&route.iface).map(|iface| iface.ip)
}

/// Build a time-exceeded or destination-unreachable error for `offending`
/// (the complete IP header + payload of the packet that triggered it),
/// or `None` if spec §4.E forbids generating one (error-on-error,
/// broadcast/multicast destination).
pub fn build_error(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending: &Ipv4Packet,
    offending_raw: &[u8],
    dst_is_broadcast_or_multicast: bool,
    icmp_type: u8,
    code: u8,
) -> Option<Vec<u8>> {
    if must_not_error(offending, dst_is_broadcast_or_multicast) {
        return None;
    }
    let src_ip = error_source_ip(interfaces, routes, offending.src_ip)?;
    let message = icmp::build_error(icmp_type, code, offending_raw);
    Some(Ipv4Packet::build(src_ip, offending.src_ip, PROTOCOL_ICMP, &message))
}

pub fn time_exceeded(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending: &Ipv4Packet,
    offending_raw: &[u8],
) -> Option<Vec<u8>> {
    build_error(
        interfaces,
        routes,
        offending,
        offending_raw,
        is_broadcast_or_multicast(offending.dst_ip, routes),
        ICMP_TIME_EXCEEDED,
        CODE_TTL_EXCEEDED_IN_TRANSIT,
    )
}

pub fn net_unreachable(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending: &Ipv4Packet,
    offending_raw: &[u8],
) -> Option<Vec<u8>> {
    build_error(
        interfaces,
        routes,
        offending,
        offending_raw,
        is_broadcast_or_multicast(offending.dst_ip, routes),
        icmp::ICMP_DEST_UNREACHABLE,
        CODE_NET_UNREACHABLE,
    )
}

pub fn port_unreachable(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending: &Ipv4Packet,
    offending_raw: &[u8],
) -> Option<Vec<u8>> {
    build_error(
        interfaces,
        routes,
        offending,
        offending_raw,
        is_broadcast_or_multicast(offending.dst_ip, routes),
        icmp::ICMP_DEST_UNREACHABLE,
        icmp::CODE_PORT_UNREACHABLE,
    )
}

/// Build the host-unreachable IP packet for one frame the resolver loop
/// gave up resolving, addressed to its embedded IP source (spec §4.D:
/// "synthesize ICMP error ... using its embedded IP source as
/// destination"). Returns the destination to route it toward plus the
/// built IP packet; the caller sends it through the same route-then-ARP
/// path as every other generated ICMP message (spec §4.E).
pub fn host_unreachable(
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending_frame: &[u8],
) -> Option<(Ipv4Addr, Vec<u8>)> {
    let eth = EthernetFrame::parse(offending_frame).ok()?;
    let offending = Ipv4Packet::parse(eth.payload).ok()?;

    let src_ip = error_source_ip(interfaces, routes, offending.src_ip)?;
    let message = icmp::build_error(
        icmp::ICMP_DEST_UNREACHABLE,
        CODE_HOST_UNREACHABLE,
        eth.payload,
    );
    let ip_packet = Ipv4Packet::build(src_ip, offending.src_ip, PROTOCOL_ICMP, &message);
    Some((offending.src_ip, ip_packet))
}
