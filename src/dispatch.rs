//! The dispatcher: classifies inbound frames, enforces the validation
//! ladder, and drives the IP and ARP state machines (spec §4.F).
//!
//! Holds no long-lived state of its own; it borrows the interface and
//! route tables read-only and shares the ARP cache with the resolver
//! loop.

use std::net::Ipv4Addr;
use std::sync::Arc;

use log::{debug, warn};

use crate::arp::cache::ArpCache;
use crate::forward;
use crate::iface::InterfaceTable;
use crate::icmp;
use crate::link::LinkLayer;
use crate::route::RoutingTable;
use crate::wire::arp::{ArpOp, ArpPacket};
use crate::wire::ethernet::{self, EthernetFrame, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use crate::wire::icmp::{IcmpEcho, ICMP_ECHO_REQUEST};
use crate::wire::ipv4::{self, Ipv4Packet, PROTOCOL_ICMP};

/// Offset of the IPv4 header within an untagged Ethernet frame.
const IP_HEADER_OFFSET: usize = ethernet::ETHERNET_HEADER_SIZE;

pub struct Dispatcher {
    interfaces: Arc<InterfaceTable>,
    routes: Arc<RoutingTable>,
    arp_cache: Arc<ArpCache>,
    link: Arc<dyn LinkLayer>,
}

impl Dispatcher {
    pub fn new(
        interfaces: Arc<InterfaceTable>,
        routes: Arc<RoutingTable>,
        arp_cache: Arc<ArpCache>,
        link: Arc<dyn LinkLayer>,
    ) -> Self {
        Dispatcher {
            interfaces,
            routes,
            arp_cache,
            link,
        }
    }

    /// Entry point: one call per received Ethernet frame.
    ///
    /// Every failure on the validation ladder is a silent drop, per
    /// spec §4.F / §7: nothing here ever panics or propagates an error
    /// to the caller.
    pub fn on_frame(&self, bytes: &[u8], incoming_iface_name: &str) {
        let Some(incoming_iface) = self.interfaces.by_name(incoming_iface_name) else {
            debug!("drop: unknown incoming interface {incoming_iface_name}");
            return;
        };

        let frame = match EthernetFrame::parse(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("drop: {e}");
                return;
            }
        };

        match frame.ethertype {
            ETHERTYPE_ARP => self.handle_arp(&frame, incoming_iface_name),
            ETHERTYPE_IPV4 => self.handle_ipv4(&frame, incoming_iface_name, incoming_iface.ip),
            other => debug!("drop: unsupported ethertype {other:#06x}"),
        }
    }

    fn handle_arp(&self, frame: &EthernetFrame, incoming_iface_name: &str) {
        let arp = match ArpPacket::parse(frame.payload) {
            Ok(arp) => arp,
            Err(e) => {
                debug!("drop: malformed ARP packet: {e}");
                return;
            }
        };

        match arp.op {
            ArpOp::Request => self.handle_arp_request(&arp, incoming_iface_name),
            ArpOp::Reply => self.handle_arp_reply(&arp),
        }
    }

    fn handle_arp_request(&self, arp: &ArpPacket, incoming_iface_name: &str) {
        let Some(iface) = self.interfaces.by_ip(arp.target_ip) else {
            // Not asking about one of our addresses; nothing to answer.
            return;
        };

        let reply = ArpPacket::build(
            ArpOp::Reply,
            iface.mac,
            iface.ip,
            arp.sender_mac,
            arp.sender_ip,
        );
        let frame = EthernetFrame::build(iface.mac, arp.sender_mac, ETHERTYPE_ARP, &reply);

        if let Err(e) = self.link.send_frame(incoming_iface_name, &frame) {
            warn!("ARP: failed to send reply on {incoming_iface_name}: {e}");
        }
    }

    fn handle_arp_reply(&self, arp: &ArpPacket) {
        if let Some(request) = self.arp_cache.insert(arp.sender_ip, arp.sender_mac) {
            for mut queued in request.queued {
                ethernet::patch_dst_mac(&mut queued.frame, arp.sender_mac);
                if let Err(e) = self.link.send_frame(&queued.outgoing_iface, &queued.frame) {
                    warn!(
                        "ARP: failed to flush queued packet on {}: {e}",
                        queued.outgoing_iface
                    );
                }
            }
        }
    }

    fn handle_ipv4(&self, frame: &EthernetFrame, incoming_iface_name: &str, _incoming_iface_ip: Ipv4Addr) {
        let ip = match Ipv4Packet::parse(frame.payload) {
            Ok(ip) => ip,
            Err(e) => {
                debug!("drop: malformed IPv4 packet: {e}");
                return;
            }
        };

        if ip.ttl <= 1 {
            self.emit_time_exceeded(&ip, frame.payload);
            return;
        }

        if let Some(local_iface) = self.interfaces.by_ip(ip.dst_ip) {
            self.handle_local_delivery(&ip, frame, local_iface.ip, incoming_iface_name);
            return;
        }

        self.forward(&ip, frame, incoming_iface_name);
    }

    fn handle_local_delivery(
        &self,
        ip: &Ipv4Packet,
        frame: &EthernetFrame,
        local_iface_ip: Ipv4Addr,
        incoming_iface_name: &str,
    ) {
        if ip.protocol == PROTOCOL_ICMP {
            if let Ok(echo) = IcmpEcho::parse(ip.payload) {
                if echo.icmp_type == ICMP_ECHO_REQUEST {
                    let reply = icmp::echo_reply(
                        local_iface_ip,
                        ip.src_ip,
                        echo.identifier,
                        echo.sequence,
                        echo.payload,
                    );
                    self.send_originated(&reply, incoming_iface_name, frame.src_mac);
                    return;
                }
            }
        }

        if let Some(error) =
            icmp::port_unreachable(&self.interfaces, &self.routes, ip, frame.payload)
        {
            self.send_originated(&error, incoming_iface_name, frame.src_mac);
        }
    }

    /// Send a locally-originated IP packet (echo reply or ICMP error)
    /// straight back to the sender we already have a live MAC for on
    /// this interface, rather than round-tripping it through the ARP
    /// cache for a peer we just heard from on the wire.
    fn send_originated(&self, ip_packet: &[u8], iface_name: &str, dst_mac: [u8; 6]) {
        let Some(iface) = self.interfaces.by_name(iface_name) else {
            return;
        };
        let frame = EthernetFrame::build(iface.mac, dst_mac, ETHERTYPE_IPV4, ip_packet);
        if let Err(e) = self.link.send_frame(iface_name, &frame) {
            warn!("IP: failed to send originated packet on {iface_name}: {e}");
        }
    }

    fn emit_time_exceeded(&self, ip: &Ipv4Packet, offending_raw: &[u8]) {
        if let Some(error) = icmp::time_exceeded(&self.interfaces, &self.routes, ip, offending_raw) {
            self.route_and_send(ip.src_ip, &error);
        }
    }

    fn forward(&self, ip: &Ipv4Packet, frame: &EthernetFrame, _incoming_iface_name: &str) {
        let Some(route) = self.routes.lookup(ip.dst_ip) else {
            if let Some(error) = icmp::net_unreachable(&self.interfaces, &self.routes, ip, frame.payload) {
                self.route_and_send(ip.src_ip, &error);
            }
            return;
        };

        let Some(out_iface) = self.interfaces.by_name(&route.iface) else {
            warn!("route to {} names unknown interface {}", ip.dst_ip, route.iface);
            return;
        };

        // Build a fresh outbound frame: a copy of the original, with a
        // placeholder Ethernet header the ARP path (or immediate send)
        // will fill in, and the IP header's TTL/checksum already final.
        let mut outbound =
            EthernetFrame::build(out_iface.mac, ethernet::ZERO_MAC, ETHERTYPE_IPV4, frame.payload);
        let new_ttl = ipv4::decrement_ttl_and_recompute_checksum(&mut outbound, IP_HEADER_OFFSET);

        if new_ttl == 0 {
            if let Some(error) = icmp::time_exceeded(&self.interfaces, &self.routes, ip, frame.payload) {
                self.route_and_send(ip.src_ip, &error);
            }
            return;
        }

        let next_hop = route.next_hop(ip.dst_ip);

        match self.arp_cache.lookup(next_hop) {
            Some(mac) => {
                ethernet::patch_dst_mac(&mut outbound, mac);
                if let Err(e) = self.link.send_frame(&out_iface.name, &outbound) {
                    warn!("IP: failed to forward on {}: {e}", out_iface.name);
                }
            }
            None => {
                let is_new = self.arp_cache.queue(next_hop, outbound, &out_iface.name);
                if is_new {
                    self.send_arp_request_for(out_iface, next_hop);
                }
            }
        }
    }

    fn send_arp_request_for(&self, out_iface: &crate::iface::Interface, target_ip: Ipv4Addr) {
        forward::send_arp_request_for(self.link.as_ref(), out_iface, target_ip);
    }

    /// Route a locally-generated IP packet (an ICMP error or reply)
    /// through the ordinary forwarding path, exactly as if it had
    /// arrived from the wire. This is how every ICMP error ultimately
    /// reaches the link layer (spec §4.E: "the error travels the
    /// ordinary forwarding path"). Shared with the resolver loop's
    /// host-unreachable path via [`forward::route_and_send`].
    fn route_and_send(&self, dst_ip: Ipv4Addr, ip_packet: &[u8]) {
        forward::route_and_send(
            &self.interfaces,
            &self.routes,
            &self.arp_cache,
            self.link.as_ref(),
            dst_ip,
            ip_packet,
        );
    }
}
