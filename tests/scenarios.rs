//! Black-box scenarios S1-S6 from SPEC_FULL.md §3 (testable properties),
//! exercising the dispatcher, ARP cache, and resolver loop together
//! through the in-process `ChannelLink`, never touching a real NIC.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use ipv4_router::arp::ArpCache;
use ipv4_router::dispatch::Dispatcher;
use ipv4_router::iface::{Interface, InterfaceTable};
use ipv4_router::link::{ChannelLink, LinkLayer};
use ipv4_router::route::{Route, RoutingTable};
use ipv4_router::wire::arp::{ArpOp, ArpPacket};
use ipv4_router::wire::ethernet::{EthernetFrame, BROADCAST_MAC, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use ipv4_router::wire::icmp::{IcmpEcho, ICMP_ECHO_REPLY};
use ipv4_router::wire::ipv4::{Ipv4Packet, PROTOCOL_ICMP};
use ipv4_router::Router;

const ETH0_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x01];
const ETH1_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x02];
const HOST_MAC: [u8; 6] = [0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA];
const PEER_MAC: [u8; 6] = [0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB];

fn eth0() -> Interface {
    Interface {
        name: "eth0".into(),
        mac: ETH0_MAC,
        ip: Ipv4Addr::new(10, 0, 1, 1),
    }
}

fn eth1() -> Interface {
    Interface {
        name: "eth1".into(),
        mac: ETH1_MAC,
        ip: Ipv4Addr::new(10, 0, 2, 1),
    }
}

fn standard_interfaces() -> InterfaceTable {
    InterfaceTable::new(vec![eth0(), eth1()])
}

fn standard_routes() -> RoutingTable {
    RoutingTable::new(vec![
        Route {
            destination: Ipv4Addr::new(10, 0, 1, 0),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::UNSPECIFIED,
            iface: "eth0".into(),
        },
        Route {
            destination: Ipv4Addr::new(10, 0, 2, 0),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::UNSPECIFIED,
            iface: "eth1".into(),
        },
        Route {
            destination: Ipv4Addr::new(192, 168, 2, 0),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(10, 0, 2, 2),
            iface: "eth1".into(),
        },
    ])
}

/// S1: ARP request to router.
#[test]
fn s1_arp_request_to_router_gets_a_reply() {
    let interfaces = Arc::new(standard_interfaces());
    let routes = Arc::new(standard_routes());
    let cache = Arc::new(ArpCache::new());
    let link = Arc::new(ChannelLink::new());
    let rx = link.register("eth0");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();
    let dispatcher = Dispatcher::new(interfaces, routes, cache, link_dyn);

    let request = ArpPacket::build(
        ArpOp::Request,
        HOST_MAC,
        Ipv4Addr::new(10, 0, 1, 2),
        [0; 6],
        Ipv4Addr::new(10, 0, 1, 1),
    );
    let frame = EthernetFrame::build(HOST_MAC, BROADCAST_MAC, ETHERTYPE_ARP, &request);

    dispatcher.on_frame(&frame, "eth0");

    let sent = rx.recv_timeout(Duration::from_secs(1)).expect("a reply");
    let reply_eth = EthernetFrame::parse(&sent).unwrap();
    assert_eq!(reply_eth.dst_mac, HOST_MAC);
    assert_eq!(reply_eth.src_mac, ETH0_MAC);

    let reply_arp = ArpPacket::parse(reply_eth.payload).unwrap();
    assert_eq!(reply_arp.op, ArpOp::Reply);
    assert_eq!(reply_arp.sender_mac, ETH0_MAC);
    assert_eq!(reply_arp.sender_ip, Ipv4Addr::new(10, 0, 1, 1));
    assert_eq!(reply_arp.target_mac, HOST_MAC);
    assert_eq!(reply_arp.target_ip, Ipv4Addr::new(10, 0, 1, 2));
}

/// S2: echo to router.
#[test]
fn s2_echo_to_router_gets_an_echo_reply() {
    let interfaces = Arc::new(standard_interfaces());
    let routes = Arc::new(standard_routes());
    let cache = Arc::new(ArpCache::new());
    let link = Arc::new(ChannelLink::new());
    let rx = link.register("eth0");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();
    let dispatcher = Dispatcher::new(interfaces, routes, cache, link_dyn);

    let icmp = IcmpEcho::build_reply(0x1234, 1, b"hi"); // build_reply is just "build echo", type overwritten below
    let mut icmp = icmp;
    icmp[0] = 8; // ICMP_ECHO_REQUEST
    let checksum = ipv4_router::wire::ipv4::internet_checksum(&icmp);
    icmp[2..4].copy_from_slice(&checksum.to_be_bytes());

    let ip_packet = Ipv4Packet::build(
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(10, 0, 1, 1),
        PROTOCOL_ICMP,
        &icmp,
    );
    let frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_IPV4, &ip_packet);

    dispatcher.on_frame(&frame, "eth0");

    let sent = rx.recv_timeout(Duration::from_secs(1)).expect("an echo reply");
    let reply_eth = EthernetFrame::parse(&sent).unwrap();
    let reply_ip = Ipv4Packet::parse(reply_eth.payload).unwrap();
    assert_eq!(reply_ip.src_ip, Ipv4Addr::new(10, 0, 1, 1));
    assert_eq!(reply_ip.dst_ip, Ipv4Addr::new(10, 0, 1, 2));
    assert_eq!(reply_ip.ttl, 64);

    let reply_icmp = IcmpEcho::parse(reply_ip.payload).unwrap();
    assert_eq!(reply_icmp.icmp_type, ICMP_ECHO_REPLY);
    assert_eq!(reply_icmp.identifier, 0x1234);
    assert_eq!(reply_icmp.sequence, 1);
    assert_eq!(reply_icmp.payload, b"hi");
}

/// S3: forward with a cached ARP entry.
#[test]
fn s3_forward_with_cached_arp() {
    let interfaces = Arc::new(standard_interfaces());
    let routes = Arc::new(standard_routes());
    let cache = Arc::new(ArpCache::new());
    cache.insert(Ipv4Addr::new(10, 0, 2, 2), PEER_MAC);

    let link = Arc::new(ChannelLink::new());
    let rx = link.register("eth1");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();
    let dispatcher = Dispatcher::new(interfaces, routes, cache, link_dyn);

    let ip_packet = Ipv4Packet::build(
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(192, 168, 2, 5),
        PROTOCOL_ICMP,
        b"payload",
    );
    // Force a known starting TTL so we can assert the decrement.
    let mut ip_packet = ip_packet;
    ip_packet[8] = 10;
    ip_packet[10..12].copy_from_slice(&[0, 0]);
    let csum = ipv4_router::wire::ipv4::internet_checksum(&ip_packet[..20]);
    ip_packet[10..12].copy_from_slice(&csum.to_be_bytes());

    let frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_IPV4, &ip_packet);
    dispatcher.on_frame(&frame, "eth0");

    let sent = rx.recv_timeout(Duration::from_secs(1)).expect("a forwarded frame");
    let out_eth = EthernetFrame::parse(&sent).unwrap();
    assert_eq!(out_eth.src_mac, ETH1_MAC);
    assert_eq!(out_eth.dst_mac, PEER_MAC);

    let out_ip = Ipv4Packet::parse(out_eth.payload).unwrap();
    assert_eq!(out_ip.ttl, 9);
    assert_eq!(out_ip.payload, b"payload");
}

/// S4: forward with a cache miss, then an ARP reply arrives.
#[test]
fn s4_forward_with_cache_miss_then_reply_flushes_the_queue() {
    let interfaces = standard_interfaces();
    let routes = standard_routes();
    let link = Arc::new(ChannelLink::new());
    let eth1_rx = link.register("eth1");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();

    let router = Router::new(interfaces, routes, link_dyn);

    let ip_packet = Ipv4Packet::build(
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(192, 168, 2, 5),
        PROTOCOL_ICMP,
        b"payload",
    );
    let frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_IPV4, &ip_packet);
    router.on_frame(&frame, "eth0");

    // Expect a broadcast ARP request for the gateway on eth1.
    let arp_request_bytes = eth1_rx.recv_timeout(Duration::from_secs(1)).expect("an ARP request");
    let req_eth = EthernetFrame::parse(&arp_request_bytes).unwrap();
    assert_eq!(req_eth.dst_mac, BROADCAST_MAC);
    let req_arp = ArpPacket::parse(req_eth.payload).unwrap();
    assert_eq!(req_arp.op, ArpOp::Request);
    assert_eq!(req_arp.target_ip, Ipv4Addr::new(10, 0, 2, 2));

    // Now deliver the ARP reply.
    let reply = ArpPacket::build(
        ArpOp::Reply,
        PEER_MAC,
        Ipv4Addr::new(10, 0, 2, 2),
        ETH1_MAC,
        Ipv4Addr::new(10, 0, 2, 1),
    );
    let reply_frame = EthernetFrame::build(PEER_MAC, ETH1_MAC, ETHERTYPE_ARP, &reply);
    router.on_frame(&reply_frame, "eth1");

    let flushed = eth1_rx.recv_timeout(Duration::from_secs(1)).expect("the queued packet");
    let flushed_eth = EthernetFrame::parse(&flushed).unwrap();
    assert_eq!(flushed_eth.dst_mac, PEER_MAC);
    let flushed_ip = Ipv4Packet::parse(flushed_eth.payload).unwrap();
    assert_eq!(flushed_ip.ttl, 63);
    assert_eq!(flushed_ip.payload, b"payload");
}

/// S5: ARP timeout, five retries over ~5s, then a host-unreachable.
///
/// Real time, generous margins, per SPEC_FULL's test-tooling section;
/// this test takes a little over five seconds to run.
#[test]
fn s5_arp_timeout_emits_host_unreachable() {
    let interfaces = standard_interfaces();
    let routes = standard_routes();
    let link = Arc::new(ChannelLink::new());
    let eth0_rx = link.register("eth0");
    let eth1_rx = link.register("eth1");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();

    let router = Router::new(interfaces, routes, link_dyn);

    let ip_packet = Ipv4Packet::build(
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(192, 168, 2, 5),
        PROTOCOL_ICMP,
        b"payload",
    );
    let frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_IPV4, &ip_packet);
    router.on_frame(&frame, "eth0");

    let mut arp_request_count = 0;
    for _ in 0..5 {
        if eth1_rx.recv_timeout(Duration::from_millis(1500)).is_ok() {
            arp_request_count += 1;
        }
    }
    assert_eq!(arp_request_count, 5);
    // Confirm there's no 6th request left queued behind the fifth: the
    // dispatcher's own immediate attempt plus the sweeper's four retries
    // (2..=5) must be the whole retry budget, not five sweeper retries on
    // top of an uncounted first send.
    assert!(
        eth1_rx.recv_timeout(Duration::from_millis(1500)).is_err(),
        "a 6th ARP request was sent; retry count is off by one"
    );

    // The host-unreachable travels the ordinary forwarding path (spec
    // §4.E), which means it queues behind its own ARP resolution toward
    // 10.0.1.2 on eth0 exactly like any other router-originated packet
    // with no cached neighbor MAC: expect a broadcast request first.
    let unreachable_arp_request = eth0_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("a broadcast ARP request for the host-unreachable's own destination");
    let req_eth = EthernetFrame::parse(&unreachable_arp_request).unwrap();
    assert_eq!(req_eth.dst_mac, BROADCAST_MAC);
    let req_arp = ArpPacket::parse(req_eth.payload).unwrap();
    assert_eq!(req_arp.op, ArpOp::Request);
    assert_eq!(req_arp.target_ip, Ipv4Addr::new(10, 0, 1, 2));

    // Resolve it, and the host-unreachable itself is flushed from the
    // queue with a real destination MAC, not a placeholder.
    let reply = ArpPacket::build(
        ArpOp::Reply,
        HOST_MAC,
        Ipv4Addr::new(10, 0, 1, 2),
        ETH0_MAC,
        Ipv4Addr::new(10, 0, 1, 1),
    );
    let reply_frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_ARP, &reply);
    router.on_frame(&reply_frame, "eth0");

    let unreachable = eth0_rx
        .recv_timeout(Duration::from_secs(1))
        .expect("a host-unreachable message");
    let eth = EthernetFrame::parse(&unreachable).unwrap();
    assert_eq!(eth.dst_mac, HOST_MAC);
    let ip = Ipv4Packet::parse(eth.payload).unwrap();
    assert_eq!(ip.dst_ip, Ipv4Addr::new(10, 0, 1, 2));
    assert_eq!(ip.protocol, PROTOCOL_ICMP);

    let icmp_type = ip.payload[0];
    let icmp_code = ip.payload[1];
    assert_eq!(icmp_type, ipv4_router::wire::icmp::ICMP_DEST_UNREACHABLE);
    assert_eq!(icmp_code, ipv4_router::wire::icmp::CODE_HOST_UNREACHABLE);
}

/// S6: TTL expiry in transit.
#[test]
fn s6_ttl_expiry_in_transit_emits_time_exceeded_and_does_not_forward() {
    let interfaces = Arc::new(standard_interfaces());
    let routes = Arc::new(standard_routes());
    let cache = Arc::new(ArpCache::new());
    cache.insert(Ipv4Addr::new(10, 0, 2, 2), PEER_MAC);
    // The router already has this host's MAC (e.g. from an earlier
    // exchange) so the time-exceeded reply, routed back through the
    // ordinary forwarding path, doesn't itself need to wait on ARP.
    cache.insert(Ipv4Addr::new(10, 0, 1, 2), HOST_MAC);

    let link = Arc::new(ChannelLink::new());
    let eth0_rx = link.register("eth0");
    let eth1_rx = link.register("eth1");
    let link_dyn: Arc<dyn LinkLayer> = link.clone();
    let dispatcher = Dispatcher::new(interfaces, routes, cache, link_dyn);

    let mut ip_packet = Ipv4Packet::build(
        Ipv4Addr::new(10, 0, 1, 2),
        Ipv4Addr::new(192, 168, 2, 5),
        PROTOCOL_ICMP,
        b"payload",
    );
    ip_packet[8] = 1; // TTL = 1
    ip_packet[10..12].copy_from_slice(&[0, 0]);
    let csum = ipv4_router::wire::ipv4::internet_checksum(&ip_packet[..20]);
    ip_packet[10..12].copy_from_slice(&csum.to_be_bytes());

    let frame = EthernetFrame::build(HOST_MAC, ETH0_MAC, ETHERTYPE_IPV4, &ip_packet);
    dispatcher.on_frame(&frame, "eth0");

    let error_frame = eth0_rx.recv_timeout(Duration::from_secs(1)).expect("a time-exceeded message");
    let eth = EthernetFrame::parse(&error_frame).unwrap();
    let ip = Ipv4Packet::parse(eth.payload).unwrap();
    assert_eq!(ip.dst_ip, Ipv4Addr::new(10, 0, 1, 2));
    assert_eq!(ip.payload[0], ipv4_router::wire::icmp::ICMP_TIME_EXCEEDED);

    assert!(eth1_rx.try_recv().is_err(), "the expired packet must not be forwarded");
}
