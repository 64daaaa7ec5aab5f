//! The resolver loop: a dedicated thread that wakes once per second,
//! retries outstanding ARP requests, and gives up after five attempts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use crate::arp::cache::ArpCache;
use crate::forward;
use crate::iface::InterfaceTable;
use crate::icmp;
use crate::link::LinkLayer;
use crate::route::RoutingTable;

/// How often the sweeper wakes to check on pending requests.
const TICK: Duration = Duration::from_secs(1);

/// A handle to the background sweeper thread; dropping or calling
/// [`Sweeper::stop`] joins it.
pub struct Sweeper {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweeper thread, which holds references to the cache,
    /// the interface table, and anything that can transmit frames.
    pub fn spawn(
        cache: Arc<ArpCache>,
        interfaces: Arc<InterfaceTable>,
        routes: Arc<RoutingTable>,
        link: Arc<dyn LinkLayer>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(TICK);
                tick(&cache, &interfaces, &routes, link.as_ref());
            }
        });

        Sweeper {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// One sweeper tick: retry or expire every pending request whose last
/// attempt is at least a second old. Frames are collected under the
/// cache's lock and transmitted only after it releases, per spec §5.
pub fn tick(cache: &ArpCache, interfaces: &InterfaceTable, routes: &RoutingTable, link: &dyn LinkLayer) {
    let (expired, to_retry) = cache.sweep();

    for (target_ip, iface_name) in to_retry {
        if let Some(iface) = interfaces.by_name(&iface_name) {
            forward::send_arp_request_for(link, iface, target_ip);
        }
    }

    for request in expired {
        for queued in request.queued {
            emit_host_unreachable(cache, link, interfaces, routes, &queued.frame);
        }
    }
}

/// Synthesize and send a host-unreachable for one packet a pending
/// request gave up waiting on. Routed through [`forward::route_and_send`]
/// rather than sent directly, so the reply itself queues behind ARP
/// resolution like any other router-originated packet if the router
/// doesn't already have a cached MAC for the path back to the source
/// (spec §4.E: "the error travels the ordinary forwarding path").
fn emit_host_unreachable(
    cache: &ArpCache,
    link: &dyn LinkLayer,
    interfaces: &InterfaceTable,
    routes: &RoutingTable,
    offending_frame: &[u8],
) {
    match icmp::host_unreachable(interfaces, routes, offending_frame) {
        Some((dst_ip, ip_packet)) => {
            forward::route_and_send(interfaces, routes, cache, link, dst_ip, &ip_packet);
        }
        None => {
            warn!("ARP: could not synthesize host-unreachable for a queued packet");
        }
    }
}
