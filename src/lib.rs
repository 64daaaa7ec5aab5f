//! Forwarding plane of a simple IPv4 software router.
//!
//! Receives complete Ethernet frames on named interfaces, classifies
//! them, and for each one either consumes it locally (ARP, ICMP echo),
//! forwards it toward its destination, or generates an ICMP error back
//! toward the source. See `SPEC_FULL.md` for the full design.

pub mod arp;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod iface;
pub mod icmp;
pub mod link;
pub mod route;
pub mod wire;

use std::sync::Arc;

use arp::{ArpCache, Sweeper};
use dispatch::Dispatcher;
use iface::InterfaceTable;
use link::LinkLayer;
use route::RoutingTable;

/// Ties the core components together: the dispatcher's read-only tables,
/// the shared ARP cache, and the resolver loop's background thread.
///
/// Dropping a `Router` stops its sweeper thread.
pub struct Router {
    dispatcher: Dispatcher,
    _sweeper: Sweeper,
}

impl Router {
    pub fn new(interfaces: InterfaceTable, routes: RoutingTable, link: Arc<dyn LinkLayer>) -> Self {
        let interfaces = Arc::new(interfaces);
        let routes = Arc::new(routes);
        let cache = Arc::new(ArpCache::new());

        let sweeper = Sweeper::spawn(cache.clone(), interfaces.clone(), routes.clone(), link.clone());
        let dispatcher = Dispatcher::new(interfaces, routes, cache, link);

        Router {
            dispatcher,
            _sweeper: sweeper,
        }
    }

    /// The callback the link layer invokes once per received frame.
    pub fn on_frame(&self, bytes: &[u8], incoming_iface_name: &str) {
        self.dispatcher.on_frame(bytes, incoming_iface_name);
    }
}
