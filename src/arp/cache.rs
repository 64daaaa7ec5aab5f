//! The ARP cache: a thread-safe monitor over IP→MAC entries and pending
//! resolution requests.
//!
//! Generalizes the teacher's `spin::Mutex<[ArpCacheEntry; N]>` (a fixed
//! array sized for a `no_std` kernel) to a growable, timestamped
//! structure behind a single `std::sync::Mutex`, matching the monitor
//! discipline spec.md §5 requires: the lock is held only for bookkeeping,
//! never across a send.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Entries expire 15 seconds after insertion.
pub const ENTRY_TTL: Duration = Duration::from_secs(15);

/// A pending request gives up after 5 failed attempts, one per second.
pub const MAX_ATTEMPTS: u32 = 5;
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Caps the queued-packet list per pending request so a slow-to-resolve
/// destination cannot grow memory without bound.
pub const MAX_QUEUED_PACKETS: usize = 100;

#[derive(Debug, Clone)]
struct ArpEntry {
    mac: [u8; 6],
    inserted_at: Instant,
}

impl ArpEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < ENTRY_TTL
    }
}

/// A frame waiting on ARP resolution: a complete Ethernet + IPv4 buffer
/// whose source MAC, TTL and IP checksum are already final. Only the
/// Ethernet destination needs patching once a MAC is known.
#[derive(Debug, Clone)]
pub struct QueuedPacket {
    pub frame: Vec<u8>,
    pub outgoing_iface: String,
}

/// An outstanding ARP resolution attempt and the packets waiting on it.
#[derive(Debug)]
pub struct PendingRequest {
    pub target_ip: Ipv4Addr,
    pub sent_count: u32,
    pub last_sent: Instant,
    pub queued: Vec<QueuedPacket>,
    pub outgoing_iface: String,
}

/// The ARP cache: entries plus pending requests, both behind one lock.
pub struct ArpCache {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: HashMap<Ipv4Addr, ArpEntry>,
    pending: HashMap<Ipv4Addr, PendingRequest>,
}

impl ArpCache {
    pub fn new() -> Self {
        ArpCache {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                pending: HashMap::new(),
            }),
        }
    }

    /// Returns a MAC only if a valid, unexpired entry exists.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<[u8; 6]> {
        let inner = self.inner.lock().unwrap();
        let entry = inner.entries.get(&ip)?;
        entry.is_valid(Instant::now()).then_some(entry.mac)
    }

    /// Record a learned (ip, mac) mapping. If a pending request for `ip`
    /// exists, it is removed from the cache and handed back to the
    /// caller, who now owns draining and destroying it. This is the
    /// only path by which a request transitions to RESOLVED; doing the
    /// removal under the same lock acquisition that records the mapping
    /// keeps a concurrent sweeper decision from racing with it.
    pub fn insert(&self, ip: Ipv4Addr, mac: [u8; 6]) -> Option<PendingRequest> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(
            ip,
            ArpEntry {
                mac,
                inserted_at: Instant::now(),
            },
        );
        inner.pending.remove(&ip)
    }

    /// Queue a frame awaiting resolution of `ip`, creating a new pending
    /// request if none exists yet. Returns whether this call created the
    /// request (the dispatcher uses this to decide whether to trigger an
    /// immediate first ARP request rather than waiting for the sweeper's
    /// first tick).
    pub fn queue(&self, ip: Ipv4Addr, frame: Vec<u8>, outgoing_iface: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.pending.get_mut(&ip) {
            Some(req) => {
                if req.queued.len() < MAX_QUEUED_PACKETS {
                    req.queued.push(QueuedPacket {
                        frame,
                        outgoing_iface: outgoing_iface.to_string(),
                    });
                }
                false
            }
            None => {
                // The caller (`forward::route_and_send`) sends the first
                // broadcast request itself right after this call returns
                // `true`, so the request starts at attempt 1, sent now.
                // Starting at attempt 0 with a backdated `last_sent` would
                // make the first sweep tick fire a second request
                // immediately, running the retry count to 6.
                inner.pending.insert(
                    ip,
                    PendingRequest {
                        target_ip: ip,
                        sent_count: 1,
                        last_sent: Instant::now(),
                        queued: vec![QueuedPacket {
                            frame,
                            outgoing_iface: outgoing_iface.to_string(),
                        }],
                        outgoing_iface: outgoing_iface.to_string(),
                    },
                );
                true
            }
        }
    }

    /// Sweep every pending request once. For each one whose last attempt
    /// is at least a second old: if it has exhausted its 5 attempts,
    /// remove and return it for host-unreachable synthesis; otherwise
    /// bump its attempt count and return the target IP + interface so
    /// the caller can emit a broadcast request, all without holding the
    /// lock across the send.
    pub fn sweep(&self) -> (Vec<PendingRequest>, Vec<(Ipv4Addr, String)>) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let mut expired = Vec::new();
        let mut to_retry = Vec::new();
        let mut dead_ips = Vec::new();

        for (ip, req) in inner.pending.iter_mut() {
            if now.duration_since(req.last_sent) < RETRY_INTERVAL {
                continue;
            }
            if req.sent_count >= MAX_ATTEMPTS {
                dead_ips.push(*ip);
            } else {
                req.sent_count += 1;
                req.last_sent = now;
                to_retry.push((*ip, req.outgoing_iface.clone()));
            }
        }

        for ip in dead_ips {
            if let Some(req) = inner.pending.remove(&ip) {
                expired.push(req);
            }
        }

        inner.entries.retain(|_, entry| entry.is_valid(now));

        (expired, to_retry)
    }

    /// Remove a pending request outright (used when the dispatcher
    /// itself destroys a request after draining it via [`ArpCache::insert`]'s
    /// return value; kept for symmetry and for tests that want to
    /// cancel a request directly).
    #[cfg(test)]
    fn destroy(&self, ip: Ipv4Addr) -> Option<PendingRequest> {
        self.inner.lock().unwrap().pending.remove(&ip)
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new()
    }
}
