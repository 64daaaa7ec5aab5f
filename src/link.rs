//! Link-layer boundary: the host environment's framed-transmit primitive
//! and the inbound-frame callback contract (spec §6).

use crate::error::{Result, RouterError};

/// What the dispatcher needs from the link layer: a way to transmit a
/// complete Ethernet frame on a named interface.
///
/// The implementation must not retain the buffer past the call. Frames
/// queued behind a pending ARP request own their own copy precisely so
/// this boundary never needs to borrow past the call's return.
pub trait LinkLayer: Send + Sync {
    fn send_frame(&self, iface_name: &str, bytes: &[u8]) -> Result<()>;
}

/// An in-process [`LinkLayer`] backed by `crossbeam-channel`, used by the
/// test suite and by multi-router test topologies. Each named interface
/// gets its own outbound channel; nothing here touches a real NIC.
pub struct ChannelLink {
    senders: std::sync::Mutex<std::collections::HashMap<String, crossbeam_channel::Sender<Vec<u8>>>>,
}

impl ChannelLink {
    pub fn new() -> Self {
        ChannelLink {
            senders: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Register an interface, returning the receiving end of its
    /// outbound channel so a test can observe transmitted frames.
    pub fn register(&self, iface_name: &str) -> crossbeam_channel::Receiver<Vec<u8>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders
            .lock()
            .unwrap()
            .insert(iface_name.to_string(), tx);
        rx
    }
}

impl Default for ChannelLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkLayer for ChannelLink {
    fn send_frame(&self, iface_name: &str, bytes: &[u8]) -> Result<()> {
        let senders = self.senders.lock().unwrap();
        match senders.get(iface_name) {
            Some(tx) => tx.send(bytes.to_vec()).map_err(|_| RouterError::TransmitFailed {
                iface: iface_name.to_string(),
                reason: "receiver dropped".into(),
            }),
            None => Err(RouterError::UnknownInterface(iface_name.to_string())),
        }
    }
}
