//! Ethernet II frame parsing and construction.
//!
//! Implements the IEEE 802.3 Ethernet II frame format used by every
//! frame this router touches.

use crate::error::{Result, RouterError};

/// Ethernet header size (destination + source MAC + EtherType).
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// Broadcast MAC address.
pub const BROADCAST_MAC: [u8; 6] = [0xFF; 6];

/// All-zero MAC address, used as a placeholder destination while a frame
/// waits on ARP resolution.
pub const ZERO_MAC: [u8; 6] = [0; 6];

/// EtherType for IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// EtherType for ARP.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// A parsed Ethernet frame, borrowing its payload from the receive buffer.
#[derive(Debug)]
pub struct EthernetFrame<'a> {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ethertype: u16,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Parse an Ethernet frame from raw bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < ETHERNET_HEADER_SIZE {
            return Err(RouterError::FrameTooShort {
                len: data.len(),
                min: ETHERNET_HEADER_SIZE,
            });
        }

        let dst_mac = data[0..6].try_into().unwrap();
        let src_mac = data[6..12].try_into().unwrap();
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        Ok(EthernetFrame {
            dst_mac,
            src_mac,
            ethertype,
            payload: &data[ETHERNET_HEADER_SIZE..],
        })
    }

    /// Build a complete Ethernet frame around `payload`.
    pub fn build(src_mac: [u8; 6], dst_mac: [u8; 6], ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(ETHERNET_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&dst_mac);
        frame.extend_from_slice(&src_mac);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

/// Overwrite the destination MAC of an already-built frame in place.
///
/// Used to patch the placeholder [`ZERO_MAC`] destination of a queued
/// packet once ARP resolves, without rebuilding the whole frame.
pub fn patch_dst_mac(frame: &mut [u8], dst_mac: [u8; 6]) {
    if frame.len() >= 6 {
        frame[0..6].copy_from_slice(&dst_mac);
    }
}

pub fn is_broadcast(mac: &[u8; 6]) -> bool {
    *mac == BROADCAST_MAC
}

pub fn is_multicast(mac: &[u8; 6]) -> bool {
    mac[0] & 0x01 != 0
}
