use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors surfaced by the wire codecs and the link-layer boundary.
///
/// These never escape [`crate::dispatch::Dispatcher::on_frame`] as an
/// exception-style unwind: per the error taxonomy, every one of them
/// collapses to a silent drop, an ICMP error, or a log line at the point
/// of detection.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },

    #[error("unsupported ethertype {0:#06x}")]
    UnsupportedEtherType(u16),

    #[error("unsupported ARP hardware type {0}")]
    UnsupportedArpHardware(u16),

    #[error("not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    #[error("IPv4 header length {0} words is below the minimum of 5")]
    HeaderTooShort(u8),

    #[error("IPv4 total length {total} exceeds received length {received}")]
    TruncatedPacket { total: usize, received: usize },

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("unknown interface {0:?}")]
    UnknownInterface(String),

    #[error("no route to {0}")]
    NoRoute(Ipv4Addr),

    #[error("link transmit failed on {iface}: {reason}")]
    TransmitFailed { iface: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RouterError>;
