//! ICMP message parsing and construction (RFC 792), including the type-3
//! destination-unreachable layout with its quoted offending datagram.

use crate::error::{Result, RouterError};
use crate::wire::ipv4::internet_checksum;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

pub const CODE_NET_UNREACHABLE: u8 = 0;
pub const CODE_HOST_UNREACHABLE: u8 = 1;
pub const CODE_PORT_UNREACHABLE: u8 = 3;

pub const CODE_TTL_EXCEEDED_IN_TRANSIT: u8 = 0;

/// Plain ICMP header size (echo / time-exceeded): type, code, checksum,
/// then a 4-byte "rest of header".
const ICMP_HEADER_SIZE: usize = 8;

/// Number of payload bytes quoted into destination-unreachable /
/// time-exceeded messages, capped by the type-3 layout's 28-byte data
/// area (20-byte IP header + 8 bytes of the original payload).
const QUOTE_PAYLOAD_BYTES: usize = 8;

/// A parsed echo request/reply ICMP message.
#[derive(Debug)]
pub struct IcmpEcho<'a> {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

impl<'a> IcmpEcho<'a> {
    /// Parse an echo request/reply, verifying its checksum.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < ICMP_HEADER_SIZE {
            return Err(RouterError::FrameTooShort {
                len: data.len(),
                min: ICMP_HEADER_SIZE,
            });
        }
        if internet_checksum(data) != 0 {
            return Err(RouterError::InvalidChecksum);
        }

        Ok(IcmpEcho {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            identifier: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
            payload: &data[ICMP_HEADER_SIZE..],
        })
    }

    /// Build an echo reply mirroring this request's identifier, sequence
    /// and payload exactly.
    pub fn build_reply(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
        build_echo(ICMP_ECHO_REPLY, identifier, sequence, payload)
    }
}

fn build_echo(icmp_type: u8, identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(ICMP_HEADER_SIZE + payload.len());
    packet.push(icmp_type);
    packet.push(0);
    packet.extend_from_slice(&[0, 0]); // checksum placeholder
    packet.extend_from_slice(&identifier.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(payload);

    let checksum = internet_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

/// Build a time-exceeded (type 11, code 0) or destination-unreachable
/// (type 3, code 0/1/3) message quoting `offending_ip_header_and_payload`:
/// the offending packet's IP header followed by as much of its payload
/// as is available, truncated to [`QUOTE_PAYLOAD_BYTES`].
///
/// For type 3 the layout is: type, code, checksum, 2 unused bytes, 2-byte
/// next-hop MTU (unused, left zero), then the quote. For type 11 there is
/// no MTU field; the "rest of header" 4 bytes are all zero/unused.
pub fn build_error(icmp_type: u8, code: u8, offending_ip_header_and_payload: &[u8]) -> Vec<u8> {
    let quote_len = offending_ip_header_and_payload
        .len()
        .min(ip_header_len(offending_ip_header_and_payload) + QUOTE_PAYLOAD_BYTES);
    let quote = &offending_ip_header_and_payload[..quote_len];

    let mut packet = Vec::with_capacity(ICMP_HEADER_SIZE + quote.len());
    packet.push(icmp_type);
    packet.push(code);
    packet.extend_from_slice(&[0, 0]); // checksum placeholder
    packet.extend_from_slice(&[0, 0, 0, 0]); // unused / next-hop MTU, unused here
    packet.extend_from_slice(quote);

    let checksum = internet_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

fn ip_header_len(data: &[u8]) -> usize {
    if data.is_empty() {
        return 0;
    }
    ((data[0] & 0x0F) as usize * 4).min(data.len())
}
