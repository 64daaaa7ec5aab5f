//! ARP packet parsing and construction (RFC 826), restricted to the
//! Ethernet/IPv4 combination this router supports.

use std::net::Ipv4Addr;

use crate::error::{Result, RouterError};

pub const ARP_HTYPE_ETHERNET: u16 = 1;
pub const ARP_PTYPE_IPV4: u16 = 0x0800;

pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

/// Size of an Ethernet/IPv4 ARP packet.
pub const ARP_PACKET_SIZE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// A parsed ARP packet.
#[derive(Debug)]
pub struct ArpPacket {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub op: ArpOp,
    pub sender_mac: [u8; 6],
    pub sender_ip: Ipv4Addr,
    pub target_mac: [u8; 6],
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Parse an ARP packet, rejecting anything but Ethernet/IPv4.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ARP_PACKET_SIZE {
            return Err(RouterError::FrameTooShort {
                len: data.len(),
                min: ARP_PACKET_SIZE,
            });
        }

        let htype = u16::from_be_bytes([data[0], data[1]]);
        let ptype = u16::from_be_bytes([data[2], data[3]]);
        let hlen = data[4];
        let plen = data[5];
        let opcode = u16::from_be_bytes([data[6], data[7]]);

        if htype != ARP_HTYPE_ETHERNET {
            return Err(RouterError::UnsupportedArpHardware(htype));
        }
        if ptype != ARP_PTYPE_IPV4 || hlen != 6 || plen != 4 {
            return Err(RouterError::UnsupportedArpHardware(htype));
        }

        let op = match opcode {
            ARP_OP_REQUEST => ArpOp::Request,
            ARP_OP_REPLY => ArpOp::Reply,
            other => return Err(RouterError::UnsupportedEtherType(other)),
        };

        let sender_mac = data[8..14].try_into().unwrap();
        let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);
        let target_mac = data[18..24].try_into().unwrap();
        let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(ArpPacket {
            htype,
            ptype,
            hlen,
            plen,
            op,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    /// Build an ARP packet for the given operation.
    pub fn build(
        op: ArpOp,
        sender_mac: [u8; 6],
        sender_ip: Ipv4Addr,
        target_mac: [u8; 6],
        target_ip: Ipv4Addr,
    ) -> Vec<u8> {
        let opcode = match op {
            ArpOp::Request => ARP_OP_REQUEST,
            ArpOp::Reply => ARP_OP_REPLY,
        };

        let mut packet = Vec::with_capacity(ARP_PACKET_SIZE);
        packet.extend_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
        packet.extend_from_slice(&ARP_PTYPE_IPV4.to_be_bytes());
        packet.push(6);
        packet.push(4);
        packet.extend_from_slice(&opcode.to_be_bytes());
        packet.extend_from_slice(&sender_mac);
        packet.extend_from_slice(&sender_ip.octets());
        packet.extend_from_slice(&target_mac);
        packet.extend_from_slice(&target_ip.octets());
        packet
    }
}
