//! Interface table: the router's own identity. Finite, fixed, and
//! immutable after startup.

use std::net::Ipv4Addr;

use serde::Deserialize;

/// One of the router's network interfaces.
#[derive(Debug, Clone, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(with = "mac_addr")]
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
}

/// The fixed set of interfaces this router owns, looked up by name or by
/// owned IP. All operations are total and O(#interfaces); there are
/// never enough interfaces for that to matter.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceTable {
    interfaces: Vec<Interface>,
}

impl InterfaceTable {
    pub fn new(interfaces: Vec<Interface>) -> Self {
        InterfaceTable { interfaces }
    }

    pub fn by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    pub fn by_ip(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.ip == ip)
    }

    pub fn list(&self) -> &[Interface] {
        &self.interfaces
    }
}

mod mac_addr {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 6], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for byte in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| serde::de::Error::custom("MAC address needs 6 octets"))?;
            *byte = u8::from_str_radix(part, 16).map_err(serde::de::Error::custom)?;
        }
        if parts.next().is_some() {
            return Err(serde::de::Error::custom("MAC address has extra octets"));
        }
        Ok(out)
    }
}
