//! Static startup configuration: the interface list and routing table,
//! both loaded once and immutable for the lifetime of the process.

use std::path::Path;

use serde::Deserialize;

use crate::iface::{Interface, InterfaceTable};
use crate::route::{Route, RoutingTable};

#[derive(Debug, Deserialize)]
pub struct RouterConfig {
    pub interfaces: Vec<Interface>,
    pub routes: Vec<Route>,
}

impl RouterConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RouterConfig = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    pub fn into_tables(self) -> (InterfaceTable, RoutingTable) {
        (
            InterfaceTable::new(self.interfaces),
            RoutingTable::new(self.routes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_yaml_config() {
        let yaml = r#"
interfaces:
  - name: eth0
    mac: "00:11:22:33:44:01"
    ip: 10.0.1.1
routes:
  - destination: 192.168.2.0
    netmask: 255.255.255.0
    gateway: 10.0.2.2
    iface: eth1
"#;
        let config: RouterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.interfaces.len(), 1);
        assert_eq!(config.interfaces[0].mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x01]);
        assert_eq!(config.routes.len(), 1);
    }
}
