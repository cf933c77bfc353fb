// Canonical scan result shape shared by every tool

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Port state as reported by a tool
///
/// Adapters only report open ports today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    #[serde(rename = "portid")]
    pub port_id: String,
    pub state: PortState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub host: String,
    pub ports: Vec<PortEntry>,
}

/// `{ hosts: [ { host, ports: [ { portid, state } ] } ] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub hosts: Vec<HostEntry>,
}

impl ScanReport {
    pub fn host(&self, address: &str) -> Option<&HostEntry> {
        self.hosts.iter().find(|h| h.host == address)
    }

    /// True when no address appears twice and no host repeats a port
    pub fn is_normalized(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.hosts.iter().all(|h| {
            let mut ports = std::collections::HashSet::new();
            seen.insert(h.host.as_str()) && h.ports.iter().all(|p| ports.insert(&p.port_id))
        })
    }
}

/// Accumulates tool findings into a normalized [`ScanReport`]
///
/// Hosts are deduplicated by address and keep first-seen order; a host may
/// end up with no ports (discovery-only results).
#[derive(Debug, Default)]
pub struct ScanReportBuilder {
    hosts: Vec<HostEntry>,
    index: HashMap<String, usize>,
}

impl ScanReportBuilder {
    pub fn add_host(&mut self, address: &str) -> &mut Self {
        self.entry(address);
        self
    }

    pub fn add_open_port(&mut self, address: &str, port_id: impl Into<String>) -> &mut Self {
        let port_id = port_id.into();
        let host = self.entry(address);
        if !host.ports.iter().any(|p| p.port_id == port_id) {
            host.ports.push(PortEntry {
                port_id,
                state: PortState::Open,
            });
        }
        self
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn build(self) -> ScanReport {
        ScanReport { hosts: self.hosts }
    }

    fn entry(&mut self, address: &str) -> &mut HostEntry {
        let idx = match self.index.get(address) {
            Some(&idx) => idx,
            None => {
                self.hosts.push(HostEntry {
                    host: address.to_string(),
                    ports: Vec::new(),
                });
                self.index.insert(address.to_string(), self.hosts.len() - 1);
                self.hosts.len() - 1
            }
        };
        &mut self.hosts[idx]
    }
}
