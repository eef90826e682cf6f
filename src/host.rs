//! Host introspection for the probe
//!
//! Gathers the static identity card of the local machine (hostname, cpu
//! topology, network interfaces) and samples the memory and load gauges
//! the probe reports periodically.

use std::collections::BTreeMap;
use std::net::IpAddr;

use sysinfo::{Networks, System};
use tracing::trace;

use crate::events::{CpuInfo, InterfaceMap, NodeId, NodeInfo, Protocol, RamUsage, WorkLoad};

/// Hostnames longer than this are truncated before reporting.
pub const MAX_HOSTNAME_LEN: usize = 255;

/// The local hostname, truncated to [`MAX_HOSTNAME_LEN`] bytes on a
/// character boundary. Empty when the platform exposes none.
pub fn hostname() -> String {
    truncate_hostname(System::host_name().unwrap_or_default())
}

fn truncate_hostname(mut name: String) -> String {
    if name.len() > MAX_HOSTNAME_LEN {
        let mut cut = MAX_HOSTNAME_LEN;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

/// Gathers the identity card of the local host for `node`.
pub fn gather_node_info(node: NodeId) -> NodeInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    let cpu = sys
        .cpus()
        .iter()
        .map(|cpu| CpuInfo {
            source_node: node,
            num_cores: 1,
            mhz_per_core: cpu.frequency(),
        })
        .collect();

    NodeInfo {
        source_node: node,
        cpu,
        hostname: hostname(),
        os: System::long_os_version().unwrap_or_default(),
        interfaces: gather_interfaces(),
    }
}

fn gather_interfaces() -> InterfaceMap {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces = InterfaceMap::new();
    for (name, data) in networks.iter() {
        let mut entry = BTreeMap::new();
        entry.insert(Protocol::Ethernet, vec![data.mac_address().to_string()]);

        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        for ip in data.ip_networks() {
            match ip.addr {
                IpAddr::V4(addr) => v4.push(addr.to_string()),
                IpAddr::V6(addr) => v6.push(addr.to_string()),
            }
        }
        // Placeholder addresses keep both families present for consumers
        // that index by protocol.
        if v4.is_empty() {
            v4.push("0.0.0.0".to_string());
        }
        if v6.is_empty() {
            v6.push("::1".to_string());
        }
        entry.insert(Protocol::Ipv4, v4);
        entry.insert(Protocol::Ipv6, v6);
        interfaces.insert(name.clone(), entry);
    }
    interfaces
}

/// Reusable sampler for the periodic gauges. Keeping the [`System`]
/// around lets cpu usage be computed as a delta between samples.
pub struct HostSampler {
    sys: System,
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            sys: System::new_all(),
        }
    }

    /// Takes one sample of the memory and load gauges for `node`.
    pub fn sample(&mut self, node: NodeId, num_actors: u64) -> (RamUsage, WorkLoad) {
        self.sys.refresh_all();

        let in_use = self.sys.used_memory();
        let available = self.sys.total_memory().saturating_sub(in_use);

        let cpus = self.sys.cpus();
        let average = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };
        let cpu_load = average.clamp(0.0, 100.0).round() as u8;
        trace!(cpu_load, in_use, "host sample taken");

        (
            RamUsage {
                source_node: node,
                in_use,
                available,
            },
            WorkLoad {
                source_node: node,
                cpu_load,
                num_processes: self.sys.processes().len() as u64,
                num_actors,
            },
        )
    }
}
