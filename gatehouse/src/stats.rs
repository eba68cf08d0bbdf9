//! Host metrics and address discovery for the stats and status endpoints

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sysinfo::System;

/// Memory figures in bytes
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    /// Installed memory
    pub total: u64,
    /// Memory in use
    pub used: u64,
    /// Memory not in use
    pub free: u64,
}

/// CPU figures
#[derive(Debug, Clone, Serialize)]
pub struct CpuUsage {
    /// Logical CPU count
    pub count: usize,
    /// Global usage since the previous sample, in percent
    pub usage_percent: f32,
}

/// Load average over 1, 5 and 15 minutes
#[derive(Debug, Clone, Serialize)]
pub struct LoadAverage {
    /// 1-minute load
    pub one: f64,
    /// 5-minute load
    pub five: f64,
    /// 15-minute load
    pub fifteen: f64,
}

/// Basic host resource metrics
#[derive(Debug, Clone, Serialize)]
pub struct DeviceUsage {
    /// Memory
    pub memory: MemoryUsage,
    /// CPUs
    pub cpus: CpuUsage,
    /// Load average (zeros where the platform has none)
    pub load: LoadAverage,
}

/// Sampler over a long-lived `sysinfo::System`
///
/// CPU usage is a delta between refreshes, so the same `System` is kept for
/// the process lifetime.
pub struct HostMetrics {
    system: Mutex<System>,
}

impl HostMetrics {
    /// Create a sampler with an initial full refresh
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }

    /// Refresh and read the current figures
    pub fn sample(&self) -> DeviceUsage {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        system.refresh_cpu_usage();

        let load = System::load_average();
        DeviceUsage {
            memory: MemoryUsage {
                total: system.total_memory(),
                used: system.used_memory(),
                free: system.free_memory(),
            },
            cpus: CpuUsage {
                count: system.cpus().len(),
                usage_percent: system.global_cpu_usage(),
            },
            load: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
        }
    }
}

impl Default for HostMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// First non-loopback IPv4 address of this host
///
/// Asks the OS which local address would route to a public address. Connecting
/// a UDP socket sends nothing. Falls back to `127.0.0.1`.
pub fn host_address() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_loopback() && !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!(error = %e, "Host address probe failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_reports_memory_and_cpus() {
        let metrics = HostMetrics::new();
        let usage = metrics.sample();
        assert!(usage.memory.total >= usage.memory.used);
        assert!(usage.cpus.count >= 1);
    }

    #[test]
    fn test_host_address_is_ipv4() {
        assert!(host_address().is_ipv4());
    }

    #[test]
    fn test_device_usage_serializes() {
        let json = serde_json::to_value(HostMetrics::new().sample()).unwrap();
        assert!(json["memory"]["total"].is_u64());
        assert!(json["load"].get("fifteen").is_some());
    }
}
