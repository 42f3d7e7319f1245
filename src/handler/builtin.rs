//! Stock handlers shipped with the application
//!
//! - `stream_system_memory`: physical memory snapshot in MB
//! - `stream_network_tcpdump`: simulated packet capture feed

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::HandlerRegistry;

/// Handler name of the memory snapshot stream
pub const SYSTEM_MEMORY: &str = "stream_system_memory";

/// Handler name of the simulated packet feed
pub const NETWORK_TCPDUMP: &str = "stream_network_tcpdump";

/// Number of packets kept in the packet feed's history
const RECENT_PACKETS: usize = 5;

/// Register every stock handler into `registry`
pub fn register_all(registry: &mut HandlerRegistry) {
    registry.register(SYSTEM_MEMORY, system_memory);

    let simulator = Arc::new(Mutex::new(PacketSimulator::default()));
    registry.register(NETWORK_TCPDUMP, move |_stream: &str| {
        // A poisoned lock only means another worker panicked mid-update;
        // the counters are still usable.
        let mut sim = simulator.lock().unwrap_or_else(|e| e.into_inner());
        sim.next_payload()
    });
}

fn error_payload(message: &str) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now().timestamp(),
        "error": message,
    })
    .to_string()
}

/// Memory figures in megabytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub timestamp: i64,
    pub total_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
    pub available_mb: u64,
    pub active_mb: u64,
    pub inactive_mb: u64,
    pub cached_mb: u64,
}

/// Parse the contents of `/proc/meminfo`
///
/// Returns `None` when `MemTotal` or `MemFree` is missing.
pub fn parse_meminfo(content: &str, timestamp: i64) -> Option<MemorySnapshot> {
    let field = |key: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            if name.trim() != key {
                return None;
            }
            // Values are reported in kB
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };
    let mb = |kb: u64| kb / 1024;

    let total = field("MemTotal")?;
    let free = field("MemFree")?;

    Some(MemorySnapshot {
        timestamp,
        total_mb: mb(total),
        used_mb: mb(total.saturating_sub(free)),
        free_mb: mb(free),
        available_mb: mb(field("MemAvailable").unwrap_or(free)),
        active_mb: mb(field("Active").unwrap_or(0)),
        inactive_mb: mb(field("Inactive").unwrap_or(0)),
        cached_mb: mb(field("Cached").unwrap_or(0)),
    })
}

/// `stream_system_memory` handler
pub fn system_memory(_stream_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();

    if !cfg!(target_os = "linux") {
        return error_payload("Memory monitoring not implemented for this platform");
    }

    let content = match std::fs::read_to_string("/proc/meminfo") {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read /proc/meminfo");
            return error_payload("Failed to get memory statistics");
        }
    };

    match parse_meminfo(&content, timestamp).map(|s| serde_json::to_string(&s)) {
        Some(Ok(json)) => json,
        _ => error_payload("Failed to get memory statistics"),
    }
}

/// One simulated packet
#[derive(Debug, Clone, Serialize)]
pub struct Packet {
    pub protocol: &'static str,
    pub src: String,
    pub dst: String,
    pub size: u32,
    pub time: i64,
}

#[derive(Serialize)]
struct PacketFeed<'a> {
    timestamp: i64,
    packet_count: u64,
    recent_packets: &'a VecDeque<Packet>,
}

/// Deterministic packet generator behind `stream_network_tcpdump`
#[derive(Debug, Default)]
pub struct PacketSimulator {
    packet_count: u64,
    recent: VecDeque<Packet>,
}

impl PacketSimulator {
    const PROTOCOLS: [&'static str; 5] = ["TCP", "UDP", "ICMP", "HTTP", "HTTPS"];
    const SOURCES: [&'static str; 5] = [
        "192.168.1.100",
        "10.0.0.15",
        "172.16.0.5",
        "127.0.0.1",
        "8.8.8.8",
    ];
    const DESTINATIONS: [&'static str; 5] = [
        "93.184.216.34",
        "142.250.191.14",
        "151.101.65.140",
        "192.168.1.1",
        "10.0.0.1",
    ];

    /// Total packets generated so far
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Packets currently in history, oldest first
    pub fn recent(&self) -> &VecDeque<Packet> {
        &self.recent
    }

    /// Generate the next packet and record it in the history
    pub fn next_packet(&mut self, now: i64) -> &Packet {
        self.packet_count += 1;
        let n = self.packet_count;
        let idx = (n % 5) as usize;

        let dst_port = match idx {
            3 => 80,
            4 => 443,
            _ => n % 65535,
        };

        let packet = Packet {
            protocol: Self::PROTOCOLS[idx],
            src: format!("{}:{}", Self::SOURCES[idx], 1024 + n % 40000),
            dst: format!("{}:{}", Self::DESTINATIONS[(idx + 1) % 5], dst_port),
            size: 64 + (n % 1400) as u32,
            time: now,
        };

        if self.recent.len() == RECENT_PACKETS {
            self.recent.pop_front();
        }
        self.recent.push_back(packet);
        &self.recent[self.recent.len() - 1]
    }

    /// Generate one packet and render the feed as JSON
    pub fn next_payload(&mut self) -> String {
        let now = chrono::Utc::now().timestamp();
        self.next_packet(now);

        let feed = PacketFeed {
            timestamp: now,
            packet_count: self.packet_count,
            recent_packets: &self.recent,
        };
        serde_json::to_string(&feed).unwrap_or_else(|_| error_payload("Failed to encode packets"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         4096000 kB
MemAvailable:    8192000 kB
Buffers:          102400 kB
Cached:          2048000 kB
Active:          6144000 kB
Inactive:        3072000 kB
";

    #[test]
    fn test_parse_meminfo() {
        let snapshot = parse_meminfo(MEMINFO, 42).unwrap();

        assert_eq!(snapshot.timestamp, 42);
        assert_eq!(snapshot.total_mb, 16000);
        assert_eq!(snapshot.free_mb, 4000);
        assert_eq!(snapshot.used_mb, 12000);
        assert_eq!(snapshot.available_mb, 8000);
        assert_eq!(snapshot.active_mb, 6000);
        assert_eq!(snapshot.inactive_mb, 3000);
        assert_eq!(snapshot.cached_mb, 2000);
    }

    #[test]
    fn test_parse_meminfo_missing_total() {
        assert!(parse_meminfo("MemFree: 10 kB\n", 0).is_none());
    }

    #[test]
    fn test_system_memory_has_timestamp() {
        let value: serde_json::Value = serde_json::from_str(&system_memory("mem")).unwrap();
        assert!(value["timestamp"].as_i64().is_some());
    }

    #[test]
    fn test_packet_sequence() {
        let mut sim = PacketSimulator::default();

        let first = sim.next_packet(100).clone();
        assert_eq!(first.protocol, "UDP");
        assert_eq!(first.src, "10.0.0.15:1025");
        assert_eq!(first.dst, "151.101.65.140:1");
        assert_eq!(first.size, 65);

        sim.next_packet(100);
        let third = sim.next_packet(100).clone();
        assert_eq!(third.protocol, "HTTP");
        assert_eq!(third.dst, "10.0.0.1:80");
    }

    #[test]
    fn test_packet_history_bounded() {
        let mut sim = PacketSimulator::default();
        for _ in 0..12 {
            sim.next_packet(0);
        }

        assert_eq!(sim.packet_count(), 12);
        assert_eq!(sim.recent().len(), RECENT_PACKETS);
        // Oldest retained packet is #8
        assert_eq!(sim.recent()[0].size, 64 + 8);
    }

    #[test]
    fn test_tcpdump_handler_payload() {
        let mut registry = HandlerRegistry::new();
        register_all(&mut registry);
        let handler = registry.lookup(NETWORK_TCPDUMP).unwrap();

        handler("tcpdump");
        let value: serde_json::Value = serde_json::from_str(&handler("tcpdump")).unwrap();

        assert_eq!(value["packet_count"], 2);
        assert_eq!(value["recent_packets"].as_array().unwrap().len(), 2);
    }
}
