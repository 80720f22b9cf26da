//! mapgate Configuration Management
//!
//! Loads the zone server options from `conf/map_server.conf`.
//!
//! The file is a list of `key: value` lines. Blank lines and lines starting
//! with `//` are skipped, unknown keys are ignored and a value that fails to
//! parse leaves the default in place.

use mapgate_core::{MapGateError, MapId, PacketVersion, Result, TilePosition};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Default configuration path, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "conf/map_server.conf";

/// Opcode obfuscation keys as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKeysSetting {
    /// Keys shipped with the configured client revision
    Default,
    /// Explicit `k0,k1,k2`
    Custom(u32, u32, u32),
}

/// Zone server options
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    // ========== Network ==========
    /// Interface to bind (from "bind_ip")
    pub bind_ip: IpAddr,
    /// Listener port (from "map_port", default: 5121)
    pub map_port: u16,
    /// Maximum concurrent connections (from "max_connections")
    pub max_connections: usize,

    // ========== Protocol ==========
    /// Client revision (from "packet_version", YYYYMMDD)
    pub packet_version: PacketVersion,
    /// Obfuscation keys (from "packet_keys")
    pub packet_keys: PacketKeysSetting,
    /// Hex-dump buffers of connections dropped for bad frames
    pub dump_invalid_packets: bool,

    // ========== Broadcast ==========
    /// Party/guild spying (from "enable_spy")
    pub enable_spy: bool,
    /// Area radius in cells (from "area_size")
    pub area_size: u16,

    // ========== Game loop ==========
    /// Frames handled per connection per tick
    pub max_frames_per_cycle: usize,
    /// Tick length in milliseconds
    pub tick_interval_ms: u64,

    // ========== Spawn ==========
    pub start_map: MapId,
    pub start_x: i16,
    pub start_y: i16,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            map_port: 5121,
            max_connections: 1000,
            packet_version: PacketVersion::DEFAULT,
            packet_keys: PacketKeysSetting::Default,
            dump_invalid_packets: false,
            enable_spy: false,
            area_size: 14,
            max_frames_per_cycle: 3,
            tick_interval_ms: 50,
            start_map: MapId::new(1),
            start_x: 53,
            start_y: 111,
        }
    }
}

impl ZoneConfig {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| MapGateError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&content))
    }

    /// Load `conf/map_server.conf`, falling back to defaults when it is absent
    pub fn load_default() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)
        } else {
            tracing::warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Ok(Self::default())
        }
    }

    /// Parse config file content
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                config.parse_option(key.trim(), value.trim());
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "bind_ip" => match value.parse() {
                Ok(ip) => self.bind_ip = ip,
                Err(_) => tracing::warn!("Invalid bind_ip '{}', keeping {}", value, self.bind_ip),
            },
            "map_port" => {
                self.map_port = value.parse().unwrap_or(self.map_port);
            }
            "max_connections" => {
                self.max_connections = value.parse().unwrap_or(self.max_connections);
            }
            "packet_version" => {
                if let Ok(date) = value.parse() {
                    self.packet_version = PacketVersion::new(date);
                }
            }
            "packet_keys" => match parse_packet_keys(value) {
                Some(keys) => self.packet_keys = keys,
                None => tracing::warn!("Invalid packet_keys '{}', expected 'k0,k1,k2' or 'default'", value),
            },
            "dump_invalid_packets" => {
                self.dump_invalid_packets = parse_switch(value).unwrap_or(self.dump_invalid_packets);
            }
            "enable_spy" => {
                self.enable_spy = parse_switch(value).unwrap_or(self.enable_spy);
            }
            "area_size" => {
                self.area_size = value.parse().unwrap_or(self.area_size);
            }
            "max_frames_per_cycle" => {
                self.max_frames_per_cycle = value.parse().unwrap_or(self.max_frames_per_cycle);
            }
            "tick_interval" => {
                self.tick_interval_ms = value.parse().unwrap_or(self.tick_interval_ms);
            }
            "start_map" => {
                if let Ok(id) = value.parse() {
                    self.start_map = MapId::new(id);
                }
            }
            "start_x" => {
                self.start_x = value.parse().unwrap_or(self.start_x);
            }
            "start_y" => {
                self.start_y = value.parse().unwrap_or(self.start_y);
            }
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Socket address for the TCP listener
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.map_port)
    }

    pub fn start_position(&self) -> TilePosition {
        TilePosition::new(self.start_x, self.start_y)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Zone configuration:");
        tracing::info!("  Bind: {}", self.bind_address());
        tracing::info!("  Max connections: {}", self.max_connections);
        tracing::info!("  Packet version: {}", self.packet_version);
        match self.packet_keys {
            PacketKeysSetting::Default => tracing::info!("  Packet keys: default"),
            PacketKeysSetting::Custom(k0, k1, k2) => {
                tracing::info!("  Packet keys: 0x{:08X}, 0x{:08X}, 0x{:08X}", k0, k1, k2)
            }
        }
        tracing::info!("  Area size: {} cells", self.area_size);
        tracing::info!("  Spying: {}", if self.enable_spy { "on" } else { "off" });
        tracing::info!("  Tick: {} ms, {} frames per connection", self.tick_interval_ms, self.max_frames_per_cycle);
        tracing::info!("  Spawn: map {} @ ({}, {})", self.start_map, self.start_x, self.start_y);
    }
}

/// `yes`/`no`, `on`/`off`, `true`/`false` or a number
fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "on" | "true" => Some(true),
        "no" | "off" | "false" => Some(false),
        other => parse_number(other).map(|n| n != 0),
    }
}

/// Unsigned number with C-style radix prefix (`0x` hex, leading `0` octal)
fn parse_number(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if value.len() > 1 && value.starts_with('0') {
        u32::from_str_radix(&value[1..], 8).ok()
    } else {
        value.parse().ok()
    }
}

fn parse_packet_keys(value: &str) -> Option<PacketKeysSetting> {
    if value.eq_ignore_ascii_case("default") {
        return Some(PacketKeysSetting::Default);
    }

    let keys: Vec<u32> = value
        .split(',')
        .map(parse_number)
        .collect::<Option<_>>()?;

    match keys.as_slice() {
        &[k0, k1, k2] => Some(PacketKeysSetting::Custom(k0, k1, k2)),
        _ => None,
    }
}
