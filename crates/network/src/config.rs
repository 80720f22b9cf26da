//! # Zone Server Configuration
//!
//! Runtime options for the networking layer, derived from the loaded
//! configuration file.
//!
//! # Example
//!
//! ```rust
//! use mapgate_network::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig {
//!     bind_address: "127.0.0.1:5121".parse().unwrap(),
//!     tick_interval: Duration::from_millis(50),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::router::RouterConfig;
use mapgate_core::PacketVersion;
use mapgate_protocol::PacketKeys;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Networking options
///
/// # Default Values
///
/// - Port 5121 (standard map-server port)
/// - 1000 max connections
/// - 3 frames per connection per tick
/// - 50 ms tick
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address and port to bind the TCP listener to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Client revision the descriptor table and encoders are built for
    pub packet_version: PacketVersion,

    /// Opcode obfuscation keys; `None` disables obfuscation
    pub packet_keys: Option<PacketKeys>,

    /// Deliver party/guild traffic to spying sessions
    pub enable_spy: bool,

    /// Default area radius in cells
    pub area_size: u16,

    /// Frame budget per connection per tick
    pub max_frames_per_cycle: usize,

    /// Game loop period
    pub tick_interval: Duration,

    /// Hex-dump the buffer of a connection dropped for a protocol violation
    pub dump_invalid_packets: bool,

    /// Size of each socket read
    ///
    /// # Notes
    /// Must be at least 1024 bytes
    pub read_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let packet_version = PacketVersion::DEFAULT;
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5121)),
            max_connections: 1000,
            packet_version,
            packet_keys: PacketKeys::for_version(packet_version),
            enable_spy: false,
            area_size: 14,
            max_frames_per_cycle: 3,
            tick_interval: Duration::from_millis(50),
            dump_invalid_packets: false,
            read_buffer_size: 8192,
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    ///
    /// # Returns
    /// `Ok(())` if configuration is valid, `Err(String)` otherwise
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.area_size == 0 {
            return Err("area_size must be > 0".to_string());
        }

        if self.max_frames_per_cycle == 0 {
            return Err("max_frames_per_cycle must be > 0".to_string());
        }

        if self.tick_interval.is_zero() {
            return Err("tick_interval must be > 0".to_string());
        }

        if self.read_buffer_size < 1024 {
            return Err("read_buffer_size must be >= 1024".to_string());
        }

        if self.packet_keys.is_some_and(|k| k.is_zero()) {
            return Err("packet_keys must not be all zero".to_string());
        }

        if self.area_size <= mapgate_game::scope::CHAT_AREA_REDUCTION {
            tracing::warn!("area_size {} leaves no room for chat broadcasts", self.area_size);
        }

        Ok(())
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            area_size: self.area_size,
            enable_spy: self.enable_spy,
        }
    }
}
