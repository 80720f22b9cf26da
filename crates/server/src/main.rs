//! mapgate - zone server binary
//!
//! Loads `map_server.conf`, installs the bundled handlers and runs the zone
//! until Ctrl-C.

mod handlers;

use anyhow::Context;
use clap::Parser;
use handlers::SpawnPoint;
use mapgate_config::{PacketKeysSetting, ZoneConfig};
use mapgate_network::{HandlerRegistry, NetworkConfig, ZoneServer};
use mapgate_protocol::PacketKeys;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mapgate", version, about = "Map-server protocol front end")]
struct Args {
    /// Configuration file (defaults to conf/map_server.conf)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn network_config(zone: &ZoneConfig) -> NetworkConfig {
    let packet_keys = match zone.packet_keys {
        PacketKeysSetting::Default => PacketKeys::for_version(zone.packet_version),
        PacketKeysSetting::Custom(k0, k1, k2) => Some(PacketKeys::new(k0, k1, k2)),
    };

    NetworkConfig {
        bind_address: zone.bind_address(),
        max_connections: zone.max_connections,
        packet_version: zone.packet_version,
        packet_keys,
        enable_spy: zone.enable_spy,
        area_size: zone.area_size,
        max_frames_per_cycle: zone.max_frames_per_cycle,
        tick_interval: Duration::from_millis(zone.tick_interval_ms),
        dump_invalid_packets: zone.dump_invalid_packets,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("mapgate {} starting up", env!("CARGO_PKG_VERSION"));

    let zone = match &args.config {
        Some(path) => ZoneConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ZoneConfig::load_default().context("loading default configuration")?,
    };
    zone.display();

    let mut registry = HandlerRegistry::new();
    handlers::register_all(
        &mut registry,
        SpawnPoint {
            map: zone.start_map,
            pos: zone.start_position(),
        },
    );

    let server = ZoneServer::new(network_config(&zone), &registry)
        .await
        .context("starting zone server")?;
    info!("Ready, waiting for players on {}", server.local_addr()?);

    server.run().await?;
    info!("Zone server shut down");
    Ok(())
}
