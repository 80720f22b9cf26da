//! # Zone Server
//!
//! Tokio transport around the synchronous game loop.
//!
//! # Architecture
//!
//! ## Components
//!
//! 1. **TCP Listener** - Accepts incoming connections
//! 2. **Socket tasks** - One reader and one writer task per connection
//! 3. **Event channel** - Readers forward bytes and disconnects to the game loop
//! 4. **Connection map** - `DashMap` of per-connection writer senders and
//!    reader abort handles
//! 5. **Game loop** - [`ZoneState`], driven by a tick interval
//!
//! # Thread Safety
//!
//! Only the game loop touches sessions, world state and buffers. Socket tasks
//! talk to it through the event channel (inbound) and the writer senders
//! (outbound), so no game state is shared across threads.
//!
//! # Connection Lifetime
//!
//! When the game loop reaps a session, its reader task is aborted and its
//! writer sender dropped, so the socket is neither read nor written again.
//! Connection ids are never handed out twice; an event still queued from a
//! reaped socket matches no session and is dropped.

use crate::config::NetworkConfig;
use crate::dispatch::{DispatchTarget, Dispatcher};
use crate::handlers::HandlerRegistry;
use crate::router::BroadcastRouter;
use crate::session::{Session, SessionRegistry};
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use mapgate_core::{ConnectionId, IdGenerator, MapGateError, PacketVersion, Result, TickClock};
use mapgate_game::{Scope, World};
use mapgate_protocol::encoders::{self, VanishKind};
use mapgate_protocol::PacketKeys;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Message from a socket task to the game loop
#[derive(Debug)]
pub enum TransportEvent {
    Connected { conn: ConnectionId, addr: SocketAddr },
    Data { conn: ConnectionId, bytes: Bytes },
    Disconnected { conn: ConnectionId },
}

/// Game-loop state: sessions, world, dispatcher and router
pub struct ZoneState {
    pub sessions: SessionRegistry,
    pub world: World,
    pub dispatcher: Dispatcher,
    pub router: BroadcastRouter,
    pub clock: TickClock,
    version: PacketVersion,
    keys: Option<PacketKeys>,
}

impl ZoneState {
    /// Build the game-loop state
    ///
    /// # Errors
    /// Invalid configuration or a packet definition that fails validation
    pub fn new(config: &NetworkConfig, registry: &HandlerRegistry, clock: TickClock) -> Result<Self> {
        config
            .validate()
            .map_err(|e| MapGateError::Config(format!("Invalid configuration: {}", e)))?;

        let table = Arc::new(registry.install(config.packet_version)?);
        let dispatcher = Dispatcher::new(table)
            .with_max_frames(config.max_frames_per_cycle)
            .with_dump_invalid(config.dump_invalid_packets);

        Ok(Self {
            sessions: SessionRegistry::new(),
            world: World::new(),
            dispatcher,
            router: BroadcastRouter::new(config.router_config()),
            clock,
            version: config.packet_version,
            keys: config.packet_keys,
        })
    }

    /// Register a new connection
    pub fn open_session(&mut self, conn: ConnectionId, addr: Option<SocketAddr>) {
        let mut session = Session::new(conn, self.version, self.keys);
        session.peer_addr = addr;
        self.sessions.insert(session);
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { conn, addr } => {
                tracing::info!("Connection {} from {}", conn, addr);
                self.open_session(conn, Some(addr));
            }
            TransportEvent::Data { conn, bytes } => {
                if let Some(session) = self.sessions.get_mut(conn) {
                    session.receive(&bytes);
                }
            }
            TransportEvent::Disconnected { conn } => {
                if let Some(session) = self.sessions.get_mut(conn) {
                    tracing::info!("Connection {} closed by peer", conn);
                    session.close();
                }
            }
        }
    }

    /// Run one game-loop cycle
    ///
    /// # Returns
    /// - outbound bytes per connection, in handle order
    /// - connections torn down this cycle
    pub fn process_tick(&mut self) -> (Vec<(ConnectionId, Bytes)>, Vec<ConnectionId>) {
        let tick = self.clock.current_tick();

        for conn in self.sessions.ids() {
            let mut target = DispatchTarget {
                sessions: &mut self.sessions,
                world: &mut self.world,
                router: &self.router,
                tick,
            };
            self.dispatcher.parse(conn, &mut target);
        }

        let closed = self.reap_closed();

        let outbound = self
            .sessions
            .iter_mut()
            .filter(|s| s.buffer.outbound_len() > 0)
            .map(|s| (s.id, s.buffer.take_outbound()))
            .collect();

        (outbound, closed)
    }

    /// Remove end-of-file sessions, clearing their players from view
    fn reap_closed(&mut self) -> Vec<ConnectionId> {
        let closed: Vec<ConnectionId> = self
            .sessions
            .iter()
            .filter(|s| !s.is_active())
            .map(|s| s.id)
            .collect();

        for &conn in &closed {
            let Some(session) = self.sessions.remove(conn) else {
                continue;
            };
            if let Some(unit) = session.player {
                if self.world.unit(unit).is_some() {
                    match encoders::vanish(unit, VanishKind::LoggedOut) {
                        Ok(packet) => {
                            self.router.send(&mut self.sessions, &self.world, &packet, unit, Scope::AREA_WITHOUT_SELF);
                        }
                        Err(e) => tracing::warn!("Failed to encode vanish for {}: {}", unit, e),
                    }
                    self.world.despawn(unit);
                }
            }
            tracing::info!("Session {} removed ({} bytes in, {} bytes out)",
                conn, session.stats.bytes_received, session.stats.bytes_sent);
        }

        closed
    }
}

/// Socket tasks of one accepted connection
struct ConnectionHandle {
    writer: mpsc::UnboundedSender<Bytes>,
    reader: AbortHandle,
}

/// TCP front end of the zone
pub struct ZoneServer {
    config: NetworkConfig,
    listener: TcpListener,
    state: ZoneState,
    connections: Arc<DashMap<ConnectionId, ConnectionHandle>>,
    /// Never released: ids are unique for the lifetime of the server
    id_generator: IdGenerator<u32>,
}

impl ZoneServer {
    /// Bind the listener and build the game-loop state
    ///
    /// # Errors
    /// Invalid configuration, bad packet definitions, or a bind failure
    pub async fn new(config: NetworkConfig, registry: &HandlerRegistry) -> Result<Self> {
        let state = ZoneState::new(&config, registry, TickClock::system())?;

        let listener = TcpListener::bind(config.bind_address)
            .await
            .map_err(|e| MapGateError::Network(format!("Failed to bind to {}: {}", config.bind_address, e)))?;

        tracing::info!("Zone server listening on {}", config.bind_address);
        tracing::info!("Configuration: version={}, obfuscation={}, area_size={}, spy={}",
            config.packet_version, config.packet_keys.is_some(), config.area_size, config.enable_spy);

        Ok(Self {
            config,
            listener,
            state,
            connections: Arc::new(DashMap::new()),
            id_generator: IdGenerator::starting_at(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Run until Ctrl-C
    pub async fn run(mut self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("Zone server starting main loop");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((mut socket, addr)) => {
                            if self.connections.len() >= self.config.max_connections {
                                tracing::warn!("Connection rejected: server full ({} connections)",
                                    self.connections.len());
                                let _ = socket.shutdown().await;
                                continue;
                            }
                            if let Err(e) = socket.set_nodelay(true) {
                                tracing::debug!("set_nodelay failed for {}: {}", addr, e);
                            }

                            let conn = ConnectionId::new(self.id_generator.get_available_id());
                            let (reader, writer) = socket.into_split();
                            let (out_tx, out_rx) = mpsc::unbounded_channel();

                            self.state.handle_event(TransportEvent::Connected { conn, addr });
                            let read_task = tokio::spawn(read_loop(conn, reader, event_tx.clone(), self.config.read_buffer_size));
                            tokio::spawn(write_loop(conn, writer, out_rx));
                            self.connections.insert(conn, ConnectionHandle {
                                writer: out_tx,
                                reader: read_task.abort_handle(),
                            });
                        }
                        Err(e) => {
                            tracing::error!("Error accepting connection: {:?}", e);
                        }
                    }
                }

                Some(event) = event_rx.recv() => {
                    self.state.handle_event(event);
                }

                _ = ticker.tick() => {
                    self.flush_tick();
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, initiating shutdown");
                    break;
                }
            }
        }

        for session in self.state.sessions.iter_mut() {
            session.close();
        }
        self.flush_tick();
        tracing::info!("Zone server main loop ended");
        Ok(())
    }

    fn flush_tick(&mut self) {
        let (outbound, closed) = self.state.process_tick();

        for (conn, bytes) in outbound {
            if let Some(handle) = self.connections.get(&conn) {
                let _ = handle.writer.send(bytes);
            }
        }

        for conn in closed {
            // dropping the sender ends the writer task after its queue drains
            if let Some((_, handle)) = self.connections.remove(&conn) {
                handle.reader.abort();
            }
        }
    }
}

async fn read_loop(
    conn: ConnectionId,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<TransportEvent>,
    buffer_size: usize,
) {
    let mut buf = BytesMut::with_capacity(buffer_size);
    loop {
        buf.reserve(buffer_size);
        match reader.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let bytes = buf.split().freeze();
                if events.send(TransportEvent::Data { conn, bytes }).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Connection {} read error: {}", conn, e);
                break;
            }
        }
    }
    let _ = events.send(TransportEvent::Disconnected { conn });
}

async fn write_loop(conn: ConnectionId, mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            tracing::debug!("Connection {} write error: {}", conn, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
