//! # Sessions
//!
//! One [`Session`] per accepted connection, owned by the game loop.
//!
//! # Lifecycle
//!
//! ```text
//! Connected → Authenticated → InWorld
//!      ↓            ↓            ↓
//!             (eof / close)
//! ```
//!
//! A session exists before any player identity is attached. Once it is
//! flagged end-of-file it is no longer live: the dispatch loop stops reading
//! it and the router stops writing to it.

use crate::buffer::ConnectionBuffer;
use mapgate_core::{ConnectionId, GuildId, PacketVersion, PartyId, UnitId};
use mapgate_protocol::{OpcodeCipher, Packet, PacketKeys};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket accepted, no identity yet
    Connected,

    /// Handshake accepted, player attached but still loading
    Authenticated,

    /// Client finished loading; receives world broadcasts
    InWorld,
}

/// Traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub frames_received: u64,
    pub frames_ignored: u64,
}

/// Connection as seen by the game loop
#[derive(Debug)]
pub struct Session {
    pub id: ConnectionId,
    pub peer_addr: Option<SocketAddr>,
    pub state: SessionState,

    /// End-of-file: peer went away or the server decided to drop it
    pub eof: bool,

    /// Player attached by the handshake
    pub player: Option<UnitId>,

    pub buffer: ConnectionBuffer,

    /// Rolling opcode key when the client obfuscates opcodes
    pub cipher: Option<OpcodeCipher>,

    /// Receives copies of this party's traffic
    pub party_spy: Option<PartyId>,

    /// Receives copies of this guild's traffic
    pub guild_spy: Option<GuildId>,

    /// Negotiated client revision
    pub version: PacketVersion,

    pub stats: SessionStats,
}

impl Session {
    /// Create a session for a freshly accepted connection
    ///
    /// # Arguments
    /// * `id` - Connection handle
    /// * `version` - Client revision the server speaks
    /// * `keys` - Opcode obfuscation keys, if enabled
    pub fn new(id: ConnectionId, version: PacketVersion, keys: Option<PacketKeys>) -> Self {
        tracing::debug!("New session {}", id);

        Self {
            id,
            peer_addr: None,
            state: SessionState::Connected,
            eof: false,
            player: None,
            buffer: ConnectionBuffer::default(),
            cipher: keys.map(OpcodeCipher::new),
            party_spy: None,
            guild_spy: None,
            version,
            stats: SessionStats::default(),
        }
    }

    pub fn with_peer(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Session can still send and receive
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.eof
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.player.is_some()
    }

    #[inline]
    pub fn is_in_world(&self) -> bool {
        self.state == SessionState::InWorld
    }

    /// Flag the session for teardown
    pub fn close(&mut self) {
        if !self.eof {
            tracing::debug!("Session {} flagged end-of-file", self.id);
        }
        self.eof = true;
    }

    /// Attach the player identity from the handshake
    pub fn attach_player(&mut self, unit: UnitId) {
        self.player = Some(unit);
        self.state = SessionState::Authenticated;
    }

    pub fn enter_world(&mut self) {
        if self.player.is_some() {
            self.state = SessionState::InWorld;
        }
    }

    /// Feed bytes read from the socket
    pub fn receive(&mut self, data: &[u8]) {
        self.stats.bytes_received += data.len() as u64;
        self.buffer.append_inbound(data);
    }

    /// Queue a packet for sending
    pub fn send(&mut self, packet: &Packet) {
        self.stats.bytes_sent += packet.len() as u64;
        self.buffer.append_outbound(packet.as_bytes());
    }
}

/// All sessions, keyed by connection handle
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<ConnectionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Sessions in ascending handle order
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::new(ConnectionId::new(1), PacketVersion::DEFAULT, None);
        assert_eq!(session.state, SessionState::Connected);
        assert!(session.is_active());
        assert!(!session.is_authenticated());

        session.enter_world();
        assert_eq!(session.state, SessionState::Connected);

        session.attach_player(UnitId::new(150000));
        assert_eq!(session.state, SessionState::Authenticated);
        session.enter_world();
        assert!(session.is_in_world());

        session.close();
        assert!(!session.is_active());
    }

    #[test]
    fn test_cipher_only_with_keys() {
        let plain = Session::new(ConnectionId::new(1), PacketVersion::BASE, None);
        assert!(plain.cipher.is_none());

        let keys = PacketKeys::new(1, 2, 3);
        let obfuscated = Session::new(ConnectionId::new(2), PacketVersion::DEFAULT, Some(keys));
        assert_eq!(obfuscated.cipher.as_ref().map(|c| c.current_key()), Some(5));
    }

    #[test]
    fn test_registry_ordering() {
        let mut registry = SessionRegistry::new();
        for id in [3, 1, 2] {
            registry.insert(Session::new(ConnectionId::new(id), PacketVersion::DEFAULT, None));
        }
        assert_eq!(registry.ids(), vec![ConnectionId::new(1), ConnectionId::new(2), ConnectionId::new(3)]);
        assert!(registry.remove(ConnectionId::new(2)).is_some());
        assert_eq!(registry.len(), 2);
    }
}
