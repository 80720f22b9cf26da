//! # Handler Context
//!
//! Everything a packet handler may touch while it runs: the originating
//! connection, all sessions, the world, the router and the current tick.

use crate::router::BroadcastRouter;
use crate::session::{Session, SessionRegistry};
use mapgate_core::{ConnectionId, MapGateError, PacketVersion, Result, Tick, UnitId};
use mapgate_game::{Scope, World};
use mapgate_protocol::Packet;

pub struct HandlerContext<'a> {
    /// Connection the frame arrived on
    pub conn: ConnectionId,
    pub sessions: &'a mut SessionRegistry,
    pub world: &'a mut World,
    pub router: &'a BroadcastRouter,
    pub tick: Tick,
}

impl<'a> HandlerContext<'a> {
    pub fn session(&self) -> Result<&Session> {
        self.sessions
            .get(self.conn)
            .ok_or_else(|| MapGateError::NotFound(format!("session {}", self.conn)))
    }

    pub fn session_mut(&mut self) -> Result<&mut Session> {
        let conn = self.conn;
        self.sessions
            .get_mut(conn)
            .ok_or_else(|| MapGateError::NotFound(format!("session {}", conn)))
    }

    /// Player attached to the originating connection
    pub fn player(&self) -> Result<UnitId> {
        self.session()?
            .player
            .ok_or_else(|| MapGateError::InvalidData(format!("session {} has no player", self.conn)))
    }

    pub fn version(&self) -> PacketVersion {
        self.sessions.get(self.conn).map(|s| s.version).unwrap_or_default()
    }

    #[inline]
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Queue a packet for the originating connection only
    pub fn reply(&mut self, packet: &Packet) -> Result<()> {
        self.session_mut()?.send(packet);
        Ok(())
    }

    /// Broadcast relative to `anchor`; returns the number of copies written
    pub fn send_to_scope(&mut self, packet: &Packet, anchor: UnitId, scope: Scope) -> usize {
        self.router.send(self.sessions, self.world, packet, anchor, scope)
    }

    /// Flag the originating connection for teardown
    pub fn close(&mut self) {
        if let Some(session) = self.sessions.get_mut(self.conn) {
            session.close();
        }
    }
}
