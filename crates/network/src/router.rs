//! # Broadcast Router
//!
//! Fans a finished packet out to every session a [`Scope`] selects relative
//! to an anchor unit.
//!
//! # Delivery rules
//!
//! - Every recipient must be live. Apart from `SelfOnly`, it must also have
//!   entered the world.
//! - A packet whose bytes start exactly where a recipient's outbound queue
//!   would be written next is a caller defect: it is logged and that recipient
//!   is skipped.
//! - Area scopes anchored on a hidden unit reach only the anchor and players
//!   that perceive hidden units.
//! - With spying enabled, sessions whose spy marker names the party or guild
//!   get a copy of its traffic, even when they already got one as members.
//! - After an area scope, a disguised player anchor gets one extra copy whose
//!   identity field carries its disguise view id.
//!
//! Per-connection output order equals call order.

use crate::session::SessionRegistry;
use mapgate_core::{AreaBox, ConnectionId, UnitId};
use mapgate_game::scope::{self, AreaFilter, GroupRange};
use mapgate_game::{Scope, Unit, World};
use mapgate_protocol::Packet;

/// Router settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Default area radius in cells
    pub area_size: u16,

    /// Deliver party/guild traffic to spying sessions
    pub enable_spy: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            area_size: 14,
            enable_spy: false,
        }
    }
}

pub struct BroadcastRouter {
    config: RouterConfig,
}

impl BroadcastRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Deliver `packet` to every session `scope` selects around `anchor`
    ///
    /// # Returns
    /// Number of copies written, the disguise copy included
    pub fn send(
        &self,
        sessions: &mut SessionRegistry,
        world: &World,
        packet: &Packet,
        anchor: UnitId,
        scope: Scope,
    ) -> usize {
        let recipients = self.recipients(sessions, world, anchor, scope);
        let mut written = 0;

        for conn in recipients {
            if self.deliver(sessions, conn, packet, scope) {
                written += 1;
            }
        }

        if scope.is_area_style() {
            written += self.disguise_copy(sessions, world, packet, anchor);
        }

        tracing::debug!("Broadcast 0x{:04x} ({} bytes) from {} to {}: {} copies",
            packet.opcode(), packet.len(), anchor, scope.as_str(), written);
        written
    }

    /// Deliver to every occupant of a chat room, optionally skipping one unit
    pub fn send_to_room(
        &self,
        sessions: &mut SessionRegistry,
        world: &World,
        packet: &Packet,
        chat: mapgate_core::ChatId,
        skip: Option<UnitId>,
    ) -> usize {
        let recipients: Vec<ConnectionId> = world
            .chat(chat)
            .map(|room| {
                room.occupants
                    .iter()
                    .filter(|&&id| Some(id) != skip)
                    .filter_map(|&id| world.unit(id).and_then(Unit::connection))
                    .collect()
            })
            .unwrap_or_default();

        recipients
            .into_iter()
            .filter(|&conn| self.deliver(sessions, conn, packet, Scope::CHAT))
            .count()
    }

    /// Resolve a scope into connections, before liveness checks
    ///
    /// Spy copies are included; the disguise copy is not.
    pub fn recipients(
        &self,
        sessions: &SessionRegistry,
        world: &World,
        anchor: UnitId,
        scope: Scope,
    ) -> Vec<ConnectionId> {
        if scope == Scope::AllClients {
            return sessions
                .iter()
                .filter(|s| s.player.is_some())
                .map(|s| s.id)
                .collect();
        }

        let Some(src) = world.unit(anchor) else {
            tracing::debug!("Broadcast anchor {} not in world", anchor);
            return Vec::new();
        };

        match scope {
            Scope::AllClients => Vec::new(),

            Scope::AllSameMap => sessions
                .iter()
                .filter(|s| {
                    s.player
                        .and_then(|id| world.unit(id))
                        .is_some_and(|u| scope::same_map(u, src))
                })
                .map(|s| s.id)
                .collect(),

            Scope::Area { radius, filter } => {
                let radius = radius.resolve(self.config.area_size);
                self.area_recipients(world, src, radius, filter)
            }

            Scope::ChatRoom { include_self } => match scope::anchor_chat(src) {
                Some(chat) => world
                    .chat(chat)
                    .map(|room| {
                        room.occupants
                            .iter()
                            .filter(|&&id| include_self || id != src.id)
                            .filter_map(|&id| world.unit(id).and_then(Unit::connection))
                            .collect()
                    })
                    .unwrap_or_default(),
                None => Vec::new(),
            },

            Scope::Party { range, include_self } => {
                let Some(party) = src.party() else {
                    return Vec::new();
                };
                let mut out = self.group_recipients(world, src, world.party_members(party), range, include_self);
                if self.config.enable_spy {
                    out.extend(sessions.iter().filter(|s| s.party_spy == Some(party)).map(|s| s.id));
                }
                out
            }

            Scope::Guild { range, include_self } => {
                let Some(guild) = src.guild() else {
                    return Vec::new();
                };
                let mut out = self.group_recipients(world, src, world.guild_members(guild), range, include_self);
                if self.config.enable_spy {
                    out.extend(sessions.iter().filter(|s| s.guild_spy == Some(guild)).map(|s| s.id));
                }
                out
            }

            Scope::GuildNoBattleground => {
                let Some(guild) = src.guild() else {
                    return Vec::new();
                };
                let mut out: Vec<ConnectionId> = world
                    .guild_members(guild)
                    .into_iter()
                    .filter_map(|id| world.unit(id))
                    .filter(|u| scope::outside_battleground(u))
                    .filter_map(Unit::connection)
                    .collect();
                if self.config.enable_spy {
                    out.extend(sessions.iter().filter(|s| s.guild_spy == Some(guild)).map(|s| s.id));
                }
                out
            }

            Scope::Battleground { range, include_self } => match src.battleground() {
                Some(bg) => self.group_recipients(world, src, world.battleground_members(bg), range, include_self),
                None => Vec::new(),
            },

            Scope::Duel { include_self } => match src.duel() {
                Some(duel) => {
                    self.group_recipients(world, src, world.duel_members(duel), GroupRange::Everywhere, include_self)
                }
                None => Vec::new(),
            },

            Scope::Clan { include_self } => match src.clan() {
                Some(clan) => {
                    self.group_recipients(world, src, world.clan_members(clan), GroupRange::Everywhere, include_self)
                }
                None => Vec::new(),
            },

            Scope::SelfOnly => src.connection().into_iter().collect(),
        }
    }

    fn area_recipients(&self, world: &World, src: &Unit, radius: u16, filter: AreaFilter) -> Vec<ConnectionId> {
        let area = AreaBox::around(src.pos, radius);
        world
            .units_in_area(src.map, &area)
            .into_iter()
            .filter(|u| u.is_player())
            .filter(|u| scope::area_filter_admits(filter, u, src))
            .filter(|u| scope::perceives(u, src))
            .filter_map(Unit::connection)
            .collect()
    }

    fn group_recipients(
        &self,
        world: &World,
        src: &Unit,
        members: Vec<UnitId>,
        range: GroupRange,
        include_self: bool,
    ) -> Vec<ConnectionId> {
        members
            .into_iter()
            .filter(|&id| include_self || id != src.id)
            .filter_map(|id| world.unit(id))
            .filter(|u| scope::group_range_admits(range, u, src, self.config.area_size))
            .filter_map(Unit::connection)
            .collect()
    }

    /// Write one copy to one session, applying the liveness and aliasing checks
    fn deliver(&self, sessions: &mut SessionRegistry, conn: ConnectionId, packet: &Packet, scope: Scope) -> bool {
        let Some(session) = sessions.get_mut(conn) else {
            return false;
        };
        if !session.is_active() {
            return false;
        }
        if scope != Scope::SelfOnly && !session.is_in_world() {
            return false;
        }
        if packet.as_ptr() == session.buffer.outbound_tail_ptr() {
            tracing::error!("Broadcast 0x{:04x} to session {}: source is the destination buffer, skipped",
                packet.opcode(), conn);
            return false;
        }

        session.send(packet);
        true
    }

    fn disguise_copy(&self, sessions: &mut SessionRegistry, world: &World, packet: &Packet, anchor: UnitId) -> usize {
        let Some(src) = world.unit(anchor) else {
            return 0;
        };
        if !src.is_player() || !src.is_disguised() {
            return 0;
        }
        let Some(conn) = src.connection() else {
            return 0;
        };

        let copy = packet.with_unit_id(anchor.disguised());
        usize::from(self.deliver(sessions, conn, &copy, Scope::SelfOnly))
    }
}

impl Default for BroadcastRouter {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
