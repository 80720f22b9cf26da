//! # Game Units
//!
//! Every object on a map is a [`Unit`]. Players additionally carry a
//! [`PlayerState`] with their connection and social memberships.

use mapgate_core::{
    BattlegroundId, ChatId, ClanId, ConnectionId, DuelId, GuildId, MapId, PartyId, TilePosition,
    UnitId, UnitKind,
};

/// Player-only state
///
/// # Purpose
/// Links a player unit to its connection and records every group the router
/// may need to resolve a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    /// Owning connection
    pub connection: ConnectionId,

    /// Character name
    pub name: String,

    pub party: Option<PartyId>,
    pub guild: Option<GuildId>,
    pub battleground: Option<BattlegroundId>,
    pub duel: Option<DuelId>,
    pub clan: Option<ClanId>,

    /// Can perceive hidden units
    pub sees_hidden: bool,
}

impl PlayerState {
    /// Create player state bound to a connection
    ///
    /// # Arguments
    /// * `connection` - Connection that controls this player
    /// * `name` - Character name
    pub fn new(connection: ConnectionId, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
            party: None,
            guild: None,
            battleground: None,
            duel: None,
            clan: None,
            sees_hidden: false,
        }
    }
}

/// Game object placed on a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub map: MapId,
    pub pos: TilePosition,

    /// Facing (0-7)
    pub dir: u8,

    /// Hidden from players that cannot perceive hidden units
    pub hidden: bool,

    /// Class shown to others while disguised
    pub disguise: Option<u16>,

    /// Player: room the player sits in. NPC: room the NPC owns.
    pub chat: Option<ChatId>,

    /// Present for player units only
    pub player: Option<PlayerState>,
}

impl Unit {
    /// Create a non-player unit
    pub fn new(id: UnitId, kind: UnitKind, map: MapId, pos: TilePosition) -> Self {
        Self {
            id,
            kind,
            map,
            pos,
            dir: 0,
            hidden: false,
            disguise: None,
            chat: None,
            player: None,
        }
    }

    /// Create a player unit
    ///
    /// # Arguments
    /// * `id` - Character id as shown on the wire
    /// * `state` - Connection and membership state
    /// * `map` - Map the player spawns on
    /// * `pos` - Spawn cell
    pub fn player(id: UnitId, state: PlayerState, map: MapId, pos: TilePosition) -> Self {
        Self {
            player: Some(state),
            ..Self::new(id, UnitKind::Player, map, pos)
        }
    }

    #[inline]
    pub fn is_player(&self) -> bool {
        self.kind == UnitKind::Player && self.player.is_some()
    }

    /// Owning connection of a player unit
    #[inline]
    pub fn connection(&self) -> Option<ConnectionId> {
        self.player.as_ref().map(|p| p.connection)
    }

    #[inline]
    pub fn is_disguised(&self) -> bool {
        self.disguise.is_some()
    }

    pub fn party(&self) -> Option<PartyId> {
        self.player.as_ref().and_then(|p| p.party)
    }

    pub fn guild(&self) -> Option<GuildId> {
        self.player.as_ref().and_then(|p| p.guild)
    }

    pub fn battleground(&self) -> Option<BattlegroundId> {
        self.player.as_ref().and_then(|p| p.battleground)
    }

    pub fn duel(&self) -> Option<DuelId> {
        self.player.as_ref().and_then(|p| p.duel)
    }

    pub fn clan(&self) -> Option<ClanId> {
        self.player.as_ref().and_then(|p| p.clan)
    }

    pub fn sees_hidden(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.sees_hidden)
    }

    pub fn name(&self) -> &str {
        self.player.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}
