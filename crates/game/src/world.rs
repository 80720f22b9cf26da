//! # World State
//!
//! Owns every unit, group and chat room, plus the block index used for area
//! queries. The world is touched only from the game loop, so it carries no
//! interior locking.

use crate::groups::{ChatRoom, Group};
use crate::spatial::MapBlocks;
use crate::unit::Unit;
use mapgate_core::{
    AreaBox, BattlegroundId, ChatId, ClanId, DuelId, GuildId, IdGenerator, MapGateError, MapId,
    PartyId, Result, TilePosition, UnitId,
};
use std::collections::BTreeMap;

/// Generates join/leave/members accessors for one kind of group
macro_rules! membership {
    ($field:ident, $id:ty, $join:ident, $leave:ident, $members:ident, $label:literal) => {
        /// Add a player to the group, leaving any previous one
        pub fn $join(&mut self, unit: UnitId, group: $id) -> Result<()> {
            self.$leave(unit);
            let player = self.player_state_mut(unit)?;
            player.$field = Some(group);
            self.$field.entry(group).or_default().add(unit);
            tracing::debug!(concat!("Unit {} joined ", $label, " {}"), unit, group);
            Ok(())
        }

        /// Remove a player from its group; returns the group it left
        pub fn $leave(&mut self, unit: UnitId) -> Option<$id> {
            let group = self.player_state_mut(unit).ok()?.$field.take()?;
            if let Some(members) = self.$field.get_mut(&group) {
                members.remove(unit);
                if members.is_empty() {
                    self.$field.remove(&group);
                }
            }
            Some(group)
        }

        /// Members in ascending id order
        pub fn $members(&self, group: $id) -> Vec<UnitId> {
            self.$field
                .get(&group)
                .map(|g| g.members().collect())
                .unwrap_or_default()
        }
    };
}

/// All game objects known to this map server
pub struct World {
    units: BTreeMap<UnitId, Unit>,
    blocks: MapBlocks,
    party: BTreeMap<PartyId, Group>,
    guild: BTreeMap<GuildId, Group>,
    battleground: BTreeMap<BattlegroundId, Group>,
    duel: BTreeMap<DuelId, Group>,
    clan: BTreeMap<ClanId, Group>,
    chats: BTreeMap<ChatId, ChatRoom>,
    chat_ids: IdGenerator<u32>,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            blocks: MapBlocks::new(),
            party: BTreeMap::new(),
            guild: BTreeMap::new(),
            battleground: BTreeMap::new(),
            duel: BTreeMap::new(),
            clan: BTreeMap::new(),
            chats: BTreeMap::new(),
            chat_ids: IdGenerator::starting_at(1),
        }
    }

    //=== Units ===//

    /// Place a unit on its map
    ///
    /// # Errors
    /// `InvalidData` if a unit with the same id already exists
    pub fn spawn(&mut self, unit: Unit) -> Result<()> {
        if self.units.contains_key(&unit.id) {
            return Err(MapGateError::InvalidData(format!("unit {} already spawned", unit.id)));
        }
        tracing::debug!("Spawning {} {} on map {} at ({}, {})",
            unit.kind.as_str(), unit.id, unit.map, unit.pos.x, unit.pos.y);
        self.blocks.insert(unit.id, unit.map, unit.pos);
        self.units.insert(unit.id, unit);
        Ok(())
    }

    /// Remove a unit together with all of its memberships
    pub fn despawn(&mut self, id: UnitId) -> Option<Unit> {
        if !self.units.contains_key(&id) {
            return None;
        }

        self.leave_chat(id);
        self.close_owned_chat(id);
        self.leave_party(id);
        self.leave_guild(id);
        self.leave_battleground(id);
        self.leave_duel(id);
        self.leave_clan(id);

        let unit = self.units.remove(&id)?;
        self.blocks.remove(id, unit.map, unit.pos);
        tracing::debug!("Despawned unit {}", id);
        Some(unit)
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units
            .get_mut(&id)
            .ok_or_else(|| MapGateError::NotFound(format!("unit {}", id)))
    }

    fn player_state_mut(&mut self, id: UnitId) -> Result<&mut crate::unit::PlayerState> {
        self.unit_mut(id)?
            .player
            .as_mut()
            .ok_or_else(|| MapGateError::InvalidData(format!("unit {} is not a player", id)))
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Move a unit to another cell on its map; returns the previous cell
    pub fn move_unit(&mut self, id: UnitId, to: TilePosition) -> Result<TilePosition> {
        let unit = self.unit_mut(id)?;
        let from = std::mem::replace(&mut unit.pos, to);
        let map = unit.map;
        self.blocks.relocate(id, map, from, to);
        Ok(from)
    }

    /// Move a unit to another map
    pub fn warp(&mut self, id: UnitId, map: MapId, to: TilePosition) -> Result<()> {
        let unit = self.unit_mut(id)?;
        let (old_map, from) = (unit.map, unit.pos);
        unit.map = map;
        unit.pos = to;
        self.blocks.remove(id, old_map, from);
        self.blocks.insert(id, map, to);
        Ok(())
    }

    pub fn set_direction(&mut self, id: UnitId, dir: u8) -> Result<()> {
        self.unit_mut(id)?.dir = dir & 0x07;
        Ok(())
    }

    pub fn set_hidden(&mut self, id: UnitId, hidden: bool) -> Result<()> {
        self.unit_mut(id)?.hidden = hidden;
        Ok(())
    }

    pub fn set_disguise(&mut self, id: UnitId, class: Option<u16>) -> Result<()> {
        self.unit_mut(id)?.disguise = class;
        Ok(())
    }

    pub fn set_sees_hidden(&mut self, id: UnitId, sees: bool) -> Result<()> {
        self.player_state_mut(id)?.sees_hidden = sees;
        Ok(())
    }

    /// Units standing inside `area` on `map`, in ascending id order
    pub fn units_in_area(&self, map: MapId, area: &AreaBox) -> Vec<&Unit> {
        let mut found: Vec<&Unit> = self
            .blocks
            .candidates(map, area)
            .into_iter()
            .filter_map(|id| self.units.get(&id))
            .filter(|unit| unit.map == map && area.contains(unit.pos))
            .collect();
        found.sort_by_key(|unit| unit.id);
        found
    }

    /// Every player unit, in ascending id order
    pub fn players(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|unit| unit.is_player())
    }

    //=== Groups ===//

    membership!(party, PartyId, join_party, leave_party, party_members, "party");
    membership!(guild, GuildId, join_guild, leave_guild, guild_members, "guild");
    membership!(battleground, BattlegroundId, join_battleground, leave_battleground, battleground_members, "battleground");
    membership!(duel, DuelId, join_duel, leave_duel, duel_members, "duel");
    membership!(clan, ClanId, join_clan, leave_clan, clan_members, "clan");

    //=== Chat rooms ===//

    /// Open a chat room owned by `owner`
    ///
    /// A player owner sits in its own room. An NPC owner only owns it.
    pub fn open_chat(&mut self, owner: UnitId, title: &str, limit: u16) -> Result<ChatId> {
        let unit = self.unit_mut(owner)?;
        if unit.chat.is_some() {
            return Err(MapGateError::InvalidData(format!("unit {} already has a chat room", owner)));
        }
        let seated = unit.is_player();

        let id = ChatId::new(self.chat_ids.get_available_id());
        self.unit_mut(owner)?.chat = Some(id);
        let mut room = ChatRoom::new(id, owner, title, limit);
        if seated {
            room.occupants.push(owner);
        }
        self.chats.insert(id, room);

        tracing::debug!("Chat room {} opened by {}", id, owner);
        Ok(id)
    }

    /// Seat a player in a room
    pub fn join_chat(&mut self, unit: UnitId, chat: ChatId) -> Result<()> {
        let room = self
            .chats
            .get(&chat)
            .ok_or_else(|| MapGateError::NotFound(format!("chat room {}", chat)))?;
        if room.is_full() {
            return Err(MapGateError::InvalidData(format!("chat room {} is full", chat)));
        }

        let player = self.unit_mut(unit)?;
        if !player.is_player() || player.chat.is_some() {
            return Err(MapGateError::InvalidData(format!("unit {} cannot join chat {}", unit, chat)));
        }
        player.chat = Some(chat);

        if let Some(room) = self.chats.get_mut(&chat) {
            room.occupants.push(unit);
        }
        Ok(())
    }

    /// Remove a player from its room
    ///
    /// # Returns
    /// The room left and the number of occupants remaining. A player-owned
    /// room closes when its last occupant leaves; an NPC's room stays open.
    pub fn leave_chat(&mut self, unit: UnitId) -> Option<(ChatId, usize)> {
        let member = self.units.get_mut(&unit)?;
        if !member.is_player() {
            return None;
        }
        let chat = member.chat.take()?;

        let room = self.chats.get_mut(&chat)?;
        room.occupants.retain(|&id| id != unit);
        let remaining = room.occupants.len();
        let owner_is_player = self.units.get(&room.owner).is_some_and(|u| u.is_player());

        if remaining == 0 && (owner_is_player || room.owner == unit) {
            self.chats.remove(&chat);
            self.chat_ids.release(chat.get());
            tracing::debug!("Chat room {} closed", chat);
        } else if room.owner == unit {
            // ownership passes to the longest-seated occupant
            room.owner = room.occupants[0];
        }

        Some((chat, remaining))
    }

    /// Close the room an NPC owns, unseating everyone in it
    fn close_owned_chat(&mut self, owner: UnitId) {
        let Some(chat) = self.units.get(&owner).filter(|u| !u.is_player()).and_then(|u| u.chat) else {
            return;
        };
        if let Some(room) = self.chats.remove(&chat) {
            for occupant in room.occupants {
                if let Some(unit) = self.units.get_mut(&occupant) {
                    unit.chat = None;
                }
            }
            self.chat_ids.release(chat.get());
        }
        if let Some(unit) = self.units.get_mut(&owner) {
            unit.chat = None;
        }
    }

    pub fn chat(&self, id: ChatId) -> Option<&ChatRoom> {
        self.chats.get(&id)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
