//! Social groups and chat rooms

use mapgate_core::{ChatId, UnitId};
use std::collections::BTreeSet;

/// Membership list shared by parties, guilds, battleground teams, duels and clans
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    members: BTreeSet<UnitId>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: UnitId) -> bool {
        self.members.insert(id)
    }

    pub fn remove(&mut self, id: UnitId) -> bool {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.members.contains(&id)
    }

    /// Members in ascending id order
    pub fn members(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Player-opened or NPC-owned chat room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoom {
    pub id: ChatId,

    /// Player or NPC that opened the room
    pub owner: UnitId,

    pub title: String,

    /// Players sitting in the room, in join order
    pub occupants: Vec<UnitId>,

    /// Maximum number of occupants
    pub limit: u16,
}

impl ChatRoom {
    pub fn new(id: ChatId, owner: UnitId, title: impl Into<String>, limit: u16) -> Self {
        Self {
            id,
            owner,
            title: title.into(),
            occupants: Vec::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.limit as usize
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.occupants.contains(&id)
    }
}
