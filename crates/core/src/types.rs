//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl $name {
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            pub fn get(&self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Transport connection handle (one per accepted socket)
    ConnectionId(u32)
);

id_newtype!(
    /// Map index
    MapId(u16)
);

id_newtype!(PartyId(u32));
id_newtype!(GuildId(u32));
id_newtype!(ChatId(u32));
id_newtype!(BattlegroundId(u32));
id_newtype!(DuelId(u32));
id_newtype!(ClanId(u32));

id_newtype!(
    /// Game object identifier as it appears on the wire (signed 32-bit)
    UnitId(i32)
);

impl UnitId {
    /// Identifier shown to the controlling player of a disguised unit.
    ///
    /// Everyone else keeps seeing the disguise under the real id; the owner
    /// sees the disguise as a separate object under the negated id.
    pub fn disguised(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

/// Kind of game object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Player,
    Monster,
    Npc,
    Item,
    SkillEffect,
    Homunculus,
    Mercenary,
    Elemental,
    Pet,
    /// A chat room placed on the map
    Chat,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Monster => "monster",
            Self::Npc => "npc",
            Self::Item => "item",
            Self::SkillEffect => "skill",
            Self::Homunculus => "homunculus",
            Self::Mercenary => "mercenary",
            Self::Elemental => "elemental",
            Self::Pet => "pet",
            Self::Chat => "chat",
        }
    }
}

/// Client protocol revision, expressed as the client build date (YYYYMMDD)
///
/// Layout choices compare against revision thresholds, so newer clients are
/// simply larger numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketVersion(pub u32);

impl PacketVersion {
    /// Oldest revision the definition tables describe
    pub const BASE: Self = Self(20040101);
    /// CZ_ENTER2 handshake
    pub const V2008_09_10: Self = Self(20080910);
    /// Movement/time opcodes moved into the 0x035f block
    pub const V2009_09_22: Self = Self(20090922);
    /// Opcode shuffle that reassigned several 0x03xx opcodes
    pub const V2013_12_23: Self = Self(20131223);
    /// Party HP notifications switched to 32-bit values
    pub const V2017_05_02: Self = Self(20170502);

    pub const DEFAULT: Self = Self::V2013_12_23;

    pub const fn new(date: u32) -> Self {
        Self(date)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn at_least(&self, other: PacketVersion) -> bool {
        self.0 >= other.0
    }
}

impl Default for PacketVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PacketVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
