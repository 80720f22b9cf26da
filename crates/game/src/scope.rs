//! # Delivery Scopes
//!
//! A [`Scope`] names who should receive a broadcast relative to an anchor
//! unit. The predicates below are the pure building blocks the router
//! combines to resolve a scope into recipients; none of them touch sessions
//! or buffers.

use crate::unit::Unit;
use mapgate_core::{AreaBox, BattlegroundId, ChatId, ClanId, DuelId, GuildId, PartyId};

/// Reduction applied to `area_size` for chat-bubble broadcasts
pub const CHAT_AREA_REDUCTION: u16 = 5;

/// Radius of an area scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaRadius {
    /// Configured `area_size`
    Default,
    /// `area_size` minus [`CHAT_AREA_REDUCTION`]
    Chat,
    Exact(u16),
}

impl AreaRadius {
    pub fn resolve(self, area_size: u16) -> u16 {
        match self {
            Self::Default => area_size,
            Self::Chat => area_size.saturating_sub(CHAT_AREA_REDUCTION),
            Self::Exact(radius) => radius,
        }
    }
}

/// Exclusion applied to the players inside an area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaFilter {
    Everyone,
    /// Skip the anchor
    WithoutSelf,
    /// Skip the anchor and anyone seated in a chat room
    WithoutChatting,
    /// Skip players seated in the anchor's chat room
    WithoutSameChat,
}

/// Reach of a group scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRange {
    Everywhere,
    SameMap,
    Area,
}

/// Delivery scope selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every in-world player
    AllClients,
    /// Every in-world player on the anchor's map
    AllSameMap,
    Area { radius: AreaRadius, filter: AreaFilter },
    /// The anchor's chat room (joined or owned)
    ChatRoom { include_self: bool },
    Party { range: GroupRange, include_self: bool },
    Guild { range: GroupRange, include_self: bool },
    /// Guild members not currently assigned to a battleground
    GuildNoBattleground,
    Battleground { range: GroupRange, include_self: bool },
    Duel { include_self: bool },
    Clan { include_self: bool },
    SelfOnly,
}

impl Scope {
    pub const AREA: Scope = Scope::Area { radius: AreaRadius::Default, filter: AreaFilter::Everyone };
    pub const AREA_WITHOUT_SELF: Scope = Scope::Area { radius: AreaRadius::Default, filter: AreaFilter::WithoutSelf };
    pub const AREA_WITHOUT_CHATTING: Scope = Scope::Area { radius: AreaRadius::Default, filter: AreaFilter::WithoutChatting };
    pub const AREA_WITHOUT_SAME_CHAT: Scope = Scope::Area { radius: AreaRadius::Default, filter: AreaFilter::WithoutSameChat };
    pub const AREA_CHAT_WITHOUT_CHATTING: Scope = Scope::Area { radius: AreaRadius::Chat, filter: AreaFilter::WithoutChatting };

    pub const CHAT: Scope = Scope::ChatRoom { include_self: true };
    pub const CHAT_WITHOUT_SELF: Scope = Scope::ChatRoom { include_self: false };

    pub const PARTY: Scope = Scope::Party { range: GroupRange::Everywhere, include_self: true };
    pub const PARTY_WITHOUT_SELF: Scope = Scope::Party { range: GroupRange::Everywhere, include_self: false };
    pub const PARTY_SAME_MAP: Scope = Scope::Party { range: GroupRange::SameMap, include_self: true };
    pub const PARTY_SAME_MAP_WITHOUT_SELF: Scope = Scope::Party { range: GroupRange::SameMap, include_self: false };
    pub const PARTY_AREA: Scope = Scope::Party { range: GroupRange::Area, include_self: true };
    pub const PARTY_AREA_WITHOUT_SELF: Scope = Scope::Party { range: GroupRange::Area, include_self: false };

    pub const GUILD: Scope = Scope::Guild { range: GroupRange::Everywhere, include_self: true };
    pub const GUILD_WITHOUT_SELF: Scope = Scope::Guild { range: GroupRange::Everywhere, include_self: false };
    pub const GUILD_SAME_MAP: Scope = Scope::Guild { range: GroupRange::SameMap, include_self: true };
    pub const GUILD_SAME_MAP_WITHOUT_SELF: Scope = Scope::Guild { range: GroupRange::SameMap, include_self: false };
    pub const GUILD_AREA: Scope = Scope::Guild { range: GroupRange::Area, include_self: true };
    pub const GUILD_AREA_WITHOUT_SELF: Scope = Scope::Guild { range: GroupRange::Area, include_self: false };

    pub const BATTLEGROUND: Scope = Scope::Battleground { range: GroupRange::Everywhere, include_self: true };
    pub const BATTLEGROUND_WITHOUT_SELF: Scope = Scope::Battleground { range: GroupRange::Everywhere, include_self: false };
    pub const BATTLEGROUND_SAME_MAP: Scope = Scope::Battleground { range: GroupRange::SameMap, include_self: true };
    pub const BATTLEGROUND_SAME_MAP_WITHOUT_SELF: Scope = Scope::Battleground { range: GroupRange::SameMap, include_self: false };
    pub const BATTLEGROUND_AREA: Scope = Scope::Battleground { range: GroupRange::Area, include_self: true };
    pub const BATTLEGROUND_AREA_WITHOUT_SELF: Scope = Scope::Battleground { range: GroupRange::Area, include_self: false };

    pub const DUEL: Scope = Scope::Duel { include_self: true };
    pub const DUEL_WITHOUT_SELF: Scope = Scope::Duel { include_self: false };
    pub const CLAN: Scope = Scope::Clan { include_self: true };

    /// Area of an explicit radius
    pub fn area(radius: u16, filter: AreaFilter) -> Scope {
        Scope::Area { radius: AreaRadius::Exact(radius), filter }
    }

    /// Area-style deliveries get hidden-anchor suppression and the disguise copy
    pub fn is_area_style(&self) -> bool {
        matches!(self, Scope::Area { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::AllClients => "all",
            Scope::AllSameMap => "same-map",
            Scope::Area { .. } => "area",
            Scope::ChatRoom { .. } => "chat",
            Scope::Party { .. } => "party",
            Scope::Guild { .. } => "guild",
            Scope::GuildNoBattleground => "guild-nobg",
            Scope::Battleground { .. } => "battleground",
            Scope::Duel { .. } => "duel",
            Scope::Clan { .. } => "clan",
            Scope::SelfOnly => "self",
        }
    }
}

//=== Predicates ===//

#[inline]
pub fn is_anchor(subject: &Unit, anchor: &Unit) -> bool {
    subject.id == anchor.id
}

#[inline]
pub fn same_map(subject: &Unit, anchor: &Unit) -> bool {
    subject.map == anchor.map
}

/// Subject stands in the box of `radius` around the anchor, on its map
pub fn within_area(subject: &Unit, anchor: &Unit, radius: u16) -> bool {
    same_map(subject, anchor) && AreaBox::around(anchor.pos, radius).contains(subject.pos)
}

/// Room a scope refers to when anchored on `anchor`
///
/// Player: the room it sits in. NPC: the room it owns.
#[inline]
pub fn anchor_chat(anchor: &Unit) -> Option<ChatId> {
    anchor.chat
}

/// Subject is seated in `chat`
#[inline]
pub fn in_chat(subject: &Unit, chat: ChatId) -> bool {
    subject.is_player() && subject.chat == Some(chat)
}

/// Area exclusion rule
pub fn area_filter_admits(filter: AreaFilter, subject: &Unit, anchor: &Unit) -> bool {
    match filter {
        AreaFilter::Everyone => true,
        AreaFilter::WithoutSelf => !is_anchor(subject, anchor),
        AreaFilter::WithoutChatting => !is_anchor(subject, anchor) && subject.chat.is_none(),
        AreaFilter::WithoutSameChat => match anchor_chat(anchor) {
            Some(chat) => !in_chat(subject, chat),
            None => true,
        },
    }
}

/// Group reach rule
pub fn group_range_admits(range: GroupRange, subject: &Unit, anchor: &Unit, area_size: u16) -> bool {
    match range {
        GroupRange::Everywhere => true,
        GroupRange::SameMap => same_map(subject, anchor),
        GroupRange::Area => within_area(subject, anchor, area_size),
    }
}

/// Subject may see a broadcast anchored on a possibly hidden unit
pub fn perceives(subject: &Unit, anchor: &Unit) -> bool {
    !anchor.hidden || is_anchor(subject, anchor) || subject.sees_hidden()
}

#[inline]
pub fn in_party(subject: &Unit, party: PartyId) -> bool {
    subject.party() == Some(party)
}

#[inline]
pub fn in_guild(subject: &Unit, guild: GuildId) -> bool {
    subject.guild() == Some(guild)
}

#[inline]
pub fn in_battleground(subject: &Unit, bg: BattlegroundId) -> bool {
    subject.battleground() == Some(bg)
}

/// Not assigned to any battleground
#[inline]
pub fn outside_battleground(subject: &Unit) -> bool {
    subject.battleground().is_none()
}

#[inline]
pub fn in_duel(subject: &Unit, duel: DuelId) -> bool {
    subject.duel() == Some(duel)
}

#[inline]
pub fn in_clan(subject: &Unit, clan: ClanId) -> bool {
    subject.clan() == Some(clan)
}
