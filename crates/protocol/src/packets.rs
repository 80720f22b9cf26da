//! # Packet Actions and Framing Constants
//!
//! Inbound opcodes are not stable across client revisions: the same request
//! ("walk to cell") has lived under several opcodes over the years. The
//! descriptor table therefore records, next to each opcode, the logical
//! [`PacketAction`] it was defined for. Handlers are registered per action and
//! the dispatch loop recognises the handshake and client-ready frames by action,
//! never by number.
//!
//! ## Frame Layout
//!
//! ```text
//! fixed:    {u16 opcode}{payload...}                 (length from the table)
//! variable: {u16 opcode}{u16 total length}{payload}  (length counts all four header bytes)
//! ```
//!
//! All integers are little-endian.

/// Lowest opcode the descriptor table accepts
pub const MIN_PACKET_DB: u16 = 0x0064;

/// Highest opcode the descriptor table accepts
pub const MAX_PACKET_DB: u16 = 0x0CFF;

/// Maximum number of field offsets per descriptor
pub const MAX_PACKET_POS: usize = 20;

/// Size of the opcode field
pub const OPCODE_SIZE: usize = 2;

/// Size of the opcode plus length header of a variable frame
pub const VARIABLE_HEADER_SIZE: usize = 4;

/// Smallest legal declared length of a variable frame
pub const MIN_VARIABLE_FRAME: usize = VARIABLE_HEADER_SIZE;

/// Largest legal declared length of a variable frame
pub const MAX_VARIABLE_FRAME: usize = 32768;

/// Variable-length dump opcode every revision accepts
pub const DEBUG_OPCODE: u16 = MAX_PACKET_DB;

/// Check whether an opcode lies in the table's range
#[inline]
pub fn opcode_in_range(opcode: u16) -> bool {
    (MIN_PACKET_DB..=MAX_PACKET_DB).contains(&opcode)
}

/// Logical client request a descriptor is defined for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketAction {
    //=== Session ===//

    /// Map-server login (CZ_ENTER / CZ_ENTER2)
    ///
    /// # Fields
    /// account id, character id, login id, client tick, sex
    WantToConnection,

    /// Client finished loading the map and is ready to receive the world
    LoadEndAck,

    /// Client clock synchronisation request
    TickSend,

    /// Return to character select / respawn
    Restart,

    /// Request to leave the game
    QuitGame,

    //=== Movement ===//

    WalkToXY,
    ChangeDir,

    //=== Interaction ===//

    ActionRequest,
    TakeItem,
    UseSkillToId,
    NpcClicked,
    GetCharNameRequest,
    ReqClickBuyingStore,

    //=== Communication ===//

    GlobalMessage,
    PartyMessage,
    GuildMessage,
    CreateChatRoom,
    ChatAddMember,
    ChatLeave,

    /// Frame is logged as a hex dump and otherwise ignored
    Debug,
}

impl PacketAction {
    /// Actions that may run before the player is attached to the world
    pub const BEFORE_WORLD: &'static [PacketAction] = &[PacketAction::LoadEndAck];

    /// True for the handshake that attaches a player identity
    pub fn is_handshake(self) -> bool {
        self == PacketAction::WantToConnection
    }

    pub fn allowed_before_world(self) -> bool {
        Self::BEFORE_WORLD.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WantToConnection => "WantToConnection",
            Self::LoadEndAck => "LoadEndAck",
            Self::TickSend => "TickSend",
            Self::Restart => "Restart",
            Self::QuitGame => "QuitGame",
            Self::WalkToXY => "WalkToXY",
            Self::ChangeDir => "ChangeDir",
            Self::ActionRequest => "ActionRequest",
            Self::TakeItem => "TakeItem",
            Self::UseSkillToId => "UseSkillToId",
            Self::NpcClicked => "NpcClicked",
            Self::GetCharNameRequest => "GetCharNameRequest",
            Self::ReqClickBuyingStore => "ReqClickBuyingStore",
            Self::GlobalMessage => "GlobalMessage",
            Self::PartyMessage => "PartyMessage",
            Self::GuildMessage => "GuildMessage",
            Self::CreateChatRoom => "CreateChatRoom",
            Self::ChatAddMember => "ChatAddMember",
            Self::ChatLeave => "ChatLeave",
            Self::Debug => "Debug",
        }
    }
}

/// Server-to-client opcodes used by the bundled encoders
pub mod out {
    /// ZC_ACCEPT_ENTER
    pub const ACCEPT_ENTER: u16 = 0x0073;
    /// ZC_ACCEPT_ENTER2
    pub const ACCEPT_ENTER2: u16 = 0x02eb;
    /// ZC_NOTIFY_TIME
    pub const NOTIFY_TIME: u16 = 0x007f;
    /// ZC_NOTIFY_VANISH
    pub const NOTIFY_VANISH: u16 = 0x0080;
    /// ZC_NOTIFY_MOVE
    pub const NOTIFY_MOVE: u16 = 0x0086;
    /// ZC_NOTIFY_CHAT
    pub const NOTIFY_CHAT: u16 = 0x008d;
    /// ZC_NOTIFY_PLAYERCHAT
    pub const NOTIFY_PLAYERCHAT: u16 = 0x008e;
    /// ZC_CHANGE_DIRECTION
    pub const CHANGE_DIRECTION: u16 = 0x009c;
    /// ZC_EMOTION
    pub const EMOTION: u16 = 0x00c0;
    /// ZC_MEMBER_EXIT (chat room)
    pub const CHAT_MEMBER_EXIT: u16 = 0x00dd;
    /// ZC_NOTIFY_HP_TO_GROUPM
    pub const PARTY_HP: u16 = 0x0106;
    /// ZC_NOTIFY_CHAT_PARTY
    pub const PARTY_CHAT: u16 = 0x0109;
    /// ZC_GUILD_CHAT
    pub const GUILD_CHAT: u16 = 0x017f;
    /// ZC_NOTIFY_HP_TO_GROUPM_R2
    pub const PARTY_HP_R2: u16 = 0x080e;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_range() {
        assert!(!opcode_in_range(0x0063));
        assert!(opcode_in_range(MIN_PACKET_DB));
        assert!(opcode_in_range(MAX_PACKET_DB));
        assert!(!opcode_in_range(0xFFFF));
    }

    #[test]
    fn test_allow_list() {
        assert!(PacketAction::LoadEndAck.allowed_before_world());
        assert!(!PacketAction::WalkToXY.allowed_before_world());
        assert!(PacketAction::WantToConnection.is_handshake());
    }
}
