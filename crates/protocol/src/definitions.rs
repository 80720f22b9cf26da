//! # Inbound Packet Definitions
//!
//! Definitions are grouped into a base set and version overlays. A table for a
//! given client revision is built by registering the base set and then every
//! overlay whose revision is not newer than the client's, oldest first. Later
//! registrations replace earlier ones for the same opcode.
//!
//! Lengths use the classic notation: a positive number is a fixed frame size,
//! `-1` marks a variable frame.

use crate::error::{ProtocolError, Result};
use crate::packets::{PacketAction, DEBUG_OPCODE};
use crate::table::{FrameLength, PacketTable};
use mapgate_core::PacketVersion;

/// One inbound packet definition
#[derive(Debug, Clone, Copy)]
pub struct PacketDefinition {
    pub opcode: u16,
    pub length: i32,
    pub action: PacketAction,
    pub offsets: &'static [u16],
}

const fn packet(opcode: u16, length: i32, action: PacketAction, offsets: &'static [u16]) -> PacketDefinition {
    PacketDefinition { opcode, length, action, offsets }
}

/// Definitions introduced by one client revision
#[derive(Debug)]
pub struct DefinitionSet {
    pub since: PacketVersion,
    pub packets: &'static [PacketDefinition],
}

use PacketAction::*;

pub static BASE: DefinitionSet = DefinitionSet {
    since: PacketVersion::BASE,
    packets: &[
        packet(0x0072, 19, WantToConnection, &[2, 6, 10, 14, 18]),
        packet(0x007d, 2, LoadEndAck, &[]),
        packet(0x007e, 6, TickSend, &[2]),
        packet(0x0085, 5, WalkToXY, &[2]),
        packet(0x0089, 7, ActionRequest, &[2, 6]),
        packet(0x008c, -1, GlobalMessage, &[2, 4]),
        packet(0x0090, 7, NpcClicked, &[2, 6]),
        packet(0x0094, 6, GetCharNameRequest, &[2]),
        packet(0x009b, 5, ChangeDir, &[2, 4]),
        packet(0x009f, 6, TakeItem, &[2]),
        packet(0x00b2, 3, Restart, &[2]),
        packet(0x00d5, -1, CreateChatRoom, &[2, 4, 6, 7, 15]),
        packet(0x00d9, 14, ChatAddMember, &[2, 6]),
        packet(0x00e3, 2, ChatLeave, &[]),
        packet(0x0108, -1, PartyMessage, &[2, 4]),
        packet(0x0113, 10, UseSkillToId, &[2, 4, 6]),
        packet(0x017e, -1, GuildMessage, &[2, 4]),
        packet(0x018a, 4, QuitGame, &[2]),
        packet(DEBUG_OPCODE, -1, Debug, &[2, 4]),
    ],
};

/// Overlays in ascending revision order
pub static OVERLAYS: &[DefinitionSet] = &[
    DefinitionSet {
        since: PacketVersion::V2008_09_10,
        packets: &[
            packet(0x0436, 19, WantToConnection, &[2, 6, 10, 14, 18]),
        ],
    },
    DefinitionSet {
        since: PacketVersion::V2009_09_22,
        packets: &[
            packet(0x035f, 5, WalkToXY, &[2]),
            packet(0x0360, 6, TickSend, &[2]),
            packet(0x0361, 5, ChangeDir, &[2, 4]),
            packet(0x0362, 6, TakeItem, &[2]),
            packet(0x0437, 7, ActionRequest, &[2, 6]),
            packet(0x0438, 10, UseSkillToId, &[2, 4, 6]),
        ],
    },
    DefinitionSet {
        since: PacketVersion::V2013_12_23,
        packets: &[
            packet(0x0369, 7, ActionRequest, &[2, 6]),
            packet(0x083c, 10, UseSkillToId, &[2, 4, 6]),
            packet(0x0437, 5, WalkToXY, &[2]),
            packet(0x035f, 6, TickSend, &[2]),
            packet(0x0202, 5, ChangeDir, &[2, 4]),
            packet(0x07e4, 6, TakeItem, &[2]),
            packet(0x0360, 6, ReqClickBuyingStore, &[2]),
        ],
    },
];

/// All definitions that apply to `version`, in registration order
pub fn definitions_for(version: PacketVersion) -> impl Iterator<Item = &'static PacketDefinition> {
    std::iter::once(&BASE)
        .chain(OVERLAYS.iter().filter(move |set| version.at_least(set.since)))
        .flat_map(|set| set.packets.iter())
}

/// Build a descriptor table for a client revision
///
/// `resolve` maps each definition's action to the handler that should run for
/// it; actions without game logic resolve to `None`.
pub fn build_table<H, F>(version: PacketVersion, mut resolve: F) -> Result<PacketTable<H>>
where
    F: FnMut(PacketAction) -> Option<H>,
{
    let mut table = PacketTable::new();

    for def in definitions_for(version) {
        let length = FrameLength::from_raw(def.length).ok_or(ProtocolError::InvalidFixedLength {
            opcode: def.opcode,
            length: 0,
        })?;
        table.register(def.opcode, length, def.action, resolve(def.action), def.offsets)?;
    }

    tracing::info!("Packet table for version {}: {} opcodes", version, table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_table(version: PacketVersion) -> PacketTable<PacketAction> {
        build_table(version, Some).unwrap()
    }

    #[test]
    fn test_overlays_are_ascending() {
        let versions: Vec<_> = OVERLAYS.iter().map(|set| set.since).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_base_table() {
        let table = action_table(PacketVersion::BASE);
        assert_eq!(table.len(), BASE.packets.len());
        assert_eq!(table.lookup(0x0072).unwrap().action, WantToConnection);
        assert!(table.lookup(0x0436).is_none());
        assert!(table.lookup(0x008c).unwrap().length.is_variable());
    }

    #[test]
    fn test_overlay_redefines_opcode() {
        let table = action_table(PacketVersion::V2009_09_22);
        let desc = table.lookup(0x0437).unwrap();
        assert_eq!(desc.action, ActionRequest);
        assert_eq!(desc.length, FrameLength::Fixed(7));

        let table = action_table(PacketVersion::V2013_12_23);
        let desc = table.lookup(0x0437).unwrap();
        assert_eq!(desc.action, WalkToXY);
        assert_eq!(desc.length, FrameLength::Fixed(5));
        assert_eq!(desc.handler, Some(WalkToXY));

        assert_eq!(table.lookup(0x035f).unwrap().action, TickSend);
        assert_eq!(table.lookup(0x0360).unwrap().action, ReqClickBuyingStore);
    }

    #[test]
    fn test_older_opcodes_survive_overlays() {
        let table = action_table(PacketVersion::V2013_12_23);
        assert_eq!(table.lookup(0x0072).unwrap().action, WantToConnection);
        assert_eq!(table.lookup(0x0436).unwrap().action, WantToConnection);
    }

    #[test]
    fn test_debug_opcode_in_every_revision() {
        for version in [PacketVersion::BASE, PacketVersion::V2009_09_22, PacketVersion::V2013_12_23] {
            let table = action_table(version);
            let desc = table.lookup(DEBUG_OPCODE).unwrap();
            assert_eq!(desc.action, Debug);
            assert!(desc.length.is_variable());
        }
    }

    #[test]
    fn test_unresolved_actions_have_no_handler() {
        let table: PacketTable<u8> =
            build_table(PacketVersion::BASE, |action| (action == LoadEndAck).then_some(1)).unwrap();
        assert_eq!(table.lookup(0x007d).unwrap().handler, Some(1));
        assert!(table.lookup(0x007e).unwrap().handler.is_none());
    }
}
