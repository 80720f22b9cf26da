//! # Outbound Encoders
//!
//! Builders for the server-to-client messages the bundled handlers emit. Each
//! returns a finished [`Packet`]; choosing recipients is the router's job.
//!
//! Where a message changed shape between client revisions, the layout is an
//! enum selected from the negotiated [`PacketVersion`] at runtime, so a single
//! binary can serve clients of different revisions.

use mapgate_core::{PacketVersion, Tick, TilePosition, UnitId};

use crate::error::Result;
use crate::packet_builder::{Packet, PacketWriter};
use crate::packets::out;

/// Width of a character name field
pub const NAME_LENGTH: usize = 24;

/// Build an accept-enter packet
///
/// # Purpose
/// Confirms the handshake and places the client on its spawn cell.
///
/// # Packet Format
/// ```text
/// {0x0073}{u32 tick}{pos3 x,y,dir}{u8 5}{u8 5}               (11 bytes)
/// {0x02eb}{u32 tick}{pos3 x,y,dir}{u8 5}{u8 5}{u16 font}     (13 bytes)
/// ```
pub fn accept_enter(version: PacketVersion, tick: Tick, pos: TilePosition, dir: u8) -> Result<Packet> {
    let mut w = match AcceptEnterLayout::for_version(version) {
        AcceptEnterLayout::Classic => PacketWriter::fixed(out::ACCEPT_ENTER, 11)?,
        AcceptEnterLayout::WithFont => PacketWriter::fixed(out::ACCEPT_ENTER2, 13)?,
    };
    w.write_u32(tick as u32)?;
    w.write_position(pos.x, pos.y, dir)?;
    w.write_u8(5)?.write_u8(5)?;
    if AcceptEnterLayout::for_version(version) == AcceptEnterLayout::WithFont {
        w.write_u16(0)?;
    }
    w.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptEnterLayout {
    Classic,
    WithFont,
}

impl AcceptEnterLayout {
    pub fn for_version(version: PacketVersion) -> Self {
        if version.at_least(PacketVersion::V2008_09_10) {
            Self::WithFont
        } else {
            Self::Classic
        }
    }
}

/// Build a server time reply
///
/// # Packet Format
/// ```text
/// {0x007f}{u32 tick}
/// ```
pub fn notify_time(tick: Tick) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::NOTIFY_TIME, 6)?;
    w.write_u32(tick as u32)?;
    w.finish()
}

/// Build a unit move notification
///
/// # Packet Format
/// ```text
/// {0x0086}{i32 id}{pos6 from,to}{u32 tick}
/// ```
pub fn notify_move(id: UnitId, from: TilePosition, to: TilePosition, tick: Tick) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::NOTIFY_MOVE, 16)?;
    w.write_unit_id(id)?;
    w.write_position_pair((from.x, from.y), (to.x, to.y))?;
    w.write_u32(tick as u32)?;
    w.finish()
}

/// Build a facing change
///
/// # Packet Format
/// ```text
/// {0x009c}{i32 id}{u16 head}{u8 dir}
/// ```
pub fn change_direction(id: UnitId, head: u16, dir: u8) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::CHANGE_DIRECTION, 9)?;
    w.write_unit_id(id)?;
    w.write_u16(head)?.write_u8(dir)?;
    w.finish()
}

/// Reason a unit left view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VanishKind {
    OutOfSight = 0,
    Died = 1,
    LoggedOut = 2,
    Teleported = 3,
}

/// Build a vanish notification
///
/// # Packet Format
/// ```text
/// {0x0080}{i32 id}{u8 kind}
/// ```
pub fn vanish(id: UnitId, kind: VanishKind) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::NOTIFY_VANISH, 7)?;
    w.write_unit_id(id)?;
    w.write_u8(kind as u8)?;
    w.finish()
}

/// Build an emotion bubble
pub fn emotion(id: UnitId, kind: u8) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::EMOTION, 7)?;
    w.write_unit_id(id)?;
    w.write_u8(kind)?;
    w.finish()
}

/// Build a public chat line as seen by others
///
/// # Packet Format
/// ```text
/// {0x008d}{u16 len}{i32 id}{cstring "name : message"}
/// ```
pub fn notify_chat(id: UnitId, text: &str) -> Result<Packet> {
    let mut w = PacketWriter::variable(out::NOTIFY_CHAT);
    w.write_unit_id(id)?;
    w.write_cstr(text)?;
    w.finish()
}

/// Build the speaker's own echo of a public chat line
pub fn notify_playerchat(text: &str) -> Result<Packet> {
    let mut w = PacketWriter::variable(out::NOTIFY_PLAYERCHAT);
    w.write_cstr(text)?;
    w.finish()
}

/// Build a party chat line
///
/// # Packet Format
/// ```text
/// {0x0109}{u16 len}{i32 account}{cstring message}
/// ```
pub fn party_chat(id: UnitId, text: &str) -> Result<Packet> {
    let mut w = PacketWriter::variable(out::PARTY_CHAT);
    w.write_unit_id(id)?;
    w.write_cstr(text)?;
    w.finish()
}

/// Build a guild chat line
pub fn guild_chat(text: &str) -> Result<Packet> {
    let mut w = PacketWriter::variable(out::GUILD_CHAT);
    w.write_cstr(text)?;
    w.finish()
}

/// Build a chat-room departure notice
///
/// # Packet Format
/// ```text
/// {0x00dd}{u16 remaining}{char[24] name}{u8 kicked}
/// ```
pub fn chat_member_exit(remaining: u16, name: &str, kicked: bool) -> Result<Packet> {
    let mut w = PacketWriter::fixed(out::CHAT_MEMBER_EXIT, 29)?;
    w.write_u16(remaining)?;
    w.write_str_fixed(name, NAME_LENGTH)?;
    w.write_u8(kicked as u8)?;
    w.finish()
}

/// Party member HP bar layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyHpLayout {
    /// 16-bit values
    Short,
    /// 32-bit values
    Wide,
}

impl PartyHpLayout {
    pub fn for_version(version: PacketVersion) -> Self {
        if version.at_least(PacketVersion::V2017_05_02) {
            Self::Wide
        } else {
            Self::Short
        }
    }
}

/// Build a party member HP update
///
/// # Packet Format
/// ```text
/// Short: {0x0106}{i32 id}{u16 hp}{u16 max}
/// Wide:  {0x080e}{i32 id}{u32 hp}{u32 max}
/// ```
///
/// # Notes
/// Short clients cannot show more than 65535; larger values are scaled to a
/// percentage of 100 so the bar stays proportional.
pub fn party_hp(version: PacketVersion, id: UnitId, hp: u32, max_hp: u32) -> Result<Packet> {
    match PartyHpLayout::for_version(version) {
        PartyHpLayout::Short => {
            let (hp, max_hp) = if max_hp > u16::MAX as u32 {
                let pct = (hp as u64 * 100 / max_hp as u64) as u16;
                (pct, 100)
            } else {
                (hp as u16, max_hp as u16)
            };
            let mut w = PacketWriter::fixed(out::PARTY_HP, 10)?;
            w.write_unit_id(id)?;
            w.write_u16(hp)?.write_u16(max_hp)?;
            w.finish()
        }
        PartyHpLayout::Wide => {
            let mut w = PacketWriter::fixed(out::PARTY_HP_R2, 14)?;
            w.write_unit_id(id)?;
            w.write_u32(hp)?.write_u32(max_hp)?;
            w.finish()
        }
    }
}
