//! # Packet Descriptor Table
//!
//! Single source of truth mapping an inbound opcode to its frame shape, the
//! byte offsets its handler reads, and the handler itself.
//!
//! The table is filled once at startup (base definitions first, then version
//! overlays) and is read-only afterwards. Registering an opcode twice replaces
//! the earlier descriptor, which is how a newer client revision redefines an
//! opcode that an older one used for something else.
//!
//! The handler type is generic so the table carries no knowledge of sessions or
//! game state; the network layer instantiates it with its handler function type.

use crate::error::{ProtocolError, Result};
use crate::packets::{opcode_in_range, PacketAction, MAX_PACKET_DB, MAX_PACKET_POS, OPCODE_SIZE};

/// Frame length of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// Every frame has exactly this many bytes, opcode included
    Fixed(u16),
    /// Total length is carried in bytes 2-3 of the frame
    Variable,
}

impl FrameLength {
    /// Convert the classic table notation (`-1` = variable)
    pub fn from_raw(length: i32) -> Option<Self> {
        match length {
            -1 => Some(Self::Variable),
            n if (0..=u16::MAX as i32).contains(&n) => Some(Self::Fixed(n as u16)),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable)
    }
}

/// Descriptor of one inbound opcode
#[derive(Debug, Clone)]
pub struct PacketDescriptor<H> {
    pub opcode: u16,
    pub length: FrameLength,
    pub action: PacketAction,
    /// Byte offsets of the fields the handler reads, in declaration order
    pub offsets: Vec<u16>,
    /// `None` when no game logic is bound; the frame is still framed and consumed
    pub handler: Option<H>,
}

/// Opcode-indexed descriptor registry
pub struct PacketTable<H> {
    slots: Vec<Option<PacketDescriptor<H>>>,
    registered: usize,
}

impl<H> PacketTable<H> {
    /// Create an empty table covering the whole opcode range
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None)
                .take(MAX_PACKET_DB as usize + 1)
                .collect(),
            registered: 0,
        }
    }

    /// Register (or redefine) an opcode
    ///
    /// # Errors
    /// - opcode outside `[MIN_PACKET_DB, MAX_PACKET_DB]`
    /// - more than `MAX_PACKET_POS` field offsets
    /// - fixed length shorter than the opcode itself
    pub fn register(
        &mut self,
        opcode: u16,
        length: FrameLength,
        action: PacketAction,
        handler: Option<H>,
        offsets: &[u16],
    ) -> Result<()> {
        if !opcode_in_range(opcode) {
            return Err(ProtocolError::OpcodeOutOfRange(opcode));
        }

        if offsets.len() > MAX_PACKET_POS {
            return Err(ProtocolError::TooManyFieldOffsets {
                opcode,
                count: offsets.len(),
                max: MAX_PACKET_POS,
            });
        }

        if let FrameLength::Fixed(len) = length {
            if (len as usize) < OPCODE_SIZE {
                return Err(ProtocolError::InvalidFixedLength { opcode, length: len });
            }
            if let Some(&pos) = offsets.iter().find(|&&pos| pos >= len) {
                tracing::warn!("Packet 0x{:04x}: field offset {} beyond fixed length {}", opcode, pos, len);
            }
        }

        let slot = &mut self.slots[opcode as usize];
        match slot {
            Some(previous) => {
                tracing::debug!("Packet 0x{:04x} redefined: {} -> {}",
                    opcode, previous.action.as_str(), action.as_str());
            }
            None => self.registered += 1,
        }

        *slot = Some(PacketDescriptor {
            opcode,
            length,
            action,
            offsets: offsets.to_vec(),
            handler,
        });

        Ok(())
    }

    /// Look up the descriptor for an opcode
    #[inline]
    pub fn lookup(&self, opcode: u16) -> Option<&PacketDescriptor<H>> {
        if !opcode_in_range(opcode) {
            return None;
        }
        self.slots.get(opcode as usize).and_then(|slot| slot.as_ref())
    }

    /// Number of registered opcodes
    pub fn len(&self) -> usize {
        self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered == 0
    }

    /// Iterate registered descriptors in opcode order
    pub fn iter(&self) -> impl Iterator<Item = &PacketDescriptor<H>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// First opcode currently bound to an action
    pub fn opcode_for(&self, action: PacketAction) -> Option<u16> {
        self.iter().find(|d| d.action == action).map(|d| d.opcode)
    }
}

impl<H> Default for PacketTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
