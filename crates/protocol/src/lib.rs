//! # mapgate Protocol Library
//!
//! Wire-level building blocks of the map-server protocol.
//!
//! ## Architecture
//!
//! ### 1. Packet Actions ([`packets`])
//! Framing constants and the logical [`PacketAction`] each inbound opcode is
//! defined for. Opcodes move between client revisions; actions do not.
//!
//! ### 2. Descriptor Table ([`table`])
//! Opcode-indexed registry of frame length, field offsets and handler.
//!
//! ### 3. Definitions ([`definitions`])
//! Base definition set plus per-revision overlays, applied oldest first.
//!
//! ### 4. Frames and Packets ([`frame`], [`packet_builder`])
//! Bounds-checked inbound field reader and outbound frame writer.
//!
//! ### 5. Obfuscation ([`obfuscation`])
//! Rolling XOR key applied to inbound opcodes by newer clients.
//!
//! ### 6. Encoders ([`encoders`])
//! Server-to-client messages used by the bundled game handlers, with layouts
//! selected by the negotiated [`mapgate_core::PacketVersion`].
//!
//! ## Wire Format
//!
//! All integers are little-endian. A frame starts with a `u16` opcode; variable
//! frames follow it with a `u16` total length that counts the whole frame.

pub mod error;
pub mod packets;
pub mod table;
pub mod definitions;
pub mod frame;
pub mod packet_builder;
pub mod obfuscation;
pub mod encoders;

// Re-export commonly used items
pub use error::*;
pub use packets::*;
pub use table::*;
pub use definitions::{build_table, definitions_for, PacketDefinition};
pub use frame::Frame;
pub use packet_builder::{Packet, PacketWriter};
pub use obfuscation::{OpcodeCipher, PacketKeys};
