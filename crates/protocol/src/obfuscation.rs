//! # Opcode Obfuscation
//!
//! Newer clients XOR every inbound opcode with a rolling key. Both sides start
//! from the same three constants and step the key once per frame:
//!
//! ```text
//! initial = k0 * k1 + k2
//! opcode  = raw ^ ((key >> 16) & 0x7fff)
//! next    = key * k1 + k2
//! ```
//!
//! All arithmetic wraps at 32 bits. The key must step only when a frame is
//! actually consumed; a truncated frame is decoded again on the next cycle
//! with the same key.

use mapgate_core::PacketVersion;
use serde::{Deserialize, Serialize};

/// The three obfuscation constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketKeys {
    pub k0: u32,
    pub k1: u32,
    pub k2: u32,
}

impl PacketKeys {
    pub const fn new(k0: u32, k1: u32, k2: u32) -> Self {
        Self { k0, k1, k2 }
    }

    /// Keys shipped with a client revision, if it obfuscates at all
    pub fn for_version(version: PacketVersion) -> Option<Self> {
        if version.at_least(PacketVersion::V2013_12_23) {
            Some(Self::new(0x631C_511C, 0x111C_111C, 0x111C_111C))
        } else {
            None
        }
    }

    /// All-zero keys mean "not configured"
    pub fn is_zero(&self) -> bool {
        self.k0 == 0 && self.k1 == 0 && self.k2 == 0
    }

    fn initial(&self) -> u32 {
        self.k0.wrapping_mul(self.k1).wrapping_add(self.k2)
    }
}

/// Per-connection rolling opcode key
#[derive(Debug, Clone)]
pub struct OpcodeCipher {
    keys: PacketKeys,
    key: u32,
}

impl OpcodeCipher {
    pub fn new(keys: PacketKeys) -> Self {
        Self {
            key: keys.initial(),
            keys,
        }
    }

    /// Decode a raw opcode with the current key (does not step)
    #[inline]
    pub fn decode(&self, raw: u16) -> u16 {
        raw ^ ((self.key >> 16) & 0x7fff) as u16
    }

    /// Encode an opcode the way a client would (does not step)
    #[inline]
    pub fn encode(&self, opcode: u16) -> u16 {
        self.decode(opcode)
    }

    /// Step the key after a frame was consumed
    #[inline]
    pub fn advance(&mut self) {
        self.key = self.key.wrapping_mul(self.keys.k1).wrapping_add(self.keys.k2);
    }

    pub fn current_key(&self) -> u32 {
        self.key
    }
}
