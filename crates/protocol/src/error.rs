//! Error types for the protocol crate

use mapgate_core::MapGateError;

/// Protocol-level error types
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Opcode outside the descriptor table range
    #[error("Packet 0x{0:04x} is out of packet db range")]
    OpcodeOutOfRange(u16),

    /// Too many field offsets for one descriptor
    #[error("Packet 0x{opcode:04x} declares {count} field offsets (max {max})")]
    TooManyFieldOffsets { opcode: u16, count: usize, max: usize },

    /// Fixed length cannot hold the opcode
    #[error("Packet 0x{opcode:04x} has invalid fixed length {length}")]
    InvalidFixedLength { opcode: u16, length: u16 },

    /// Writer ran past the frame bounds
    #[error("Packet 0x{opcode:04x} overflow: need {needed} bytes, {remaining} left")]
    WriterOverflow { opcode: u16, needed: usize, remaining: usize },

    /// Finished frame length differs from its fixed length
    #[error("Packet 0x{opcode:04x} length mismatch: wrote {written}, expected {expected}")]
    LengthMismatch { opcode: u16, written: usize, expected: usize },

    /// Field read outside the frame
    #[error("Field at offset {offset} (+{width}) outside frame of {frame_len} bytes")]
    FieldOutOfFrame { offset: usize, width: usize, frame_len: usize },

    /// Field index not declared for the frame
    #[error("Field #{index} not declared ({declared} offsets)")]
    UndeclaredField { index: usize, declared: usize },
}

impl From<ProtocolError> for MapGateError {
    fn from(err: ProtocolError) -> Self {
        MapGateError::Protocol(err.to_string())
    }
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
