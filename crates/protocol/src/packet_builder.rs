//! # Packet Builder
//!
//! Typed writer for server-to-client frames.
//!
//! Encoders never compute byte offsets by hand: they open a [`PacketWriter`]
//! with the frame shape, append fields in order, and [`PacketWriter::finish`]
//! either patches the length header (variable frames) or checks that exactly
//! the declared number of bytes was written (fixed frames). Every write is
//! bounds-checked against the frame's capacity.
//!
//! ## Usage
//!
//! ```rust
//! use mapgate_protocol::packet_builder::PacketWriter;
//!
//! let mut w = PacketWriter::fixed(0x007f, 6).unwrap();
//! w.write_u32(123_456).unwrap();
//! let packet = w.finish().unwrap();
//! assert_eq!(packet.len(), 6);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use mapgate_core::UnitId;

use crate::error::{ProtocolError, Result};
use crate::packets::{MAX_VARIABLE_FRAME, OPCODE_SIZE, VARIABLE_HEADER_SIZE};
use crate::table::FrameLength;

/// Finished outbound frame
///
/// Owns its bytes, so it never refers into a session's output buffer. The
/// router still checks for aliasing because callers may build a packet from a
/// frozen slice of an output buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Bytes,
    /// Offset of the source unit's id, if the frame carries one
    identity_at: Option<usize>,
}

impl Packet {
    /// Wrap raw bytes that carry no identity field
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self { bytes, identity_at: None }
    }

    /// Wrap raw bytes with an identity field at `offset`
    pub fn with_identity(bytes: Bytes, offset: usize) -> Self {
        let identity_at = (offset + 4 <= bytes.len()).then_some(offset);
        Self { bytes, identity_at }
    }

    pub fn opcode(&self) -> u16 {
        match self.bytes.get(..OPCODE_SIZE) {
            Some(b) => u16::from_le_bytes([b[0], b[1]]),
            None => 0,
        }
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn identity_at(&self) -> Option<usize> {
        self.identity_at
    }

    /// Copy of this packet with the identity field replaced
    ///
    /// Packets without an identity field are returned unchanged.
    pub fn with_unit_id(&self, id: UnitId) -> Packet {
        match self.identity_at {
            Some(at) => {
                let mut copy = BytesMut::from(&self.bytes[..]);
                copy[at..at + 4].copy_from_slice(&id.get().to_le_bytes());
                Packet {
                    bytes: copy.freeze(),
                    identity_at: self.identity_at,
                }
            }
            None => self.clone(),
        }
    }
}

/// Bounds-checked frame writer
pub struct PacketWriter {
    opcode: u16,
    length: FrameLength,
    buf: BytesMut,
    capacity: usize,
    identity_at: Option<usize>,
}

impl PacketWriter {
    /// Start a fixed-length frame of `len` bytes, opcode included
    pub fn fixed(opcode: u16, len: u16) -> Result<Self> {
        if (len as usize) < OPCODE_SIZE {
            return Err(ProtocolError::InvalidFixedLength { opcode, length: len });
        }
        Ok(Self::open(opcode, FrameLength::Fixed(len), len as usize))
    }

    /// Start a variable-length frame; the length header is patched by `finish`
    pub fn variable(opcode: u16) -> Self {
        Self::open(opcode, FrameLength::Variable, MAX_VARIABLE_FRAME)
    }

    fn open(opcode: u16, length: FrameLength, capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(match length {
            FrameLength::Fixed(len) => len as usize,
            FrameLength::Variable => 64,
        });
        buf.put_u16_le(opcode);
        if length.is_variable() {
            buf.put_u16_le(0);
        }
        Self {
            opcode,
            length,
            buf,
            capacity,
            identity_at: None,
        }
    }

    /// Bytes written so far, header included
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    fn reserve(&self, needed: usize) -> Result<()> {
        let remaining = self.capacity - self.buf.len();
        if needed > remaining {
            return Err(ProtocolError::WriterOverflow {
                opcode: self.opcode,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<&mut Self> {
        self.reserve(1)?;
        self.buf.put_u8(v);
        Ok(self)
    }

    pub fn write_u16(&mut self, v: u16) -> Result<&mut Self> {
        self.reserve(2)?;
        self.buf.put_u16_le(v);
        Ok(self)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<&mut Self> {
        self.reserve(2)?;
        self.buf.put_i16_le(v);
        Ok(self)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<&mut Self> {
        self.reserve(4)?;
        self.buf.put_u32_le(v);
        Ok(self)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<&mut Self> {
        self.reserve(4)?;
        self.buf.put_i32_le(v);
        Ok(self)
    }

    /// Write a unit id and remember its offset as the frame's identity field
    pub fn write_unit_id(&mut self, id: UnitId) -> Result<&mut Self> {
        let at = self.buf.len();
        self.write_i32(id.get())?;
        self.identity_at = Some(at);
        Ok(self)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.reserve(data.len())?;
        self.buf.put_slice(data);
        Ok(self)
    }

    /// Write exactly `width` bytes: `data` truncated or zero-padded
    pub fn write_fixed_bytes(&mut self, data: &[u8], width: usize) -> Result<&mut Self> {
        self.reserve(width)?;
        let n = data.len().min(width);
        self.buf.put_slice(&data[..n]);
        self.buf.put_bytes(0, width - n);
        Ok(self)
    }

    /// Write a NUL-padded string field of `width` bytes (always terminated)
    pub fn write_str_fixed(&mut self, s: &str, width: usize) -> Result<&mut Self> {
        let bytes = s.as_bytes();
        let n = bytes.len().min(width.saturating_sub(1));
        self.write_fixed_bytes(&bytes[..n], width)
    }

    /// Write a NUL-terminated string
    pub fn write_cstr(&mut self, s: &str) -> Result<&mut Self> {
        self.reserve(s.len() + 1)?;
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        Ok(self)
    }

    /// Packed cell coordinates (10-bit x, 10-bit y, 4-bit direction)
    pub fn write_position(&mut self, x: i16, y: i16, dir: u8) -> Result<&mut Self> {
        let (x, y) = (x as u16 & 0x3ff, y as u16 & 0x3ff);
        self.write_bytes(&[
            (x >> 2) as u8,
            (((x & 0x3) << 6) | (y >> 4)) as u8,
            (((y & 0xf) << 4) as u8) | (dir & 0x0f),
        ])
    }

    /// Packed move coordinates (source and destination cells)
    pub fn write_position_pair(&mut self, from: (i16, i16), to: (i16, i16)) -> Result<&mut Self> {
        let (x0, y0) = (from.0 as u16 & 0x3ff, from.1 as u16 & 0x3ff);
        let (x1, y1) = (to.0 as u16 & 0x3ff, to.1 as u16 & 0x3ff);
        self.write_bytes(&[
            (x0 >> 2) as u8,
            (((x0 & 0x3) << 6) | (y0 >> 4)) as u8,
            (((y0 & 0xf) << 4) | (x1 >> 6)) as u8,
            (((x1 & 0x3f) << 2) | (y1 >> 8)) as u8,
            (y1 & 0xff) as u8,
            0x88,
        ])
    }

    /// Close the frame
    ///
    /// # Errors
    /// A fixed frame whose written size differs from its declared length.
    pub fn finish(mut self) -> Result<Packet> {
        match self.length {
            FrameLength::Fixed(len) => {
                if self.buf.len() != len as usize {
                    return Err(ProtocolError::LengthMismatch {
                        opcode: self.opcode,
                        written: self.buf.len(),
                        expected: len as usize,
                    });
                }
            }
            FrameLength::Variable => {
                let total = self.buf.len() as u16;
                self.buf[OPCODE_SIZE..VARIABLE_HEADER_SIZE].copy_from_slice(&total.to_le_bytes());
            }
        }

        Ok(Packet {
            bytes: self.buf.freeze(),
            identity_at: self.identity_at,
        })
    }
}
