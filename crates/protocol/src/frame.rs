//! # Inbound Frame Reader
//!
//! A [`Frame`] is one complete inbound message together with the field offsets
//! its descriptor declares. Handlers read fields by declaration index instead of
//! computing byte offsets themselves; every read is bounds-checked against the
//! frame.

use crate::error::{ProtocolError, Result};

/// One complete inbound frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    opcode: u16,
    bytes: &'a [u8],
    offsets: &'a [u16],
}

impl<'a> Frame<'a> {
    pub fn new(opcode: u16, bytes: &'a [u8], offsets: &'a [u16]) -> Self {
        Self { opcode, bytes, offsets }
    }

    /// Decoded opcode (after de-obfuscation)
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Whole frame including the header
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.offsets.len()
    }

    /// Byte offset of a declared field
    pub fn offset(&self, index: usize) -> Result<usize> {
        self.offsets
            .get(index)
            .map(|&pos| pos as usize)
            .ok_or(ProtocolError::UndeclaredField {
                index,
                declared: self.offsets.len(),
            })
    }

    fn slice_at(&self, offset: usize, width: usize) -> Result<&'a [u8]> {
        self.bytes
            .get(offset..offset.saturating_add(width))
            .filter(|s| s.len() == width)
            .ok_or(ProtocolError::FieldOutOfFrame {
                offset,
                width,
                frame_len: self.bytes.len(),
            })
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.slice_at(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice_at(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice_at(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.u32_at(offset)? as i32)
    }

    pub fn field_u8(&self, index: usize) -> Result<u8> {
        self.u8_at(self.offset(index)?)
    }

    pub fn field_u16(&self, index: usize) -> Result<u16> {
        self.u16_at(self.offset(index)?)
    }

    pub fn field_u32(&self, index: usize) -> Result<u32> {
        self.u32_at(self.offset(index)?)
    }

    pub fn field_i32(&self, index: usize) -> Result<i32> {
        self.i32_at(self.offset(index)?)
    }

    /// Fixed-width byte field
    pub fn field_bytes(&self, index: usize, width: usize) -> Result<&'a [u8]> {
        self.slice_at(self.offset(index)?, width)
    }

    /// Everything from a declared field to the end of the frame
    pub fn field_tail(&self, index: usize) -> Result<&'a [u8]> {
        let offset = self.offset(index)?;
        self.bytes.get(offset..).ok_or(ProtocolError::FieldOutOfFrame {
            offset,
            width: 0,
            frame_len: self.bytes.len(),
        })
    }

    /// NUL-terminated string field running to the end of the frame
    pub fn field_string(&self, index: usize) -> Result<String> {
        let raw = self.field_tail(index)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Packed cell coordinates (3 bytes: 10-bit x, 10-bit y, 4-bit direction)
    pub fn field_position(&self, index: usize) -> Result<(i16, i16, u8)> {
        let b = self.field_bytes(index, 3)?;
        let x = ((b[0] as i16) << 2) | ((b[1] >> 6) as i16);
        let y = (((b[1] & 0x3f) as i16) << 4) | ((b[2] >> 4) as i16);
        let dir = b[2] & 0x0f;
        Ok((x, y, dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_reads() {
        let bytes = [0x72, 0x00, 0x01, 0x00, 0x00, 0x00, 0xd2, 0x04, 0x00, 0x00, 0x01];
        let frame = Frame::new(0x0072, &bytes, &[2, 6, 10]);

        assert_eq!(frame.field_u32(0).unwrap(), 1);
        assert_eq!(frame.field_i32(1).unwrap(), 1234);
        assert_eq!(frame.field_u8(2).unwrap(), 1);
        assert_eq!(frame.field_count(), 3);
    }

    #[test]
    fn test_field_out_of_frame() {
        let bytes = [0x7e, 0x00, 0x01];
        let frame = Frame::new(0x007e, &bytes, &[2]);
        assert!(matches!(frame.field_u32(0), Err(ProtocolError::FieldOutOfFrame { offset: 2, width: 4, .. })));
        assert!(matches!(frame.field_u8(1), Err(ProtocolError::UndeclaredField { index: 1, declared: 1 })));
    }

    #[test]
    fn test_string_field_stops_at_nul() {
        let mut bytes = vec![0x8c, 0x00, 0x0b, 0x00];
        bytes.extend_from_slice(b"hi\0xyz\0");
        let frame = Frame::new(0x008c, &bytes, &[2, 4]);
        assert_eq!(frame.field_u16(0).unwrap(), 11);
        assert_eq!(frame.field_string(1).unwrap(), "hi");
    }

    #[test]
    fn test_packed_position() {
        // x=150, y=200, dir=4
        let x: u32 = 150;
        let y: u32 = 200;
        let packed = [(x >> 2) as u8, (((x & 3) << 6) | (y >> 4)) as u8, (((y & 0xf) << 4) | 4) as u8];
        let mut bytes = vec![0x85, 0x00];
        bytes.extend_from_slice(&packed);
        let frame = Frame::new(0x0085, &bytes, &[2]);
        assert_eq!(frame.field_position(0).unwrap(), (150, 200, 4));
    }
}
