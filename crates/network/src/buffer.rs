//! # Connection Buffers
//!
//! Per-connection inbound and outbound byte queues.
//!
//! The dispatch loop reads from the head of the inbound queue and consumes
//! whole frames; the router appends finished packets to the outbound queue,
//! which the transport drains once per tick. Both queues grow on demand.

use bytes::{Bytes, BytesMut};

/// Default initial capacity of each queue
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Inbound/outbound byte queues of one connection
#[derive(Debug)]
pub struct ConnectionBuffer {
    inbound: BytesMut,
    outbound: BytesMut,
}

impl ConnectionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: BytesMut::with_capacity(capacity),
            outbound: BytesMut::with_capacity(capacity),
        }
    }

    //=== Inbound ===//

    /// Unconsumed inbound bytes
    #[inline]
    pub fn bytes_available(&self) -> usize {
        self.inbound.len()
    }

    /// Inbound bytes at `offset..offset + len`, if all present
    #[inline]
    pub fn peek(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.inbound.get(offset..offset.checked_add(len)?)
    }

    /// Little-endian u16 at `offset`, if present
    #[inline]
    pub fn peek_u16_le(&self, offset: usize) -> Option<u16> {
        self.peek(offset, 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Remove `len` bytes from the head and return them
    ///
    /// Never takes more than is available.
    pub fn consume(&mut self, len: usize) -> Bytes {
        let len = len.min(self.inbound.len());
        self.inbound.split_to(len).freeze()
    }

    pub fn append_inbound(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    //=== Outbound ===//

    pub fn append_outbound(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Address the next outbound append would write to
    #[inline]
    pub fn outbound_tail_ptr(&self) -> *const u8 {
        self.outbound.as_ptr().wrapping_add(self.outbound.len())
    }

    #[cfg(test)]
    pub(crate) fn outbound_mut(&mut self) -> &mut BytesMut {
        &mut self.outbound
    }

    /// Drain everything queued for sending
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }
}

impl Default for ConnectionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_consume() {
        let mut buf = ConnectionBuffer::default();
        buf.append_inbound(&[0x00, 0x01, 0x06, 0x00, 0xAA, 0xBB]);

        assert_eq!(buf.bytes_available(), 6);
        assert_eq!(buf.peek_u16_le(0), Some(0x0100));
        assert_eq!(buf.peek_u16_le(2), Some(6));
        assert_eq!(buf.peek(4, 3), None);

        let frame = buf.consume(6);
        assert_eq!(&frame[..], &[0x00, 0x01, 0x06, 0x00, 0xAA, 0xBB]);
        assert_eq!(buf.bytes_available(), 0);
    }

    #[test]
    fn test_consume_is_clamped() {
        let mut buf = ConnectionBuffer::new(16);
        buf.append_inbound(&[1, 2, 3]);
        assert_eq!(buf.consume(10).len(), 3);
        assert_eq!(buf.bytes_available(), 0);
        assert!(buf.consume(4).is_empty());
    }

    #[test]
    fn test_outbound_grows_and_drains() {
        let mut buf = ConnectionBuffer::new(4);
        buf.append_outbound(&[1; 10]);
        buf.append_outbound(&[2; 10]);
        assert_eq!(buf.outbound_len(), 20);

        let drained = buf.take_outbound();
        assert_eq!(drained.len(), 20);
        assert_eq!(buf.outbound_len(), 0);
    }

    #[test]
    fn test_tail_pointer_tracks_length() {
        let mut buf = ConnectionBuffer::new(64);
        buf.append_outbound(&[0; 5]);
        let base = buf.outbound().as_ptr();
        assert_eq!(buf.outbound_tail_ptr(), base.wrapping_add(5));
    }
}
