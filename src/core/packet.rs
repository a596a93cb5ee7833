//! Byte-level packet building and parsing.
//!
//! [`PacketWriter`] grows a [`BytesMut`] with the wire's primitive field
//! types; [`PacketReader`] is the checked inverse. Readers never panic on
//! short input: every getter validates remaining length and reports a
//! malformed-message error instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::protocol::types::Position;

/// Outbound packet under construction.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    /// Current size in bytes. Used to mark the start of RSA-protected
    /// regions.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// u16-length-prefixed string. Oversized input is a caller bug; the
    /// session layer enforces the protocol's own text limits before this
    /// point, so the length is clamped defensively rather than panicking.
    pub fn put_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.buf.put_u16_le(len as u16);
        self.buf.put_slice(&bytes[..len]);
    }

    pub fn put_position(&mut self, position: Position) {
        self.buf.put_u16_le(position.x);
        self.buf.put_u16_le(position.y);
        self.buf.put_u8(position.z);
    }

    /// Zero padding used to fill RSA regions up to the cipher block size.
    pub fn put_padding(&mut self, count: usize) {
        self.buf.put_bytes(0, count);
    }

    /// Mutable view of the bytes from `start` to the current end, for
    /// in-place sealing of an RSA-protected region.
    pub fn region_mut(&mut self, start: usize) -> &mut [u8] {
        &mut self.buf[start..]
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Checked reader over a received frame.
#[derive(Debug)]
pub struct PacketReader {
    buf: Bytes,
}

impl PacketReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// True once the frame is fully consumed.
    pub fn is_exhausted(&self) -> bool {
        !self.buf.has_remaining()
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        if self.buf.remaining() < 1 {
            return Err(ProtocolError::truncated("u8"));
        }
        Ok(self.buf.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        if self.buf.remaining() < 2 {
            return Err(ProtocolError::truncated("u16"));
        }
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        if self.buf.remaining() < 4 {
            return Err(ProtocolError::truncated("u32"));
        }
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        if self.buf.remaining() < 8 {
            return Err(ProtocolError::truncated("u64"));
        }
        Ok(self.buf.get_u64_le())
    }

    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u16()? as usize;
        if self.buf.remaining() < len {
            return Err(ProtocolError::truncated("string body"));
        }
        let bytes = self.buf.split_to(len);
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ProtocolError::MalformedMessage("string is not valid UTF-8".into()))
    }

    pub fn get_position(&mut self) -> Result<Position> {
        Ok(Position {
            x: self.get_u16()?,
            y: self.get_u16()?,
            z: self.get_u8()?,
        })
    }
}
