//! Outer frame shared by CoLa-B, CoLa-2 and the blob stream.
//!
//! ```text
//! +---------------------+--------------+-------------------+
//! | magic               | length (BE)  | payload           |
//! | 02 02 02 02         | 4 bytes      | length bytes      |
//! +---------------------+--------------+-------------------+
//! ```
//!
//! CoLa-B appends one checksum byte after the payload which is not counted
//! in `length`.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{BufMut, BytesMut};

/// Magic bytes starting every frame.
pub const MAGIC: [u8; 4] = [0x02, 0x02, 0x02, 0x02];

/// Size of magic plus length field.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Parsed magic + length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
}

impl FrameHeader {
    /// Validates the 4 magic bytes.
    pub fn check_magic(magic: &[u8]) -> Result<(), ProtocolError> {
        let magic: [u8; 4] = magic.try_into().map_err(|_| ProtocolError::Truncated {
            what: "magic",
            needed: MAGIC.len(),
            available: magic.len(),
        })?;
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }
        Ok(())
    }

    /// Parses the big-endian length field that follows the magic.
    pub fn parse_length(length: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; 4] = length.try_into().map_err(|_| ProtocolError::Truncated {
            what: "length field",
            needed: 4,
            available: length.len(),
        })?;
        let length = u32::from_be_bytes(bytes);
        if length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { length })
    }

    /// Parses a complete 8-byte prefix.
    pub fn parse(header: &[u8]) -> Result<Self, ProtocolError> {
        if header.len() < FRAME_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                what: "frame header",
                needed: FRAME_HEADER_SIZE,
                available: header.len(),
            });
        }
        Self::check_magic(&header[0..4])?;
        Self::parse_length(&header[4..8])
    }
}

/// Wraps `payload` into magic + length + payload.
pub fn encode(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    put_header(&mut buf, payload.len())?;
    buf.put_slice(payload);
    Ok(buf)
}

/// Writes magic + length for a payload of `len` bytes.
pub(crate) fn put_header(buf: &mut BytesMut, len: usize) -> Result<(), ProtocolError> {
    let len = u32::try_from(len)
        .ok()
        .filter(|l| *l <= MAX_PAYLOAD_SIZE)
        .ok_or(ProtocolError::FrameTooLarge {
            size: u32::try_from(len).unwrap_or(u32::MAX),
            max: MAX_PAYLOAD_SIZE,
        })?;
    buf.put_slice(&MAGIC);
    buf.put_u32(len);
    Ok(())
}
