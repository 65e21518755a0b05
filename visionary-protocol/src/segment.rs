//! Binary data segment (segment 1 of a blob).
//!
//! ```text
//! +----------+-----------+---------+------------------------------+
//! | len (LE) | timestamp | version | ext header                   |
//! | 4        | 8 (LE)    | 2 (LE)  | frame no. 4 (LE), quality 1, |
//! |          |           |         | status 1                     |
//! +----------+-----------+---------+------------------------------+
//! | planes: distance, intensity, confidence (u16 LE each)         |
//! +----------------------------+----------------------------------+
//! | crc32c of planes (LE)      | len repeat (LE)                  |
//! +----------------------------+----------------------------------+
//! ```
//!
//! The length fields are little-endian while everything in the blob header
//! is big-endian; this matches what devices send.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Bytes in a binary segment that are not plane data.
pub const BINARY_OVERHEAD: usize = 4 + 8 + 2 + 6 + 4 + 4;

const BYTES_PER_PIXEL: usize = 2;

/// Which planes are present and their size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    pub distance: bool,
    pub intensity: bool,
    pub confidence: bool,
}

impl PlaneLayout {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn plane_count(&self) -> usize {
        [self.distance, self.intensity, self.confidence]
            .iter()
            .filter(|p| **p)
            .count()
    }

    /// Total plane bytes in a segment with this layout.
    pub fn plane_bytes(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL * self.plane_count()
    }
}

/// Decoded binary segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySegment {
    pub timestamp: u64,
    pub version: u16,
    pub frame_number: u32,
    pub quality: u8,
    pub status: u8,
    pub distance: Vec<u16>,
    pub intensity: Vec<u16>,
    pub confidence: Vec<u16>,
    /// CRC as received (or as computed by `encode`).
    pub crc: u32,
}

impl BinarySegment {
    /// Parses and validates a segment against `layout`.
    pub fn parse(
        segment: &[u8],
        layout: &PlaneLayout,
        verify_crc: bool,
    ) -> Result<Self, ProtocolError> {
        if segment.len() < BINARY_OVERHEAD {
            return Err(ProtocolError::Truncated {
                what: "binary segment",
                needed: BINARY_OVERHEAD,
                available: segment.len(),
            });
        }

        let mut buf = segment;
        let declared = buf.get_u32_le() as usize;
        let present = segment.len() - BINARY_OVERHEAD;
        if declared != present {
            return Err(ProtocolError::LengthMismatch {
                what: "binary segment",
                declared,
                actual: present,
            });
        }
        let expected = layout.plane_bytes();
        if declared != expected {
            return Err(ProtocolError::LengthMismatch {
                what: "plane data",
                declared,
                actual: expected,
            });
        }

        let timestamp = buf.get_u64_le();
        let version = buf.get_u16_le();
        let frame_number = buf.get_u32_le();
        let quality = buf.get_u8();
        let status = buf.get_u8();

        let (planes, mut trailer) = buf.split_at(declared);
        let crc = trailer.get_u32_le();
        let repeat = trailer.get_u32_le() as usize;
        if repeat != declared {
            return Err(ProtocolError::LengthMismatch {
                what: "length repeat",
                declared,
                actual: repeat,
            });
        }

        if verify_crc {
            let actual = crc32c::crc32c(planes);
            if actual != crc {
                return Err(ProtocolError::CrcMismatch {
                    expected: crc,
                    actual,
                });
            }
        }

        let plane_len = layout.pixel_count() * BYTES_PER_PIXEL;
        let mut chunks = planes.chunks_exact(plane_len.max(1));
        let mut take = |present: bool| -> Vec<u16> {
            if !present {
                return Vec::new();
            }
            chunks.next().map(decode_plane).unwrap_or_default()
        };
        let distance = take(layout.distance);
        let intensity = take(layout.intensity);
        let confidence = take(layout.confidence);

        Ok(Self {
            timestamp,
            version,
            frame_number,
            quality,
            status,
            distance,
            intensity,
            confidence,
            crc,
        })
    }

    /// Encodes the segment, computing the CRC over the planes.
    pub fn encode(&self) -> Bytes {
        let pixels = self.distance.len() + self.intensity.len() + self.confidence.len();
        let mut planes = BytesMut::with_capacity(pixels * BYTES_PER_PIXEL);
        for plane in [&self.distance, &self.intensity, &self.confidence] {
            for v in plane.iter() {
                planes.put_u16_le(*v);
            }
        }
        let len = planes.len() as u32;

        let mut buf = BytesMut::with_capacity(planes.len() + BINARY_OVERHEAD);
        buf.put_u32_le(len);
        buf.put_u64_le(self.timestamp);
        buf.put_u16_le(self.version);
        buf.put_u32_le(self.frame_number);
        buf.put_u8(self.quality);
        buf.put_u8(self.status);
        buf.put_slice(&planes);
        buf.put_u32_le(crc32c::crc32c(&planes));
        buf.put_u32_le(len);
        buf.freeze()
    }
}

fn decode_plane(raw: &[u8]) -> Vec<u16> {
    raw.chunks_exact(BYTES_PER_PIXEL)
        .map(|px| u16::from_le_bytes([px[0], px[1]]))
        .collect()
}
