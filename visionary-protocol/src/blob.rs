//! Blob package header and segment table.
//!
//! A blob package is everything after the outer magic + length:
//!
//! ```text
//! +---------+------+---------+----------+------------------------------+
//! | version | type | blob id | segments | segments x (offset, counter) |
//! | 2 (BE)  | 1    | 2 (BE)  | 2 (BE)   | 4 (BE) + 4 (BE) each         |
//! +---------+------+---------+----------+------------------------------+
//! ```
//!
//! Segment offsets are measured from the blob id field. Segment `i` spans
//! `offset[i]..offset[i + 1]`; segment 0 is the XML metadata, segment 1 the
//! binary data and the last segment a footer that is not interpreted.

use crate::error::ProtocolError;
use crate::{PACKAGE_TYPE_BLOB, PROTOCOL_VERSION};
use bytes::Buf;
use std::ops::Range;

/// Size of version + package type.
pub const PREAMBLE_SIZE: usize = 3;

/// Smallest usable segment count: metadata, binary data and footer.
pub const MIN_SEGMENTS: usize = 3;

const SEGMENT_ENTRY_SIZE: usize = 8;
const METADATA_SEGMENT: usize = 0;
const BINARY_SEGMENT: usize = 1;

/// One entry of the segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Offset from the blob id field.
    pub offset: u32,
    pub change_counter: u32,
}

/// Parsed package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub version: u16,
    pub package_type: u8,
    pub blob_id: u16,
    pub segments: Vec<SegmentEntry>,
}

impl BlobHeader {
    /// Validates version and package type.
    pub fn check_preamble(package: &[u8]) -> Result<(), ProtocolError> {
        if package.len() < PREAMBLE_SIZE {
            return Err(ProtocolError::Truncated {
                what: "blob preamble",
                needed: PREAMBLE_SIZE,
                available: package.len(),
            });
        }
        let mut buf = package;
        let version = buf.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let package_type = buf.get_u8();
        if package_type != PACKAGE_TYPE_BLOB {
            return Err(ProtocolError::UnexpectedPackageType(package_type));
        }
        Ok(())
    }

    /// Parses the header and segment table of a complete package.
    pub fn parse(package: &[u8]) -> Result<Self, ProtocolError> {
        Self::check_preamble(package)?;
        let mut buf = &package[PREAMBLE_SIZE..];
        if buf.remaining() < 4 {
            return Err(ProtocolError::Truncated {
                what: "blob header",
                needed: PREAMBLE_SIZE + 4,
                available: package.len(),
            });
        }
        let blob_id = buf.get_u16();
        let count = buf.get_u16() as usize;
        if count == 0 {
            return Err(ProtocolError::InvalidSegmentTable("no segments".into()));
        }
        if count < MIN_SEGMENTS {
            return Err(ProtocolError::InvalidSegmentTable(format!(
                "{} segments, need at least {}",
                count, MIN_SEGMENTS
            )));
        }

        let table_len = count * SEGMENT_ENTRY_SIZE;
        if buf.remaining() < table_len {
            return Err(ProtocolError::Truncated {
                what: "segment table",
                needed: table_len,
                available: buf.remaining(),
            });
        }
        let segments: Vec<SegmentEntry> = (0..count)
            .map(|_| SegmentEntry {
                offset: buf.get_u32(),
                change_counter: buf.get_u32(),
            })
            .collect();

        let header = Self {
            version: PROTOCOL_VERSION,
            package_type: PACKAGE_TYPE_BLOB,
            blob_id,
            segments,
        };
        header.validate_offsets(package.len())?;
        Ok(header)
    }

    fn validate_offsets(&self, package_len: usize) -> Result<(), ProtocolError> {
        let table_end = (4 + self.segments.len() * SEGMENT_ENTRY_SIZE) as u32;
        let body_len = package_len - PREAMBLE_SIZE;

        let mut previous = table_end;
        for (i, entry) in self.segments.iter().enumerate() {
            if entry.offset < previous {
                return Err(ProtocolError::InvalidSegmentTable(format!(
                    "segment {} offset {} precedes {}",
                    i, entry.offset, previous
                )));
            }
            if entry.offset as usize > body_len {
                return Err(ProtocolError::InvalidSegmentTable(format!(
                    "segment {} offset {} beyond package end {}",
                    i, entry.offset, body_len
                )));
            }
            previous = entry.offset;
        }
        Ok(())
    }

    /// Byte range of segment `index` within the package.
    ///
    /// Only segments followed by another table entry have a known end.
    pub fn segment_range(&self, index: usize) -> Option<Range<usize>> {
        let start = self.segments.get(index)?.offset as usize;
        let end = self.segments.get(index + 1)?.offset as usize;
        Some(PREAMBLE_SIZE + start..PREAMBLE_SIZE + end)
    }

    pub fn metadata_range(&self) -> Option<Range<usize>> {
        self.segment_range(METADATA_SEGMENT)
    }

    pub fn binary_range(&self) -> Option<Range<usize>> {
        self.segment_range(BINARY_SEGMENT)
    }

    /// Change counter of the metadata segment.
    pub fn metadata_change_counter(&self) -> u32 {
        self.segments
            .get(METADATA_SEGMENT)
            .map(|s| s.change_counter)
            .unwrap_or(0)
    }
}
