//! Blob stream parser.
//!
//! Turns the unbounded byte stream from the data port into validated
//! [`Frame`]s. Each call to [`DataStream::get_next_frame`] makes exactly one
//! parse attempt:
//!
//! ```text
//! SeekMagic -> ReadHeader -> ReadMetadata -> ReadBinary -> EmitFrame
//!     ^                                                        |
//!     +------------------------ any failure -------------------+
//! ```
//!
//! A call that does not start on the magic sequence fails after consuming
//! those four bytes; nothing after them is interpreted. Metadata is only
//! re-parsed when the change counter of segment 0 differs from the cached one.

use crate::error::StreamError;
use crate::frame::Frame;
use crate::transport::Transport;
use bytes::BytesMut;
use tracing::{debug, trace, warn};
use visionary_protocol::frame::{FrameHeader, MAGIC};
use visionary_protocol::{BinarySegment, BlobHeader, PlaneLayout, ProtocolError, XmlMetadata};

/// Parser position within a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    SeekMagic,
    ReadHeader,
    ReadMetadata,
    ReadBinary,
    EmitFrame,
}

/// Counters since the stream was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub rejected: u64,
    pub metadata_parses: u64,
    pub skipped_bytes: u64,
}

#[derive(Debug, Clone)]
struct CachedMetadata {
    change_counter: u32,
    metadata: XmlMetadata,
    layout: PlaneLayout,
}

/// Frame parser over one transport.
pub struct DataStream<T: Transport> {
    transport: T,
    state: ParserState,
    package: BytesMut,
    cached: Option<CachedMetadata>,
    verify_crc: bool,
    stats: StreamStats,
}

impl<T: Transport> DataStream<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ParserState::SeekMagic,
            package: BytesMut::new(),
            cached: None,
            verify_crc: true,
            stats: StreamStats::default(),
        }
    }

    pub fn with_verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    pub fn set_verify_crc(&mut self, verify: bool) {
        self.verify_crc = verify;
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Metadata from the most recent frame.
    pub fn metadata(&self) -> Option<&XmlMetadata> {
        self.cached.as_ref().map(|c| &c.metadata)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn close(&mut self) -> std::io::Result<()> {
        self.transport.shutdown()
    }

    /// Reads the next frame.
    ///
    /// On error the parser is back in [`ParserState::SeekMagic`]; a later
    /// call succeeds once the stream is positioned on a well-formed blob.
    pub fn get_next_frame(&mut self) -> Result<Frame, StreamError> {
        match self.parse_next() {
            Ok(frame) => {
                self.stats.frames += 1;
                self.state = ParserState::SeekMagic;
                trace!(
                    blob_id = frame.blob_id(),
                    frame_number = frame.frame_number(),
                    "frame decoded"
                );
                Ok(frame)
            }
            Err(e) => {
                warn!(state = ?self.state, error = %e, "frame rejected");
                self.stats.rejected += 1;
                self.state = ParserState::SeekMagic;
                Err(e)
            }
        }
    }

    fn parse_next(&mut self) -> Result<Frame, StreamError> {
        self.state = ParserState::SeekMagic;
        self.seek_magic()?;

        self.state = ParserState::ReadHeader;
        let mut length = [0u8; 4];
        self.transport.read(&mut length)?;
        let length = FrameHeader::parse_length(&length)?.length as usize;
        self.package.clear();
        self.package.resize(length, 0);
        self.transport.read(&mut self.package[..])?;

        let package = std::mem::take(&mut self.package);
        let result = self.decode_package(&package);
        self.package = package;
        result
    }

    fn seek_magic(&mut self) -> Result<(), StreamError> {
        let mut magic = [0u8; 4];
        self.transport.read(&mut magic)?;
        if magic != MAGIC {
            self.stats.skipped_bytes += magic.len() as u64;
            return Err(ProtocolError::InvalidMagic(magic).into());
        }
        Ok(())
    }

    fn decode_package(&mut self, package: &[u8]) -> Result<Frame, StreamError> {
        let header = BlobHeader::parse(package)?;

        self.state = ParserState::ReadMetadata;
        let layout = self.metadata_for(&header, package)?;

        self.state = ParserState::ReadBinary;
        let range = header
            .binary_range()
            .ok_or_else(|| ProtocolError::InvalidSegmentTable("no binary segment".into()))?;
        let segment = BinarySegment::parse(&package[range], &layout, self.verify_crc)?;

        self.state = ParserState::EmitFrame;
        let camera = self
            .cached
            .as_ref()
            .map(|c| c.metadata.camera)
            .ok_or(StreamError::MissingMetadata(header.metadata_change_counter()))?;
        Ok(Frame::new(header.blob_id, camera, segment))
    }

    /// Returns the plane layout, re-parsing metadata only on a new counter.
    fn metadata_for(
        &mut self,
        header: &BlobHeader,
        package: &[u8],
    ) -> Result<PlaneLayout, StreamError> {
        let counter = header.metadata_change_counter();
        if let Some(cached) = &self.cached {
            if cached.change_counter == counter {
                return Ok(cached.layout);
            }
        }

        let range = header
            .metadata_range()
            .ok_or(StreamError::MissingMetadata(counter))?;
        self.cached = None;
        let metadata = XmlMetadata::from_bytes(&package[range])?;
        let layout = metadata.plane_layout()?;
        self.stats.metadata_parses += 1;
        debug!(
            change_counter = counter,
            width = layout.width,
            height = layout.height,
            "metadata updated"
        );
        self.cached = Some(CachedMetadata {
            change_counter: counter,
            metadata,
            layout,
        });
        Ok(layout)
    }
}
