//! Blob encoder for device simulators and tests.

use crate::blob::{MIN_SEGMENTS, PREAMBLE_SIZE};
use crate::error::ProtocolError;
use crate::frame;
use crate::metadata::XmlMetadata;
use crate::segment::BinarySegment;
use crate::{PACKAGE_TYPE_BLOB, PROTOCOL_VERSION};
use bytes::{BufMut, BytesMut};

/// Builds a complete blob frame: magic, length, header, XML, binary
/// segment and an empty footer.
#[derive(Debug, Clone)]
pub struct BlobEncoder {
    pub blob_id: u16,
    /// Change counter written for the metadata segment.
    pub change_counter: u32,
    pub metadata: XmlMetadata,
    pub segment: BinarySegment,
}

impl BlobEncoder {
    pub fn new(metadata: XmlMetadata, segment: BinarySegment) -> Self {
        Self {
            blob_id: 0,
            change_counter: 1,
            metadata,
            segment,
        }
    }

    pub fn with_blob_id(mut self, blob_id: u16) -> Self {
        self.blob_id = blob_id;
        self
    }

    pub fn with_change_counter(mut self, change_counter: u32) -> Self {
        self.change_counter = change_counter;
        self
    }

    /// Encodes the blob with the metadata rendered by [`XmlMetadata::to_xml`].
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let xml = self.metadata.to_xml()?;
        self.encode_with_xml(xml.as_bytes())
    }

    /// Encodes the blob with a caller-supplied metadata document.
    pub fn encode_with_xml(&self, xml: &[u8]) -> Result<BytesMut, ProtocolError> {
        let binary = self.segment.encode();

        let table_end = 4 + MIN_SEGMENTS * 8;
        let xml_offset = table_end;
        let binary_offset = xml_offset + xml.len();
        let footer_offset = binary_offset + binary.len();
        let offset = |value: usize| {
            u32::try_from(value).map_err(|_| ProtocolError::FrameTooLarge {
                size: u32::MAX,
                max: crate::MAX_PAYLOAD_SIZE,
            })
        };

        let mut package = BytesMut::with_capacity(PREAMBLE_SIZE + footer_offset);
        package.put_u16(PROTOCOL_VERSION);
        package.put_u8(PACKAGE_TYPE_BLOB);
        package.put_u16(self.blob_id);
        package.put_u16(MIN_SEGMENTS as u16);
        package.put_u32(offset(xml_offset)?);
        package.put_u32(self.change_counter);
        package.put_u32(offset(binary_offset)?);
        package.put_u32(0);
        package.put_u32(offset(footer_offset)?);
        package.put_u32(0);
        package.put_slice(xml);
        package.put_slice(&binary);

        frame::encode(&package)
    }
}
