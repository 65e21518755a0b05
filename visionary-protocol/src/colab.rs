//! CoLa-B framing.
//!
//! ```text
//! +-------------+-------------+-----+-----------------+----------+
//! | 02 02 02 02 | length (BE) | 's' | command payload | checksum |
//! +-------------+-------------+-----+-----------------+----------+
//! ```
//!
//! `length` covers the `s` prefix and the command payload. The trailing
//! checksum byte is the XOR of those same bytes.

use crate::command::Command;
use crate::error::ProtocolError;
use crate::frame;
use bytes::{BufMut, BytesMut};

/// Prefix byte marking a binary CoLa payload.
pub const DIALECT_PREFIX: u8 = b's';

/// Size of the trailing checksum.
pub const CHECKSUM_SIZE: usize = 1;

/// XOR of all bytes.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encodes a complete command frame including checksum.
pub fn encode_command(command: &Command) -> Result<BytesMut, ProtocolError> {
    let body = command.encode();
    let mut payload = BytesMut::with_capacity(1 + body.len());
    payload.put_u8(DIALECT_PREFIX);
    payload.put_slice(&body);

    let mut buf = BytesMut::with_capacity(frame::FRAME_HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    frame::put_header(&mut buf, payload.len())?;
    buf.put_slice(&payload);
    buf.put_u8(checksum(&payload));
    Ok(buf)
}

/// Validates a received payload against its checksum and strips the prefix.
pub fn decode_answer(payload: &[u8], received_checksum: u8) -> Result<&[u8], ProtocolError> {
    let actual = checksum(payload);
    if actual != received_checksum {
        return Err(ProtocolError::ChecksumMismatch {
            expected: received_checksum,
            actual,
        });
    }
    match payload.split_first() {
        Some((&DIALECT_PREFIX, rest)) => Ok(rest),
        _ => Err(ProtocolError::MissingDialectPrefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;

    #[test]
    fn test_encode_command_layout() {
        let cmd = Command::invoke_method("PLAYSTART").unwrap();
        let encoded = encode_command(&cmd).unwrap();

        let header = FrameHeader::parse(&encoded[..8]).unwrap();
        assert_eq!(header.length, 13);
        assert_eq!(&encoded[8..21], b"sMN PLAYSTART");
        assert_eq!(encoded.len(), 8 + 13 + 1);
        assert_eq!(encoded[21], checksum(b"sMN PLAYSTART"));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x0F, 0xF0]), 0xFF);
        assert_eq!(checksum(&[0xAA, 0xAA]), 0);
    }

    #[test]
    fn test_decode_answer() {
        let payload = b"sRA DeviceIdent";
        let decoded = decode_answer(payload, checksum(payload)).unwrap();
        assert_eq!(decoded, b"RA DeviceIdent");
    }

    #[test]
    fn test_decode_answer_bad_checksum() {
        let payload = b"sRA 1";
        let result = decode_answer(payload, checksum(payload) ^ 0x01);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_answer_missing_prefix() {
        let payload = b"RA 1";
        let result = decode_answer(payload, checksum(payload));
        assert!(matches!(result, Err(ProtocolError::MissingDialectPrefix)));

        assert!(matches!(
            decode_answer(&[], 0),
            Err(ProtocolError::MissingDialectPrefix)
        ));
    }
}
