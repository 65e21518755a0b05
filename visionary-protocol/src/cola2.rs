//! CoLa-2 framing and session exchange.
//!
//! Request payloads start with a 6-byte header identifying the session:
//!
//! ```text
//! +-------------+------------+---------------------------+
//! | session id  | request id | command payload           |
//! | 4 bytes BE  | 2 bytes BE | see `command`             |
//! +-------------+------------+---------------------------+
//! ```
//!
//! Answers carry the bare command payload. A session is opened with `Ox`
//! and closed with `Cx`; the open answer carries exactly the 4-byte session id.

use crate::command::Command;
use crate::error::ProtocolError;
use crate::frame;
use crate::params::ParameterWriter;
use bytes::{BufMut, BytesMut};

/// Size of the session/request header preceding every request payload.
pub const REQUEST_HEADER_SIZE: usize = 6;

/// Session id used before a session is open.
pub const NO_SESSION: u32 = 0;

/// Size of a session-open answer payload.
pub const SESSION_ANSWER_LEN: usize = 4;

const OPEN_SESSION: &[u8; 2] = b"Ox";
const CLOSE_SESSION: &[u8; 2] = b"Cx";

/// Session and request identifiers sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestHeader {
    pub session_id: u32,
    pub request_id: u16,
}

impl RequestHeader {
    pub fn new(session_id: u32, request_id: u16) -> Self {
        Self {
            session_id,
            request_id,
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u32(self.session_id);
        buf.put_u16(self.request_id);
    }
}

/// Encodes a complete command frame.
pub fn encode_command(header: RequestHeader, command: &Command) -> Result<BytesMut, ProtocolError> {
    let body = command.encode();
    encode_with_header(header, &body)
}

/// Encodes a session-open frame.
pub fn encode_open_session(
    request_id: u16,
    timeout_secs: u8,
    client_id: &str,
) -> Result<BytesMut, ProtocolError> {
    let params = ParameterWriter::new()
        .bytes(OPEN_SESSION)
        .usint(timeout_secs)
        .flex_string(client_id)
        .finish();
    encode_with_header(RequestHeader::new(NO_SESSION, request_id), &params)
}

/// Encodes a session-close frame.
pub fn encode_close_session(header: RequestHeader) -> Result<BytesMut, ProtocolError> {
    encode_with_header(header, CLOSE_SESSION)
}

fn encode_with_header(header: RequestHeader, body: &[u8]) -> Result<BytesMut, ProtocolError> {
    let mut payload = BytesMut::with_capacity(REQUEST_HEADER_SIZE + body.len());
    header.put(&mut payload);
    payload.put_slice(body);
    frame::encode(&payload)
}

/// Extracts the session id from a session-open answer payload.
pub fn parse_session_answer(payload: &[u8]) -> Result<u32, ProtocolError> {
    let id: [u8; SESSION_ANSWER_LEN] =
        payload
            .try_into()
            .map_err(|_| ProtocolError::LengthMismatch {
                what: "session answer",
                declared: SESSION_ANSWER_LEN,
                actual: payload.len(),
            })?;
    let session_id = u32::from_be_bytes(id);
    if session_id == NO_SESSION {
        return Err(ProtocolError::NullSessionId);
    }
    Ok(session_id)
}

/// Converts a millisecond timeout to the whole seconds sent on the wire.
pub fn session_timeout_secs(timeout_ms: u32) -> u8 {
    let secs = timeout_ms.div_ceil(1000).clamp(1, u8::MAX as u32);
    secs as u8
}
