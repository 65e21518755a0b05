//! Protocol handler: one entry point for command exchange over either
//! CoLa-B or CoLa-2, plus CoLa-2 session management.

use crate::session::Session;
use crate::transport::Transport;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use visionary_protocol::cola2::{self, RequestHeader};
use visionary_protocol::colab;
use visionary_protocol::frame::{FrameHeader, FRAME_HEADER_SIZE, MAGIC};
use visionary_protocol::{CoLaError, Command, CommandResult};

/// Default client identifier sent when opening a session.
pub const DEFAULT_CLIENT_ID: &str = "visionary-rs";

/// Framing used on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    ColaB,
    #[default]
    Cola2,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::ColaB => write!(f, "colab"),
            Framing::Cola2 => write!(f, "cola2"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "colab" => Ok(Framing::ColaB),
            "cola2" => Ok(Framing::Cola2),
            _ => Err(format!("unknown framing: {}", s)),
        }
    }
}

/// Command exchange over one transport.
pub struct ProtocolHandler<T: Transport> {
    transport: T,
    framing: Framing,
    session: Option<Session>,
    request_id: u16,
    client_id: String,
}

impl<T: Transport> ProtocolHandler<T> {
    pub fn new(transport: T, framing: Framing) -> Self {
        Self {
            transport,
            framing,
            session: None,
            request_id: 0,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn next_request_id(&mut self) -> u16 {
        self.request_id = self.request_id.wrapping_add(1);
        self.request_id
    }

    fn session_id(&self) -> u32 {
        self.session
            .as_ref()
            .map(Session::id)
            .unwrap_or(cola2::NO_SESSION)
    }

    /// Sends a command and waits for its answer.
    ///
    /// Never fails: transport and parse problems are reported through
    /// [`CommandResult::error`].
    pub fn send(&mut self, command: &Command) -> CommandResult {
        let encoded = match self.framing {
            Framing::ColaB => colab::encode_command(command),
            Framing::Cola2 => {
                let header = RequestHeader::new(self.session_id(), self.next_request_id());
                cola2::encode_command(header, command)
            }
        };
        let encoded = match encoded {
            Ok(buf) => buf,
            Err(e) => {
                warn!(command = command.name(), error = %e, "failed to encode command");
                return CommandResult::failed(CoLaError::Unknown);
            }
        };

        if let Err(error) = self.send_frame(&encoded) {
            return CommandResult::failed(error);
        }

        let result = match self.recv_frame() {
            Ok(payload) => CommandResult::parse(&payload),
            Err(error) => CommandResult::failed(error),
        };
        debug!(
            framing = %self.framing,
            command = command.name(),
            result = %result.error(),
            "command exchange"
        );
        result
    }

    /// Opens a CoLa-2 session. Returns `false` on any failure.
    pub fn open_session(&mut self, timeout_ms: u32) -> bool {
        if self.framing == Framing::ColaB {
            debug!("CoLa-B has no sessions");
            return false;
        }

        let timeout_secs = cola2::session_timeout_secs(timeout_ms);
        let request_id = self.next_request_id();
        let encoded = match cola2::encode_open_session(request_id, timeout_secs, &self.client_id) {
            Ok(buf) => buf,
            Err(e) => {
                warn!(error = %e, "failed to encode session open");
                return false;
            }
        };
        if self.send_frame(&encoded).is_err() {
            return false;
        }

        let payload = match self.recv_frame() {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "no session answer");
                return false;
            }
        };
        match cola2::parse_session_answer(&payload) {
            Ok(id) => {
                debug!(session_id = id, timeout_secs, "session opened");
                self.session = Some(Session::new(
                    id,
                    Duration::from_secs(u64::from(timeout_secs)),
                ));
                true
            }
            Err(e) => {
                warn!(error = %e, "invalid session answer");
                false
            }
        }
    }

    /// Closes the current session.
    ///
    /// Idempotent. A transport failure still drops the local session and
    /// returns `false`.
    pub fn close_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return true;
        };

        let header = RequestHeader::new(session.id(), self.next_request_id());
        let encoded = match cola2::encode_close_session(header) {
            Ok(buf) => buf,
            Err(e) => {
                warn!(error = %e, "failed to encode session close");
                return false;
            }
        };
        if self.send_frame(&encoded).is_err() {
            return false;
        }
        match self.recv_frame() {
            Ok(_) => {
                debug!(
                    session_id = session.id(),
                    age_ms = session.age().as_millis() as u64,
                    "session closed"
                );
                true
            }
            Err(error) => {
                warn!(session_id = session.id(), %error, "session close unanswered");
                false
            }
        }
    }

    fn send_frame(&mut self, frame: &BytesMut) -> Result<(), CoLaError> {
        match self.transport.send(frame) {
            Ok(n) if n == frame.len() => Ok(()),
            Ok(n) => {
                warn!(sent = n, expected = frame.len(), "short send");
                Err(CoLaError::NetworkError)
            }
            Err(e) => {
                warn!(error = %e, "send failed");
                Err(io_error(&e))
            }
        }
    }

    /// Reads one framed answer and returns its codec payload.
    fn recv_frame(&mut self) -> Result<Vec<u8>, CoLaError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.transport
            .read(&mut header[..MAGIC.len()])
            .map_err(|e| io_error(&e))?;
        if FrameHeader::check_magic(&header[..MAGIC.len()]).is_err() {
            debug!(magic = ?&header[..MAGIC.len()], "invalid magic in answer");
            return Err(CoLaError::Unknown);
        }

        self.transport
            .read(&mut header[MAGIC.len()..])
            .map_err(|e| io_error(&e))?;
        let length = FrameHeader::parse_length(&header[MAGIC.len()..])
            .map_err(|_| CoLaError::Unknown)?
            .length as usize;
        if length == 0 {
            return Err(CoLaError::NetworkError);
        }

        let mut payload = vec![0u8; length];
        self.transport
            .read(&mut payload)
            .map_err(|e| io_error(&e))?;

        match self.framing {
            Framing::Cola2 => Ok(payload),
            Framing::ColaB => {
                let mut checksum = [0u8; colab::CHECKSUM_SIZE];
                self.transport
                    .read(&mut checksum)
                    .map_err(|e| io_error(&e))?;
                match colab::decode_answer(&payload, checksum[0]) {
                    Ok(body) => Ok(body.to_vec()),
                    Err(e) => {
                        debug!(error = %e, "rejected CoLa-B answer");
                        Err(CoLaError::Unknown)
                    }
                }
            }
        }
    }
}

/// Any transport failure, including a read timeout, is a network error.
fn io_error(err: &std::io::Error) -> CoLaError {
    debug!(error = %err, kind = ?err.kind(), "transport error");
    CoLaError::NetworkError
}
