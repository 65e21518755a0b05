//! CoLa command requests and answers.
//!
//! The codec is framing-agnostic: CoLa-B and CoLa-2 wrap the same payloads.
//!
//! ```text
//! request:  RN|WN|MN <space> name [<space> parameters]
//! success:  RA|WA|AN <space> data
//! failure:  FA <u16 BE error code>
//! ```

use crate::error::{CoLaError, ProtocolError};
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum length of a variable or method name.
pub const MAX_NAME_LEN: usize = 64;

/// Shortest answer that can be parsed: `FA` plus a 2-byte code.
pub const MIN_ANSWER_LEN: usize = 4;

/// Kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    ReadVariable,
    WriteVariable,
    MethodInvocation,
}

impl CommandType {
    pub fn opcode(&self) -> &'static [u8; 2] {
        match self {
            CommandType::ReadVariable => b"RN",
            CommandType::WriteVariable => b"WN",
            CommandType::MethodInvocation => b"MN",
        }
    }

    /// The answer kind a well-behaved device replies with.
    pub fn expected_answer(&self) -> AnswerKind {
        match self {
            CommandType::ReadVariable => AnswerKind::ReadAnswer,
            CommandType::WriteVariable => AnswerKind::WriteAnswer,
            CommandType::MethodInvocation => AnswerKind::MethodAnswer,
        }
    }
}

/// Kind of answer received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerKind {
    ReadAnswer,
    WriteAnswer,
    MethodAnswer,
    /// Device reported a failure (`FA`).
    Failure,
    /// Nothing parseable was received.
    Invalid,
}

/// An outgoing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    command_type: CommandType,
    name: String,
    parameters: Bytes,
}

impl Command {
    /// Creates a command after validating its name.
    pub fn new(command_type: CommandType, name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty()
            || name.len() > MAX_NAME_LEN
            || !name.bytes().all(|b| b.is_ascii_graphic())
        {
            return Err(ProtocolError::InvalidCommandName(name));
        }
        Ok(Self {
            command_type,
            name,
            parameters: Bytes::new(),
        })
    }

    pub fn read_variable(name: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(CommandType::ReadVariable, name)
    }

    pub fn write_variable(name: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(CommandType::WriteVariable, name)
    }

    pub fn invoke_method(name: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(CommandType::MethodInvocation, name)
    }

    pub fn with_parameters(mut self, parameters: Bytes) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Bytes {
        &self.parameters
    }

    /// Encodes the request payload.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(4 + self.name.len() + self.parameters.len());
        buf.put_slice(self.command_type.opcode());
        buf.put_u8(b' ');
        buf.put_slice(self.name.as_bytes());
        if !self.parameters.is_empty() {
            buf.put_u8(b' ');
            buf.put_slice(&self.parameters);
        }
        buf
    }
}

/// Outcome of one command exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    kind: AnswerKind,
    error: CoLaError,
    payload: Bytes,
}

impl CommandResult {
    /// Parses an answer payload (already stripped of framing).
    pub fn parse(payload: &[u8]) -> Self {
        if payload.len() < MIN_ANSWER_LEN {
            return Self::failed(CoLaError::Unknown);
        }

        let kind = match &payload[0..2] {
            b"RA" => AnswerKind::ReadAnswer,
            b"WA" => AnswerKind::WriteAnswer,
            b"AN" => AnswerKind::MethodAnswer,
            b"FA" => {
                // both "FA<code>" and "FA <code>" are seen on the wire
                let code = match payload {
                    [_, _, b' ', hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
                    _ => u16::from_be_bytes([payload[2], payload[3]]),
                };
                return Self {
                    kind: AnswerKind::Failure,
                    error: CoLaError::from_device_code(code),
                    payload: Bytes::new(),
                };
            }
            _ => return Self::failed(CoLaError::Unknown),
        };

        if payload[2] != b' ' {
            return Self::failed(CoLaError::Unknown);
        }

        Self {
            kind,
            error: CoLaError::Ok,
            payload: Bytes::copy_from_slice(&payload[3..]),
        }
    }

    /// A result carrying only an error.
    pub fn failed(error: CoLaError) -> Self {
        Self {
            kind: AnswerKind::Invalid,
            error,
            payload: Bytes::new(),
        }
    }

    pub fn network_error() -> Self {
        Self::failed(CoLaError::NetworkError)
    }

    pub fn kind(&self) -> AnswerKind {
        self.kind
    }

    pub fn error(&self) -> CoLaError {
        self.error
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_ok()
    }

    /// Raw data following the answer tag.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Answer data with a leading echo of the request name removed.
    pub fn parameters(&self, request: &Command) -> &[u8] {
        let name = request.name().as_bytes();
        match self.payload.strip_prefix(name) {
            Some(rest) if rest.first() == Some(&b' ') => &rest[1..],
            Some([]) => &[],
            _ => &self.payload[..],
        }
    }

    /// Returns whether the answer kind matches what `request` expects.
    pub fn answers(&self, request: &Command) -> bool {
        self.kind == request.command_type().expected_answer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_read_variable() {
        let cmd = Command::read_variable("framePeriodTime").unwrap();
        assert_eq!(&cmd.encode()[..], b"RN framePeriodTime");
    }

    #[test]
    fn test_encode_with_parameters() {
        let cmd = Command::invoke_method("GetChallenge")
            .unwrap()
            .with_parameters(Bytes::from_static(&[0x03]));
        assert_eq!(&cmd.encode()[..], b"MN GetChallenge \x03");
    }

    #[test]
    fn test_invalid_names() {
        assert!(Command::read_variable("").is_err());
        assert!(Command::read_variable("two words").is_err());
        assert!(Command::read_variable("a".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(Command::read_variable("a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_success_answers() {
        for answer in [&b"RA 1234567890"[..], b"WA 1234567890", b"AN 1234567890"] {
            let result = CommandResult::parse(answer);
            assert_eq!(result.error(), CoLaError::Ok);
            assert_eq!(&result.payload()[..], b"1234567890");
        }
        assert_eq!(
            CommandResult::parse(b"RA 1").kind(),
            AnswerKind::ReadAnswer
        );
        assert_eq!(
            CommandResult::parse(b"AN 1").kind(),
            AnswerKind::MethodAnswer
        );
    }

    #[test]
    fn test_short_failure_answers() {
        assert_eq!(CommandResult::parse(b"FA5").error(), CoLaError::Unknown);
        assert_eq!(CommandResult::parse(b"FA ").error(), CoLaError::Unknown);
        assert_eq!(CommandResult::parse(b"").error(), CoLaError::Unknown);
    }

    #[test]
    fn test_failure_answer_with_code() {
        let result = CommandResult::parse(b"FA\x00\x04");
        assert_eq!(result.error(), CoLaError::LocalConditionFailed);
        assert_eq!(result.kind(), AnswerKind::Failure);
        assert!(result.payload().is_empty());
    }

    #[test]
    fn test_failure_answer_with_space() {
        let result = CommandResult::parse(b"FA \x00\x04");
        assert_eq!(result.error(), CoLaError::LocalConditionFailed);
        assert_eq!(result.kind(), AnswerKind::Failure);

        let result = CommandResult::parse(b"FA \x00\x0D");
        assert_eq!(result.error(), CoLaError::from_device_code(13));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(CommandResult::parse(b"FB 12").error(), CoLaError::Unknown);
        assert_eq!(CommandResult::parse(b"RAxx").error(), CoLaError::Unknown);
    }

    #[test]
    fn test_parameters_strip_echo() {
        let request = Command::read_variable("DeviceIdent").unwrap();
        let result = CommandResult::parse(b"RA DeviceIdent \x00\x01A");
        assert_eq!(result.parameters(&request), b"\x00\x01A");
        assert!(result.answers(&request));

        let bare = CommandResult::parse(b"RA \x00\x01A");
        assert_eq!(bare.parameters(&request), b"\x00\x01A");

        let method = Command::invoke_method("PLAYSTART").unwrap();
        let result = CommandResult::parse(b"AN PLAYSTART");
        assert!(result.parameters(&method).is_empty());
        assert!(!result.answers(&request));
    }

    proptest! {
        #[test]
        fn prop_failure_codes_never_ok(code in 1u16..=u16::MAX) {
            let mut payload = b"FA".to_vec();
            payload.extend_from_slice(&code.to_be_bytes());
            let result = CommandResult::parse(&payload);
            prop_assert!(!result.is_ok());
            prop_assert_eq!(result.error().device_code(), Some(code));
        }

        #[test]
        fn prop_parse_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let result = CommandResult::parse(&payload);
            if payload.len() < MIN_ANSWER_LEN {
                prop_assert_eq!(result.error(), CoLaError::Unknown);
            }
        }
    }
}
