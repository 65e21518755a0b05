//! Protocol error types and CoLa error codes.

use std::fmt;
use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 02020202, got {0:02x?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("unexpected package type: {0:#04x}")]
    UnexpectedPackageType(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid segment table: {0}")]
    InvalidSegmentTable(String),

    #[error("length mismatch in {what}: declared {declared}, actual {actual}")]
    LengthMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("unsupported pixel type {pixel_type:?} for {plane} plane")]
    UnsupportedPixelType {
        plane: &'static str,
        pixel_type: String,
    },

    #[error("missing CoLa-B dialect prefix")]
    MissingDialectPrefix,

    #[error("device returned the null session id")]
    NullSessionId,

    #[error("invalid command name: {0:?}")]
    InvalidCommandName(String),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,
}

/// Result of a CoLa exchange.
///
/// `Ok` through `ResultNotReady` are produced locally; the remaining
/// variants are codes reported by the device in an `FA` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoLaError {
    #[default]
    Ok,
    /// Malformed or unexpected payload or magic.
    Unknown,
    /// Short read/write or closed connection.
    NetworkError,
    /// A bounded wait was exceeded.
    Timeout,
    /// A non-blocking query found nothing yet.
    ResultNotReady,

    MethodInAccessDenied,
    MethodInUnknownIndex,
    VariableUnknownIndex,
    LocalConditionFailed,
    InvalidData,
    UnknownError,
    BufferOverflow,
    BufferUnderflow,
    ErrorUnknownType,
    VariableWriteAccessDenied,
    UnknownCmdForNameserver,
    UnknownColaCommand,
    MethodInServerBusy,
    FlexOutOfBounds,
    EventRegUnknownIndex,
    SessionNoResources,
    SessionUnknownId,
    /// Any other non-zero device code.
    Device(u16),
}

impl CoLaError {
    /// Maps a device error code from an `FA` answer.
    ///
    /// Code zero is not a valid failure code and maps to `Unknown`.
    pub fn from_device_code(code: u16) -> Self {
        match code {
            0 => CoLaError::Unknown,
            1 => CoLaError::MethodInAccessDenied,
            2 => CoLaError::MethodInUnknownIndex,
            3 => CoLaError::VariableUnknownIndex,
            4 => CoLaError::LocalConditionFailed,
            5 => CoLaError::InvalidData,
            6 => CoLaError::UnknownError,
            7 => CoLaError::BufferOverflow,
            8 => CoLaError::BufferUnderflow,
            9 => CoLaError::ErrorUnknownType,
            10 => CoLaError::VariableWriteAccessDenied,
            11 => CoLaError::UnknownCmdForNameserver,
            12 => CoLaError::UnknownColaCommand,
            13 => CoLaError::MethodInServerBusy,
            14 => CoLaError::FlexOutOfBounds,
            15 => CoLaError::EventRegUnknownIndex,
            33 => CoLaError::SessionNoResources,
            34 => CoLaError::SessionUnknownId,
            other => CoLaError::Device(other),
        }
    }

    /// Returns the device code for device-reported errors.
    pub fn device_code(&self) -> Option<u16> {
        let code = match self {
            CoLaError::Ok
            | CoLaError::Unknown
            | CoLaError::NetworkError
            | CoLaError::Timeout
            | CoLaError::ResultNotReady => return None,
            CoLaError::MethodInAccessDenied => 1,
            CoLaError::MethodInUnknownIndex => 2,
            CoLaError::VariableUnknownIndex => 3,
            CoLaError::LocalConditionFailed => 4,
            CoLaError::InvalidData => 5,
            CoLaError::UnknownError => 6,
            CoLaError::BufferOverflow => 7,
            CoLaError::BufferUnderflow => 8,
            CoLaError::ErrorUnknownType => 9,
            CoLaError::VariableWriteAccessDenied => 10,
            CoLaError::UnknownCmdForNameserver => 11,
            CoLaError::UnknownColaCommand => 12,
            CoLaError::MethodInServerBusy => 13,
            CoLaError::FlexOutOfBounds => 14,
            CoLaError::EventRegUnknownIndex => 15,
            CoLaError::SessionNoResources => 33,
            CoLaError::SessionUnknownId => 34,
            CoLaError::Device(code) => *code,
        };
        Some(code)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CoLaError::Ok)
    }

    /// Returns whether the failure happened below the command layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, CoLaError::NetworkError | CoLaError::Timeout)
    }
}

impl fmt::Display for CoLaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoLaError::Ok => write!(f, "OK"),
            CoLaError::Unknown => write!(f, "UNKNOWN"),
            CoLaError::NetworkError => write!(f, "NETWORK_ERROR"),
            CoLaError::Timeout => write!(f, "TIMEOUT"),
            CoLaError::ResultNotReady => write!(f, "RESULT_NOT_READY"),
            CoLaError::MethodInAccessDenied => write!(f, "METHOD_IN_ACCESS_DENIED"),
            CoLaError::MethodInUnknownIndex => write!(f, "METHOD_IN_UNKNOWN_INDEX"),
            CoLaError::VariableUnknownIndex => write!(f, "VARIABLE_UNKNOWN_INDEX"),
            CoLaError::LocalConditionFailed => write!(f, "LOCAL_CONDITION_FAILED"),
            CoLaError::InvalidData => write!(f, "INVALID_DATA"),
            CoLaError::UnknownError => write!(f, "UNKNOWN_ERROR"),
            CoLaError::BufferOverflow => write!(f, "BUFFER_OVERFLOW"),
            CoLaError::BufferUnderflow => write!(f, "BUFFER_UNDERFLOW"),
            CoLaError::ErrorUnknownType => write!(f, "ERROR_UNKNOWN_TYPE"),
            CoLaError::VariableWriteAccessDenied => write!(f, "VARIABLE_WRITE_ACCESS_DENIED"),
            CoLaError::UnknownCmdForNameserver => write!(f, "UNKNOWN_CMD_FOR_NAMESERVER"),
            CoLaError::UnknownColaCommand => write!(f, "UNKNOWN_COLA_COMMAND"),
            CoLaError::MethodInServerBusy => write!(f, "METHOD_IN_SERVER_BUSY"),
            CoLaError::FlexOutOfBounds => write!(f, "FLEX_OUT_OF_BOUNDS"),
            CoLaError::EventRegUnknownIndex => write!(f, "EVENTREG_UNKNOWN_INDEX"),
            CoLaError::SessionNoResources => write!(f, "SESSION_NO_RESOURCES"),
            CoLaError::SessionUnknownId => write!(f, "SESSION_UNKNOWN_ID"),
            CoLaError::Device(code) => write!(f, "DEVICE_ERROR({:#06x})", code),
        }
    }
}
