//! Client error types.

use std::path::PathBuf;
use thiserror::Error;
use visionary_protocol::{CoLaError, ProtocolError};

/// Errors from control operations and the camera façade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("command {command} failed: {error}")]
    Command { command: String, error: CoLaError },

    #[error("could not open session")]
    SessionFailed,

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("unexpected answer to {0}")]
    UnexpectedAnswer(String),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Returns whether retrying on a fresh connection may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::NotConnected => true,
            ClientError::Command { error, .. } => {
                error.is_transport() || *error == CoLaError::MethodInServerBusy
            }
            ClientError::Stream(e) => e.is_transport(),
            _ => false,
        }
    }
}

/// Errors from the blob stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no metadata available for change counter {0}")]
    MissingMetadata(u32),
}

impl StreamError {
    /// Returns whether the failure came from the transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, StreamError::Io(_))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let io = ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert!(io.is_retryable());

        let busy = ClientError::Command {
            command: "PLAYSTART".into(),
            error: CoLaError::MethodInServerBusy,
        };
        assert!(busy.is_retryable());

        let denied = ClientError::Command {
            command: "PLAYSTART".into(),
            error: CoLaError::MethodInAccessDenied,
        };
        assert!(!denied.is_retryable());
        assert!(!ClientError::LoginFailed("x".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ClientError::Command {
            command: "DeviceIdent".into(),
            error: CoLaError::VariableUnknownIndex,
        };
        assert_eq!(
            err.to_string(),
            "command DeviceIdent failed: VARIABLE_UNKNOWN_INDEX"
        );

        let err = ConfigError::ParseError(PathBuf::from("camera.yaml"), "bad".into());
        assert!(err.to_string().contains("camera.yaml"));

        let err = StreamError::MissingMetadata(3);
        assert!(err.to_string().contains('3'));
    }
}
