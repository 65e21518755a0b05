//! # visionary-client
//!
//! Blocking client for Visionary time-of-flight cameras.
//!
//! This crate provides:
//! - Transport contract with TCP and scripted mock implementations
//! - CoLa-B / CoLa-2 protocol handler with session management
//! - Device control (login, acquisition, variables and methods)
//! - Resynchronizing blob stream parser producing [`Frame`]s
//! - Camera façade and YAML/env configuration

pub mod camera;
pub mod config;
pub mod control;
pub mod error;
pub mod frame;
pub mod handler;
pub mod session;
pub mod stream;
pub mod transport;

pub use camera::Camera;
pub use config::{CameraConfig, LoginAttempt};
pub use control::{Control, DeviceIdent};
pub use error::{ClientError, ConfigError, StreamError};
pub use frame::Frame;
pub use handler::{Framing, ProtocolHandler};
pub use session::Session;
pub use stream::{DataStream, ParserState, StreamStats};
pub use transport::{MockTransport, TcpTransport, Transport};
pub use visionary_protocol::auth::UserLevel;
