//! # visionary-protocol
//!
//! Wire protocol implementation for Visionary time-of-flight cameras.
//!
//! This crate provides:
//! - CoLa command encoding and answer parsing (framing-agnostic)
//! - Typed big-endian parameter writer/reader
//! - CoLa-B and CoLa-2 framing helpers and the CoLa-2 session exchange
//! - Challenge/response login hashing
//! - Blob streaming: header, XML metadata and binary segment parsing
//! - A blob encoder for simulators and tests
//!
//! Nothing in this crate performs I/O.

pub mod auth;
pub mod blob;
pub mod cola2;
pub mod colab;
pub mod command;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod params;
pub mod segment;

pub use blob::{BlobHeader, SegmentEntry};
pub use command::{AnswerKind, Command, CommandResult, CommandType};
pub use encoder::BlobEncoder;
pub use error::{CoLaError, ProtocolError};
pub use frame::{FrameHeader, FRAME_HEADER_SIZE, MAGIC};
pub use metadata::{CameraParameters, PixelType, PlaneFormat, XmlMetadata};
pub use params::{ParameterReader, ParameterWriter};
pub use segment::{BinarySegment, PlaneLayout};

/// Blob protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Package type byte identifying a data blob (`'b'`).
pub const PACKAGE_TYPE_BLOB: u8 = 0x62;

/// Default TCP port for the CoLa control channel.
pub const DEFAULT_CONTROL_PORT: u16 = 2122;

/// Default TCP port for the blob stream.
pub const DEFAULT_STREAM_PORT: u16 = 2114;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
