//! Device control: variables, methods, login and acquisition.

use crate::error::ClientError;
use crate::handler::ProtocolHandler;
use crate::transport::Transport;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use visionary_protocol::auth::{Challenge, UserLevel};
use visionary_protocol::{Command, ParameterReader, ParameterWriter};

const GET_CHALLENGE: &str = "GetChallenge";
const SET_USER_LEVEL: &str = "SetUserLevel";
const RUN: &str = "Run";
const PLAY_START: &str = "PLAYSTART";
const PLAY_STOP: &str = "PLAYSTOP";
const PLAY_NEXT: &str = "PLAYNEXT";
const DEVICE_IDENT: &str = "DeviceIdent";

/// Device name and firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdent {
    pub name: String,
    pub version: String,
}

/// Typed operations on top of a [`ProtocolHandler`].
pub struct Control<T: Transport> {
    handler: ProtocolHandler<T>,
}

impl<T: Transport> Control<T> {
    pub fn new(handler: ProtocolHandler<T>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &ProtocolHandler<T> {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut ProtocolHandler<T> {
        &mut self.handler
    }

    pub fn into_handler(self) -> ProtocolHandler<T> {
        self.handler
    }

    pub fn open_session(&mut self, timeout_ms: u32) -> bool {
        self.handler.open_session(timeout_ms)
    }

    pub fn close_session(&mut self) -> bool {
        self.handler.close_session()
    }

    /// Reads a variable, returning its value bytes.
    pub fn read_variable(&mut self, name: &str) -> Result<Bytes, ClientError> {
        self.call(Command::read_variable(name)?)
    }

    pub fn write_variable(&mut self, name: &str, value: Bytes) -> Result<(), ClientError> {
        self.call(Command::write_variable(name)?.with_parameters(value))
            .map(|_| ())
    }

    /// Invokes a method, returning its answer bytes.
    pub fn invoke_method(&mut self, name: &str, args: Bytes) -> Result<Bytes, ClientError> {
        self.call(Command::invoke_method(name)?.with_parameters(args))
    }

    fn call(&mut self, command: Command) -> Result<Bytes, ClientError> {
        let result = self.handler.send(&command);
        if !result.is_ok() {
            return Err(ClientError::Command {
                command: command.name().to_string(),
                error: result.error(),
            });
        }
        if !result.answers(&command) {
            return Err(ClientError::UnexpectedAnswer(command.name().to_string()));
        }
        Ok(Bytes::copy_from_slice(result.parameters(&command)))
    }

    /// Authenticates with challenge/response.
    pub fn login(&mut self, level: UserLevel, password: &str) -> Result<(), ClientError> {
        let args = ParameterWriter::new().usint(level.code()).finish();
        let answer = self.invoke_method(GET_CHALLENGE, args)?;
        let challenge = Challenge::parse(&answer)?;
        if !challenge.is_granted() {
            warn!(%level, status = challenge.status, "challenge refused");
            return Err(ClientError::LoginFailed(format!(
                "challenge refused for {} (status {})",
                level, challenge.status
            )));
        }

        let response = challenge.respond(level, password);
        let args = ParameterWriter::new()
            .bytes(&response)
            .usint(level.code())
            .finish();
        let answer = self.invoke_method(SET_USER_LEVEL, args)?;
        let status = ParameterReader::new(&answer).usint()?;
        if status != 0 {
            warn!(%level, status, "credentials rejected");
            return Err(ClientError::LoginFailed(format!(
                "credentials rejected for {} (status {})",
                level, status
            )));
        }
        info!(%level, "logged in");
        Ok(())
    }

    /// Drops back to the `Run` user level.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        let answer = self.invoke_method(RUN, Bytes::new())?;
        match ParameterReader::new(&answer).usint()? {
            1 => {
                debug!("logged out");
                Ok(())
            }
            _ => Err(ClientError::UnexpectedAnswer(RUN.to_string())),
        }
    }

    pub fn start_acquisition(&mut self) -> bool {
        self.acquisition(PLAY_START)
    }

    pub fn stop_acquisition(&mut self) -> bool {
        self.acquisition(PLAY_STOP)
    }

    /// Triggers a single frame while acquisition is stopped.
    pub fn step_acquisition(&mut self) -> bool {
        self.acquisition(PLAY_NEXT)
    }

    fn acquisition(&mut self, method: &str) -> bool {
        match self.invoke_method(method, Bytes::new()) {
            Ok(_) => true,
            Err(e) => {
                warn!(method, error = %e, "acquisition command failed");
                false
            }
        }
    }

    pub fn device_ident(&mut self) -> Result<DeviceIdent, ClientError> {
        let answer = self.read_variable(DEVICE_IDENT)?;
        let mut reader = ParameterReader::new(&answer);
        Ok(DeviceIdent {
            name: reader.flex_string()?,
            version: reader.flex_string()?,
        })
    }
}
