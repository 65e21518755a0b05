//! Challenge/response login.
//!
//! The device hands out a random challenge and a per-level salt. The client
//! proves knowledge of the password without sending it:
//!
//! ```text
//! response = SHA-256( SHA-256("<Level>:SICK Sensor:<password>" || salt) || challenge )
//! ```

use crate::error::ProtocolError;
use crate::params::ParameterReader;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Size of the device challenge.
pub const CHALLENGE_SIZE: usize = 16;

/// Size of the per-level salt.
pub const SALT_SIZE: usize = 16;

/// Size of the hashed response.
pub const RESPONSE_SIZE: usize = 32;

const REALM: &str = "SICK Sensor";

/// Device access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserLevel {
    Run,
    Operator,
    Maintenance,
    AuthorizedClient,
    Service,
}

impl UserLevel {
    pub fn code(&self) -> u8 {
        match self {
            UserLevel::Run => 0,
            UserLevel::Operator => 1,
            UserLevel::Maintenance => 2,
            UserLevel::AuthorizedClient => 3,
            UserLevel::Service => 4,
        }
    }

    /// Name used inside the password hash.
    pub fn name(&self) -> &'static str {
        match self {
            UserLevel::Run => "Run",
            UserLevel::Operator => "Operator",
            UserLevel::Maintenance => "Maintenance",
            UserLevel::AuthorizedClient => "AuthorizedClient",
            UserLevel::Service => "Service",
        }
    }
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UserLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "run" => Ok(UserLevel::Run),
            "operator" => Ok(UserLevel::Operator),
            "maintenance" | "maint" => Ok(UserLevel::Maintenance),
            "client" | "authorizedclient" | "authclient" => Ok(UserLevel::AuthorizedClient),
            "service" => Ok(UserLevel::Service),
            _ => Err(format!("unknown user level: {}", s)),
        }
    }
}

/// Answer to `GetChallenge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub status: u8,
    pub challenge: [u8; CHALLENGE_SIZE],
    pub salt: [u8; SALT_SIZE],
}

impl Challenge {
    pub fn parse(params: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = ParameterReader::new(params);
        let status = reader.usint()?;
        let challenge = reader.array::<CHALLENGE_SIZE>()?;
        let salt = reader.array::<SALT_SIZE>()?;
        Ok(Self {
            status,
            challenge,
            salt,
        })
    }

    /// Whether the device accepted the challenge request.
    pub fn is_granted(&self) -> bool {
        self.status == 0
    }

    /// Computes the response for `level` and `password`.
    pub fn respond(&self, level: UserLevel, password: &str) -> [u8; RESPONSE_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", level.name(), REALM, password).as_bytes());
        hasher.update(self.salt);
        let password_hash = hasher.finalize();

        let mut hasher = Sha256::new();
        hasher.update(password_hash);
        hasher.update(self.challenge);
        hasher.finalize().into()
    }
}
