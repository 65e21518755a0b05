//! Camera configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via VISIONARY_CONFIG or --config)
//! 3. Environment variables

use crate::error::ConfigError;
use crate::handler::{Framing, DEFAULT_CLIENT_ID};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use visionary_protocol::auth::UserLevel;
use visionary_protocol::{DEFAULT_CONTROL_PORT, DEFAULT_STREAM_PORT};

/// Camera configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Control protocol configuration.
    pub protocol: ProtocolConfig,
    /// Acquisition configuration.
    pub acquisition: AcquisitionConfig,
    /// Login configuration.
    pub auth: AuthConfig,
}

impl CameraConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("VISIONARY_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: CameraConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.protocol.apply_env_overrides();
        self.acquisition.apply_env_overrides();
    }

    /// Checks values that would make a connection impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.host.is_empty() {
            return Err(ConfigError::ValidationError("host is empty".to_string()));
        }
        if self.network.control_port == 0 || self.network.stream_port == 0 {
            return Err(ConfigError::ValidationError(
                "ports must be non-zero".to_string(),
            ));
        }
        if self.protocol.client_id.is_empty() || self.protocol.client_id.len() > u16::MAX as usize
        {
            return Err(ConfigError::ValidationError(
                "client_id must be 1..=65535 bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn env_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Device host name or IP address.
    pub host: String,
    /// CoLa control port.
    pub control_port: u16,
    /// Blob streaming port.
    pub stream_port: u16,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds (0 = block forever).
    pub io_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            stream_port: DEFAULT_STREAM_PORT,
            connect_timeout_ms: 5000,
            io_timeout_ms: 5000,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("VISIONARY_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var("VISIONARY_CONTROL_PORT") {
            if let Ok(p) = port.parse() {
                self.control_port = p;
            }
        }

        if let Ok(port) = std::env::var("VISIONARY_STREAM_PORT") {
            if let Ok(p) = port.parse() {
                self.stream_port = p;
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the socket read/write timeout, `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}

/// Control protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Framing on the control channel.
    pub framing: Framing,
    /// Session inactivity timeout in milliseconds.
    pub session_timeout_ms: u32,
    /// Client identifier announced at session open.
    pub client_id: String,
    /// Verify the CRC-32C of every binary segment.
    pub verify_crc: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            framing: Framing::Cola2,
            session_timeout_ms: 5000,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            verify_crc: true,
        }
    }
}

impl ProtocolConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(framing) = std::env::var("VISIONARY_PROTOCOL") {
            if let Ok(f) = framing.parse() {
                self.framing = f;
            }
        }

        if let Ok(timeout) = std::env::var("VISIONARY_SESSION_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.session_timeout_ms = ms;
            }
        }

        if let Ok(verify) = std::env::var("VISIONARY_VERIFY_CRC") {
            self.verify_crc = env_flag(&verify);
        }
    }
}

/// Acquisition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Keep acquisition stopped and trigger one frame per request.
    pub single_step: bool,
    /// Re-read once when a frame number does not advance.
    pub stale_frame_retry: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            single_step: true,
            stale_frame_retry: true,
        }
    }
}

impl AcquisitionConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(single) = std::env::var("VISIONARY_SINGLE_STEP") {
            self.single_step = env_flag(&single);
        }
    }
}

/// One set of credentials to try at connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub level: UserLevel,
    pub password: String,
}

impl LoginAttempt {
    pub fn new(level: UserLevel, password: impl Into<String>) -> Self {
        Self {
            level,
            password: password.into(),
        }
    }
}

/// Login configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credentials tried in order until one is accepted.
    pub attempts: Vec<LoginAttempt>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            attempts: vec![
                LoginAttempt::new(UserLevel::Service, "123456"),
                LoginAttempt::new(UserLevel::AuthorizedClient, "CLIENT"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert_eq!(config.network.control_port, 2122);
        assert_eq!(config.network.stream_port, 2114);
        assert_eq!(config.network.io_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.protocol.framing, Framing::Cola2);
        assert!(config.protocol.verify_crc);
        assert!(config.acquisition.single_step);
        assert_eq!(config.auth.attempts.len(), 2);
        assert_eq!(config.auth.attempts[0].level, UserLevel::Service);
        assert_eq!(config.auth.attempts[1].password, "CLIENT");
        config.validate().unwrap();
    }

    #[test]
    fn test_io_timeout_disabled() {
        let network = NetworkConfig {
            io_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(network.io_timeout(), None);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = CameraConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: CameraConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "network:\n  host: 10.0.0.7\nprotocol:\n  framing: colab\nauth:\n  attempts:\n    - level: operator\n      password: main\n";
        let config: CameraConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.network.host, "10.0.0.7");
        assert_eq!(config.network.control_port, 2122);
        assert_eq!(config.protocol.framing, Framing::ColaB);
        assert_eq!(
            config.auth.attempts,
            vec![LoginAttempt::new(UserLevel::Operator, "main")]
        );
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.yaml");

        let mut config = CameraConfig::default();
        config.network.host = "camera.local".to_string();
        config.acquisition.single_step = false;
        config.save(&path).unwrap();

        let loaded = CameraConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            CameraConfig::from_file(&missing),
            Err(ConfigError::IoError(..))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "network: [not, a, map]").unwrap();
        assert!(matches!(
            CameraConfig::from_file(&bad),
            Err(ConfigError::ParseError(..))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = CameraConfig::default();
        config.network.host.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = CameraConfig::default();
        config.network.stream_port = 0;
        assert!(config.validate().is_err());
    }
}
