//! # Configuration Management
//!
//! Structured configuration for the session engine: keepalive cadence,
//! connection health checking, and the client identification the login
//! packet carries.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variable overrides via `from_env()`
//! - Direct instantiation with defaults

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Default legacy keepalive cadence.
pub const DEFAULT_PING_DELAY: Duration = Duration::from_millis(1000);

/// Default extended keepalive cadence.
pub const DEFAULT_EXTENDED_PING_DELAY: Duration = Duration::from_millis(250);

/// Default connection health check cadence.
pub const DEFAULT_CONNECTION_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// Top-level session engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    /// Keepalive configuration
    #[serde(default)]
    pub ping: PingConfig,

    /// Client identification sent in the login packet
    #[serde(default)]
    pub client: ClientIdentity,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(delay) = std::env::var("GAME_SESSION_PING_DELAY_MS") {
            if let Ok(val) = delay.parse::<u64>() {
                config.ping.ping_delay = Duration::from_millis(val);
            }
        }

        if let Ok(delay) = std::env::var("GAME_SESSION_EXTENDED_PING_DELAY_MS") {
            if let Ok(val) = delay.parse::<u64>() {
                config.ping.extended_ping_delay = Duration::from_millis(val);
            }
        }

        if let Ok(interval) = std::env::var("GAME_SESSION_CONNECTION_CHECK_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.ping.connection_check_interval = Duration::from_millis(val);
            }
        }

        if let Ok(vendor) = std::env::var("GAME_SESSION_CLIENT_VENDOR") {
            config.client.vendor = vendor;
        }

        if let Ok(os) = std::env::var("GAME_SESSION_CUSTOM_OS") {
            if let Ok(val) = os.parse::<u16>() {
                config.client.custom_os = Some(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.ping.validate());
        errors.extend(self.client.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Keepalive and connection health cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PingConfig {
    /// Interval between legacy ping probes
    #[serde(with = "duration_serde")]
    pub ping_delay: Duration,

    /// Interval between extended ping probes
    #[serde(with = "duration_serde")]
    pub extended_ping_delay: Duration,

    /// Interval between connection health checks
    #[serde(with = "duration_serde")]
    pub connection_check_interval: Duration,

    /// A connection with no traffic for this long is flagged as failing
    #[serde(with = "duration_serde")]
    pub failing_threshold: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            ping_delay: DEFAULT_PING_DELAY,
            extended_ping_delay: DEFAULT_EXTENDED_PING_DELAY,
            connection_check_interval: DEFAULT_CONNECTION_CHECK_INTERVAL,
            failing_threshold: Duration::from_secs(5),
        }
    }
}

impl PingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.ping_delay.as_millis() < 100 {
            errors.push("Ping delay too short (minimum: 100ms)".to_string());
        }

        if self.extended_ping_delay.as_millis() < 50 {
            errors.push("Extended ping delay too short (minimum: 50ms)".to_string());
        }

        if self.connection_check_interval.as_millis() < 100 {
            errors.push("Connection check interval too short (minimum: 100ms)".to_string());
        }

        if self.failing_threshold < self.ping_delay {
            errors.push("Failing threshold must be at least one ping delay".to_string());
        }

        errors
    }
}

/// Identity fields the login packet advertises.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientIdentity {
    /// Vendor id for the identification trailer
    pub vendor: String,

    /// Human-readable build version, normalized into the trailer's code
    pub build_version: String,

    /// Numeric client version sent when the capability asks for one
    pub client_version: u32,

    /// Content revision sent when the capability asks for one
    pub content_revision: u16,

    /// Full replacement for the identification trailer
    pub custom_identification: Option<String>,

    /// Override for the detected operating system code
    pub custom_os: Option<u16>,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            vendor: String::from("game-session"),
            build_version: String::from("0.9.0"),
            client_version: 0,
            content_revision: 0,
            custom_identification: None,
            custom_os: None,
        }
    }
}

impl ClientIdentity {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.vendor.is_empty() && self.custom_identification.is_none() {
            errors.push("Client vendor cannot be empty".to_string());
        }

        if self.vendor.len() > 32 {
            errors.push(format!(
                "Client vendor too long: {} characters (maximum: 32)",
                self.vendor.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let config = SessionConfig::default_with_overrides(|c| {
            c.ping.ping_delay = Duration::from_millis(500);
            c.client.vendor = String::from("TestClient");
            c.client.custom_os = Some(42);
        });
        let toml = toml::to_string(&config).unwrap();
        let parsed = SessionConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed.ping.ping_delay, Duration::from_millis(500));
        assert_eq!(parsed.client.vendor, "TestClient");
        assert_eq!(parsed.client.custom_os, Some(42));
    }

    #[test]
    fn short_ping_delay_fails_validation() {
        let config = SessionConfig::default_with_overrides(|c| {
            c.ping.ping_delay = Duration::from_millis(10);
        });
        assert!(config.validate_strict().is_err());
    }
}
