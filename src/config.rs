//! # Configuration Management
//!
//! Centralized configuration for the cipherline server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - `max_frame_length` bounds the bytes a peer can make us buffer without
//!   completing a frame
//! - `max_spec_length` bounds the cipher spec, and with it the per-byte cost
//!   of every later encode and decode
//! - A non-zero `read_timeout` stops idle peers from pinning a connection slot

use crate::core::negotiation::MAX_SPEC_LENGTH;
use crate::error::{ProtocolError, Result};
use crate::protocol::price_record::RECORD_SIZE;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Default bound on a pending frame (bytes)
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Default size of a single transport read
pub const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-connection session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CIPHERLINE_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(service) = std::env::var("CIPHERLINE_SERVICE") {
            config.server.service = service.parse()?;
        }

        if let Ok(max) = std::env::var("CIPHERLINE_MAX_FRAME_LENGTH") {
            if let Ok(val) = max.parse::<usize>() {
                config.session.max_frame_length = val;
            }
        }

        if let Ok(max) = std::env::var("CIPHERLINE_MAX_SPEC_LENGTH") {
            if let Ok(val) = max.parse::<usize>() {
                config.session.max_spec_length = val;
            }
        }

        if let Ok(timeout) = std::env::var("CIPHERLINE_READ_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.session.read_timeout = Duration::from_millis(val);
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

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.session.validate());
        errors.extend(self.logging.validate());

        let min_frame = self.server.service.min_frame_length();
        if self.session.max_frame_length < min_frame {
            errors.push(format!(
                "Max frame length {} is below the smallest {:?} frame ({} bytes)",
                self.session.max_frame_length, self.server.service, min_frame
            ));
        }

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

/// Which protocol a server speaks on accepted connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Ciphered selection lines
    #[default]
    Selection,
    /// Plaintext fixed-size price records
    PriceRecords,
}

impl ServiceKind {
    /// Smallest complete frame this service accepts, delimiter included
    pub fn min_frame_length(&self) -> usize {
        match self {
            // "0x\n"
            ServiceKind::Selection => 3,
            ServiceKind::PriceRecords => RECORD_SIZE,
        }
    }
}

impl FromStr for ServiceKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "selection" => Ok(ServiceKind::Selection),
            "price_records" | "price-records" => Ok(ServiceKind::PriceRecords),
            other => Err(ProtocolError::ConfigError(format!(
                "Unknown service '{other}' (expected 'selection' or 'price_records')"
            ))),
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Protocol served on every connection
    #[serde(default)]
    pub service: ServiceKind,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            service: ServiceKind::default(),
            max_connections: 1000,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Per-connection session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum bytes buffered for an incomplete frame
    pub max_frame_length: usize,

    /// Maximum length of a cipher spec, terminator included
    pub max_spec_length: usize,

    /// Size of a single transport read
    pub read_buffer_size: usize,

    /// Idle timeout while awaiting input (0 disables)
    #[serde(with = "duration_serde")]
    pub read_timeout: Duration,

    /// Timeout for the transport to accept a response
    #[serde(with = "duration_serde")]
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_length: MAX_FRAME_LENGTH,
            max_spec_length: MAX_SPEC_LENGTH,
            read_buffer_size: READ_BUFFER_SIZE,
            read_timeout: Duration::ZERO,
            write_timeout: timeout::DEFAULT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_length == 0 {
            errors.push("Max frame length cannot be 0".to_string());
        } else if self.max_frame_length > 16 * 1024 * 1024 {
            errors.push(format!(
                "Max frame length too large: {} bytes (maximum recommended: 16 MB)",
                self.max_frame_length
            ));
        }

        // One operation plus the terminator
        if self.max_spec_length < 2 {
            errors.push("Max spec length too small (minimum: 2 bytes)".to_string());
        } else if self.max_spec_length > 4096 {
            errors.push(format!(
                "Max spec length too large: {} bytes (maximum: 4096)",
                self.max_spec_length
            ));
        }

        if self.read_buffer_size < 64 {
            errors.push("Read buffer too small (minimum: 64 bytes)".to_string());
        }

        if !self.read_timeout.is_zero() && self.read_timeout.as_millis() < 100 {
            errors.push("Read timeout too short (minimum: 100ms, or 0 to disable)".to_string());
        }

        if self.write_timeout.as_millis() < 100 {
            errors.push("Write timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("cipherline"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
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

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert!(config.validate_strict().is_ok());
    }

    #[test]
    fn test_example_config_roundtrips() {
        let text = NetworkConfig::example_config();
        let parsed = NetworkConfig::from_toml(&text).expect("example config should parse");
        assert_eq!(parsed.server.address, "127.0.0.1:9000");
        assert_eq!(parsed.server.service, ServiceKind::Selection);
        assert_eq!(parsed.session.max_frame_length, MAX_FRAME_LENGTH);
        assert_eq!(parsed.logging.log_level, Level::INFO);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = NetworkConfig::from_toml(
            r#"
            [server]
            address = "0.0.0.0:7000"
            service = "price_records"
            max_connections = 10
            shutdown_timeout = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.service, ServiceKind::PriceRecords);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.session.read_buffer_size, READ_BUFFER_SIZE);
    }

    #[test]
    fn test_invalid_values_reported() {
        let config = NetworkConfig::default_with_overrides(|c| {
            c.server.address = "not an address".into();
            c.session.max_frame_length = 0;
            c.session.read_timeout = Duration::from_millis(5);
        });
        let errors = config.validate();
        // A zero frame bound also falls below the service minimum
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(matches!(
            config.validate_strict(),
            Err(ProtocolError::ConfigError(_))
        ));
    }

    #[test]
    fn test_frame_bound_checked_against_service() {
        let config = NetworkConfig::default_with_overrides(|c| {
            c.server.service = ServiceKind::PriceRecords;
            c.session.max_frame_length = RECORD_SIZE - 1;
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("PriceRecords"));

        let config = NetworkConfig::default_with_overrides(|c| {
            c.server.service = ServiceKind::PriceRecords;
            c.session.max_frame_length = RECORD_SIZE;
        });
        assert!(config.validate().is_empty());

        let config = NetworkConfig::default_with_overrides(|c| {
            c.session.max_frame_length = RECORD_SIZE - 1;
        });
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_spec_bound_validated() {
        let config = NetworkConfig::default_with_overrides(|c| {
            c.session.max_spec_length = 1;
        });
        assert_eq!(config.validate().len(), 1);

        let config = NetworkConfig::default_with_overrides(|c| {
            c.session.max_spec_length = 1 << 20;
        });
        assert_eq!(config.validate().len(), 1);
        assert_eq!(SessionConfig::default().max_spec_length, MAX_SPEC_LENGTH);
    }

    #[test]
    fn test_service_kind_from_str() {
        assert_eq!("Selection".parse::<ServiceKind>().unwrap(), ServiceKind::Selection);
        assert_eq!(
            "price-records".parse::<ServiceKind>().unwrap(),
            ServiceKind::PriceRecords
        );
        assert!("chat".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            NetworkConfig::from_toml("[server]\naddress = 5"),
            Err(ProtocolError::ConfigError(_))
        ));
    }
}
