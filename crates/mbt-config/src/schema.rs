// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for MBTester.
//!
//! # Schema Structure
//!
//! ```text
//! HarnessConfig
//! ├── profile: Option<String>      profile name or path
//! ├── profile_paths: Vec<PathBuf>  extra profile search directories
//! ├── server: ServerConfig         local TCP server endpoint
//! ├── client: ClientConfig         remote device endpoint (TCP or serial)
//! ├── polling: PollingConfig       polling engine schedule
//! └── logging: LoggingConfig
//! ```
//!
//! Every section is optional; a missing section takes its defaults.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default host for both roles.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default device id (unit id).
pub const DEFAULT_DEVICE_ID: u8 = 1;

/// Highest assignable device id.
pub const MAX_DEVICE_ID: u8 = 247;

/// Default client request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default transport retry count.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default client address offset; profiles use one-based addresses.
pub const DEFAULT_CLIENT_OFFSET: i32 = -1;

/// Default polling interval in milliseconds (one minute).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for MBTester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Profile name (looked up on the search path) or file path.
    #[serde(default)]
    pub profile: Option<String>,

    /// Additional directories searched for profiles.
    #[serde(default)]
    pub profile_paths: Vec<PathBuf>,

    /// Local server endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote device endpoint.
    #[serde(default)]
    pub client: ClientConfig,

    /// Polling schedule.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(profile) = &self.profile {
            if profile.trim().is_empty() {
                return Err(ConfigError::validation("profile", "cannot be empty"));
            }
        }
        self.server.validate()?;
        self.client.validate()?;
        self.polling.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// Server
// =============================================================================

/// Local Modbus TCP server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Device id answered by this server.
    #[serde(default = "default_device_id")]
    pub device_id: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            device_id: DEFAULT_DEVICE_ID,
        }
    }
}

impl ServerConfig {
    /// Validates the server section.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_host("server.host", &self.host)?;
        if self.port == 0 {
            return Err(ConfigError::validation("server.port", "must be non-zero"));
        }
        validate_device_id("server.device_id", self.device_id)
    }

    /// Returns `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Communication interface of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommKind {
    /// Modbus TCP.
    #[default]
    Tcp,
    /// Modbus RTU over a serial line.
    Serial,
}

impl CommKind {
    /// Upper-case name for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommKind::Tcp => "TCP",
            CommKind::Serial => "SERIAL",
        }
    }
}

/// Remote device endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Interface kind.
    #[serde(default)]
    pub comm: CommKind,

    /// Remote host (TCP).
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote port (TCP).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serial line settings (serial).
    #[serde(default)]
    pub serial: SerialConfig,

    /// Remote device id.
    #[serde(default = "default_device_id")]
    pub device_id: u8,

    /// Added to every profile address before it goes on the wire.
    #[serde(default = "default_client_offset")]
    pub offset: i32,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Transport-level retries per request.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            comm: CommKind::Tcp,
            host: default_host(),
            port: DEFAULT_PORT,
            serial: SerialConfig::default(),
            device_id: DEFAULT_DEVICE_ID,
            offset: DEFAULT_CLIENT_OFFSET,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl ClientConfig {
    /// Validates the client section.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.comm {
            CommKind::Tcp => {
                validate_host("client.host", &self.host)?;
                if self.port == 0 {
                    return Err(ConfigError::validation("client.port", "must be non-zero"));
                }
            }
            CommKind::Serial => self.serial.validate()?,
        }
        validate_device_id("client.device_id", self.device_id)?;
        if !(-65535..=65535).contains(&self.offset) {
            return Err(ConfigError::out_of_range("client.offset", self.offset, -65535, 65535));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::validation("client.timeout_ms", "must be positive"));
        }
        Ok(())
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Human-readable endpoint, `host:port` or the serial port.
    pub fn endpoint(&self) -> String {
        match self.comm {
            CommKind::Tcp => format!("{}:{}", self.host, self.port),
            CommKind::Serial => self.serial.port.clone(),
        }
    }
}

/// Serial line settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    /// Serial port path (e.g., /dev/ttyUSB0 or COM1).
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits (7 or 8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Stop bits (1 or 2).
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::None,
        }
    }
}

impl SerialConfig {
    /// Validates the serial settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port.is_empty() {
            return Err(ConfigError::validation("client.serial.port", "cannot be empty"));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::validation("client.serial.baud_rate", "must be positive"));
        }
        if !(7..=8).contains(&self.data_bits) {
            return Err(ConfigError::out_of_range("client.serial.data_bits", self.data_bits, 7, 8));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(ConfigError::out_of_range("client.serial.stop_bits", self.stop_bits, 1, 2));
        }
        Ok(())
    }
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Odd => "Odd",
            Parity::Even => "Even",
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Polling engine schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    /// Cycle interval in milliseconds. `0` polls continuously, `null`
    /// disables scheduled cycles.
    #[serde(default = "default_poll_interval")]
    pub interval_ms: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl PollingConfig {
    /// Validates the polling section.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    /// Interval as a duration; `None` when scheduled cycles are disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single line.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Defaults and helpers
// =============================================================================

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_device_id() -> u8 {
    DEFAULT_DEVICE_ID
}

fn default_client_offset() -> i32 {
    DEFAULT_CLIENT_OFFSET
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_poll_interval() -> Option<u64> {
    Some(DEFAULT_POLL_INTERVAL_MS)
}

fn default_serial_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn validate_host(field: &str, host: &str) -> ConfigResult<()> {
    if host.trim().is_empty() {
        return Err(ConfigError::validation(field, "host cannot be empty"));
    }
    Ok(())
}

fn validate_device_id(field: &str, device_id: u8) -> ConfigResult<()> {
    if device_id > MAX_DEVICE_ID {
        return Err(ConfigError::out_of_range(field, device_id, 0, MAX_DEVICE_ID));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 502);
        assert_eq!(config.server.device_id, 1);
        assert_eq!(config.client.offset, -1);
        assert_eq!(config.client.retries, 3);
        assert_eq!(config.client.timeout(), Duration::from_secs(1));
        assert_eq!(config.polling.interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_partial_client_section_keeps_offset_default() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{"client": {"host": "10.0.0.5"}}"#).unwrap();
        assert_eq!(config.client.host, "10.0.0.5");
        assert_eq!(config.client.offset, -1);
    }

    #[test]
    fn test_polling_interval_variants() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{"polling": {"interval_ms": 0}}"#).unwrap();
        assert_eq!(config.polling.interval(), Some(Duration::ZERO));

        let config: HarnessConfig =
            serde_json::from_str(r#"{"polling": {"interval_ms": null}}"#).unwrap();
        assert_eq!(config.polling.interval(), None);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = HarnessConfig::default();
        config.server.device_id = 250;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));

        let mut config = HarnessConfig::default();
        config.client.comm = CommKind::Serial;
        config.client.serial.data_bits = 5;
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        config.client.host = String::new();
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        config.client.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<HarnessConfig, _> = serde_json::from_str(r#"{"gateway": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_display() {
        let mut client = ClientConfig::default();
        assert_eq!(client.endpoint(), "127.0.0.1:502");
        client.comm = CommKind::Serial;
        client.serial.port = "COM3".into();
        assert_eq!(client.endpoint(), "COM3");
        assert_eq!(ServerConfig::default().bind_address(), "127.0.0.1:502");
    }
}
