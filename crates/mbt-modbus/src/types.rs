// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint configuration for the client transports and the local server.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ModbusResult};

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn check_timeout(timeout: Duration) -> ModbusResult<()> {
    if timeout.is_zero() {
        return Err(ConfigurationError::invalid("timeout", "must be greater than 0").into());
    }
    Ok(())
}

// =============================================================================
// ModbusTcpConfig
// =============================================================================

/// A Modbus TCP device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusTcpConfig {
    /// Host name or address.
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Unit ID of the remote device.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Deadline for connecting and for each request.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl ModbusTcpConfig {
    /// Unit 1 at `host:port` with a one second timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id: default_unit_id(),
            timeout: default_timeout(),
        }
    }

    /// Sets the unit ID.
    pub fn with_unit(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Sets the connect and request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port`, resolved at connect time.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.is_empty() {
            return Err(ConfigurationError::missing_field("host").into());
        }
        check_timeout(self.timeout)
    }
}

// =============================================================================
// ModbusRtuConfig
// =============================================================================

/// Character framing on a serial line, written `8N1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialFrame {
    /// Data bits, 5 to 8.
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits, 1 or 2.
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

impl SerialFrame {
    /// Creates a frame.
    pub fn new(data_bits: u8, parity: Parity, stop_bits: u8) -> Self {
        Self {
            data_bits,
            parity,
            stop_bits,
        }
    }

    /// Validates the bit counts.
    pub fn validate(&self) -> ModbusResult<()> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(ConfigurationError::invalid(
                "data_bits",
                format!("{} is not between 5 and 8", self.data_bits),
            )
            .into());
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(ConfigurationError::invalid(
                "stop_bits",
                format!("{} is not 1 or 2", self.stop_bits),
            )
            .into());
        }
        Ok(())
    }
}

impl Default for SerialFrame {
    fn default() -> Self {
        Self::new(default_data_bits(), Parity::None, default_stop_bits())
    }
}

impl fmt::Display for SerialFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.data_bits, self.parity, self.stop_bits)
    }
}

/// Serial parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
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

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "N",
            Self::Odd => "O",
            Self::Even => "E",
        })
    }
}

/// A Modbus RTU device on a serial port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusRtuConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1").
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Character framing.
    #[serde(flatten)]
    pub frame: SerialFrame,

    /// Unit ID of the remote device.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Per-request deadline.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl ModbusRtuConfig {
    /// Unit 1 on `port` at 9600 8N1.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            frame: SerialFrame::default(),
            unit_id: default_unit_id(),
            timeout: default_timeout(),
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.port.is_empty() {
            return Err(ConfigurationError::missing_field("port").into());
        }
        if self.baud_rate == 0 {
            return Err(ConfigurationError::invalid("baud_rate", "must be greater than 0").into());
        }
        self.frame.validate()?;
        check_timeout(self.timeout)
    }
}

// =============================================================================
// ClientEndpoint
// =============================================================================

/// Where a remote session connects to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEndpoint {
    /// Modbus TCP.
    Tcp(ModbusTcpConfig),
    /// Modbus RTU over a serial line.
    Rtu(ModbusRtuConfig),
}

impl ClientEndpoint {
    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::Tcp(c) => c.validate(),
            Self::Rtu(c) => c.validate(),
        }
    }
}

impl fmt::Display for ClientEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(c) => write!(f, "tcp://{} (unit {})", c.socket_addr(), c.unit_id),
            Self::Rtu(c) => write!(
                f,
                "rtu://{} {} {} (unit {})",
                c.port, c.baud_rate, c.frame, c.unit_id
            ),
        }
    }
}

// =============================================================================
// ModbusServerConfig
// =============================================================================

/// Configuration for the local Modbus TCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusServerConfig {
    /// Bind address.
    pub host: String,

    /// Bind port; 0 picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Device ID served. Requests for other IDs are answered with
    /// a gateway exception; ID 0 is always accepted.
    #[serde(default = "default_unit_id")]
    pub device_id: u8,
}

impl ModbusServerConfig {
    /// Creates a server configuration.
    pub fn new(host: impl Into<String>, port: u16, device_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            device_id,
        }
    }

    /// Parses the bind address.
    pub fn socket_addr(&self) -> ModbusResult<SocketAddr> {
        let text = format!("{}:{}", self.host, self.port);
        text.parse::<SocketAddr>().map_err(|e| {
            ConfigurationError::invalid("bind address", format!("{text}: {e}")).into()
        })
    }
}

impl Default for ModbusServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", default_port(), default_unit_id())
    }
}

// =============================================================================
// Tests
// =============================================================================
