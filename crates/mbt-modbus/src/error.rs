// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for Modbus traffic.
//!
//! ```text
//! ModbusError
//! ├── Connection    - the link could not be opened or dropped
//! ├── Protocol      - exception or malformed reply from the device
//! ├── Timeout       - no reply within the request deadline
//! ├── Operation     - local preconditions (unknown register, read-only class)
//! ├── Codec         - register casting/decoding (from mbt-core)
//! └── Configuration - invalid endpoint settings
//! ```
//!
//! The first three are what a remote session reports as a failed read or
//! write. None of them ever escapes a polling tick or a proxy observer:
//! those callers log and continue.
//!
//! # Examples
//!
//! ```
//! use mbt_modbus::error::ModbusError;
//!
//! let error = ModbusError::exception(0x03, 0x02);
//! assert!(!error.is_retryable());
//! assert_eq!(error.error_code().to_string(), "MB-0202");
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use mbt_core::{CoreError, RegisterClass};
use thiserror::Error;
use tracing::Level;

/// A Result type with ModbusError.
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// ModbusError
// =============================================================================

/// The main error type for Modbus operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Link failures (TCP/serial).
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Exception responses and malformed replies.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Request deadline expired.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Local precondition failures.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Register codec errors.
    #[error("{0}")]
    Codec(#[from] CoreError),

    /// Invalid endpoint settings.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl ModbusError {
    /// No link has been established.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// The device answered `function_code` with exception `code`.
    pub fn exception(function_code: u8, code: u8) -> Self {
        Self::Protocol(ProtocolError::Exception {
            function_code,
            code,
        })
    }

    /// A write to a di/ir register.
    pub fn read_only(class: RegisterClass, address: u16) -> Self {
        Self::Operation(OperationError::ReadOnly { class, address })
    }

    /// The profile has no register at `address`.
    pub fn unknown_register(class: RegisterClass, address: u16) -> Self {
        Self::Operation(OperationError::UnknownRegister { class, address })
    }

    /// Returns `true` if sending the same request again may succeed.
    ///
    /// Only timeouts and transient link failures qualify. An exception
    /// response means the device answered, so it is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Connection(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Short category name used as a log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Timeout(_) => "timeout",
            Self::Operation(_) => "operation",
            Self::Codec(_) => "codec",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Stable code for log correlation.
    pub fn error_code(&self) -> ErrorCode {
        let detail = match self {
            Self::Connection(e) => match e {
                ConnectionError::Unreachable { .. } => 1,
                ConnectionError::ConnectTimeout { .. } => 2,
                ConnectionError::SerialPort { .. } => 3,
                ConnectionError::Dropped { .. } => 4,
                ConnectionError::NotConnected => 5,
                ConnectionError::Io { .. } => 6,
            },
            Self::Protocol(ProtocolError::Exception { code, .. }) => *code,
            Self::Protocol(ProtocolError::Malformed { .. }) => 0xFF,
            Self::Timeout(e) => e.function_code,
            Self::Operation(e) => match e {
                OperationError::UnknownRegister { .. } => 1,
                OperationError::ReadOnly { .. } => 2,
                OperationError::AddressOutOfRange { .. } => 3,
                OperationError::InvalidRange { .. } => 4,
                OperationError::NotSupported { .. } => 5,
            },
            Self::Codec(e) => match e {
                CoreError::Validation(_) => 1,
                CoreError::Cast(_) => 2,
                CoreError::Decode(_) => 3,
                CoreError::Profile(_) => 4,
            },
            Self::Configuration(_) => 1,
        };
        let category = match self {
            Self::Connection(_) => 1,
            Self::Protocol(_) => 2,
            Self::Operation(_) => 3,
            Self::Codec(_) => 4,
            Self::Configuration(_) => 5,
            Self::Timeout(_) => 6,
        };
        ErrorCode { category, detail }
    }

    /// Level this error is logged at.
    ///
    /// Remote failures and rejected writes are warnings; anything that
    /// points at a broken profile or configuration is an error.
    pub fn tracing_level(&self) -> Level {
        match self {
            Self::Connection(_) | Self::Protocol(_) | Self::Timeout(_) => Level::WARN,
            Self::Operation(OperationError::ReadOnly { .. }) => Level::WARN,
            Self::Codec(e) if !e.is_fatal() => Level::WARN,
            _ => Level::ERROR,
        }
    }

    /// Logs this error at its level with `context`.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        if self.tracing_level() == Level::WARN {
            tracing::warn!(error_code = %code, category = self.category(), context, "{self}");
        } else {
            tracing::error!(error_code = %code, category = self.category(), context, "{self}");
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// The link to a device could not be opened or was lost.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connect failed (refused, unresolvable host).
    #[error("Cannot reach {endpoint}: {source}")]
    Unreachable {
        /// Host and port.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Connect did not complete in time.
    #[error("No connection to {endpoint} within {after:?}")]
    ConnectTimeout {
        /// Host and port.
        endpoint: String,
        /// Connect deadline.
        after: Duration,
    },

    /// Serial port missing, busy or misconfigured.
    #[error("Cannot open serial port {port}: {reason}")]
    SerialPort {
        /// Port path.
        port: String,
        /// What went wrong.
        reason: String,
    },

    /// An established link went away mid-request.
    #[error("Link to {endpoint} dropped: {source}")]
    Dropped {
        /// Host and port or serial path.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// No link has been established.
    #[error("Not connected to Modbus device")]
    NotConnected,

    /// Any other I/O failure.
    #[error("I/O error: {context}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Creates an unreachable error.
    pub fn unreachable(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a dropped link error.
    pub fn dropped(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Dropped {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a serial port error.
    pub fn serial(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SerialPort {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` unless the failure needs operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SerialPort { .. } => false,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            _ => true,
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// The device replied, but not with data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Exception response.
    #[error("Device answered function {function_code:#04x} with exception {code:#04x}")]
    Exception {
        /// Request function code.
        function_code: u8,
        /// Exception code.
        code: u8,
    },

    /// Reply could not be parsed or did not match the request.
    #[error("Malformed reply to function {function_code:#04x}: {message}")]
    Malformed {
        /// Request function code.
        function_code: u8,
        /// Description of the mismatch.
        message: String,
    },
}

// =============================================================================
// TimeoutError
// =============================================================================

/// No reply to a request within its deadline.
#[derive(Debug, Error)]
#[error("No reply to function {function_code:#04x} within {after:?}")]
pub struct TimeoutError {
    /// Request function code.
    pub function_code: u8,
    /// Request deadline.
    pub after: Duration,
}

impl TimeoutError {
    /// Creates a timeout for `function_code`.
    pub fn new(function_code: u8, after: Duration) -> Self {
        Self {
            function_code,
            after,
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Local precondition failures; nothing was sent.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The profile has no register at this address.
    #[error("No {class} register at address {address}")]
    UnknownRegister {
        /// Register class.
        class: RegisterClass,
        /// Register address.
        address: u16,
    },

    /// The register class cannot be written remotely.
    #[error("{class} at address {address} is read-only")]
    ReadOnly {
        /// Register class.
        class: RegisterClass,
        /// Register address.
        address: u16,
    },

    /// Wire address outside `0..=65535` after applying the offset.
    #[error("Address {address} with offset {offset} is outside the wire range")]
    AddressOutOfRange {
        /// Profile address.
        address: u16,
        /// Configured offset.
        offset: i32,
    },

    /// A store access touches addresses no register occupies.
    #[error("{class} range {address}+{count} is not populated")]
    InvalidRange {
        /// Register class.
        class: RegisterClass,
        /// First address.
        address: u16,
        /// Number of units.
        count: usize,
    },

    /// Request the transport cannot express.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Operation name.
        operation: String,
    },
}

impl OperationError {
    /// Creates an address out of range error.
    pub fn address_out_of_range(address: u16, offset: i32) -> Self {
        Self::AddressOutOfRange { address, offset }
    }

    /// Creates an invalid range error.
    pub fn invalid_range(class: RegisterClass, address: u16, count: usize) -> Self {
        Self::InvalidRange {
            class,
            address,
            count,
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid endpoint settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required field is empty.
    #[error("Missing required setting: {field}")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field holds a value the transport cannot use.
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid field error.
    pub fn invalid(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Category and detail of an error, rendered as `MB-ccdd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// 1 connection, 2 protocol, 3 operation, 4 codec, 5 config, 6 timeout.
    pub category: u8,
    /// Detail within the category. Exception code for protocol errors,
    /// function code for timeouts.
    pub detail: u8,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MB-{:02X}{:02X}", self.category, self.detail)
    }
}

// =============================================================================
// Tests
// =============================================================================
