// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error type of the `mbtester` binary and its process exit codes.
//!
//! | Code | Cause |
//! |------|-------|
//! | 1 | configuration |
//! | 2 | startup (logging, runtime, signals) |
//! | 3 | a command failed while running |
//! | 4 | local file or port enumeration I/O |
//! | 5 | profile or codec |
//! | 6 | Modbus traffic |

use thiserror::Error;

/// Result type alias for mbt-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by the binary's commands.
#[derive(Debug, Error)]
pub enum BinError {
    /// Settings the command cannot run with.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Startup failed before the command ran.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// The command failed while running.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Local I/O.
    #[error("I/O error: {0}")]
    Io(String),

    /// Loading the configuration file.
    #[error(transparent)]
    Config(#[from] mbt_config::ConfigError),

    /// Loading or using the profile.
    #[error(transparent)]
    Core(#[from] mbt_core::CoreError),

    /// Talking to a device.
    #[error(transparent)]
    Modbus(#[from] mbt_modbus::ModbusError),

    /// Another error with what was being done.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The failure.
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a startup error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Prefixes the message with `context`. The exit code is unchanged.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process exit code, see the module table.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Core(_) => 5,
            Self::Modbus(_) => 6,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Runtime(format!("serialization failed: {err}"))
    }
}

/// Prints `error` on stderr and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    eprintln!("Error: {error}");
    std::process::exit(error.exit_code())
}
