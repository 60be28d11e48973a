// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading the harness configuration and locating
//! profiles.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("Configuration file not found: {}", .path.display())]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The extension names no supported format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// Extension found.
        format: String,
    },

    /// The text does not deserialize. `path` is set when it came from a file.
    #[error("{}{message}", .path.as_ref().map(|p| format!("{}: ", p.display())).unwrap_or_default())]
    Parse {
        /// Source file, if any.
        path: Option<PathBuf>,
        /// Deserializer message.
        message: String,
    },

    /// A `MBTESTER_*` override holds an unusable value.
    #[error("Invalid value in {name}: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// What was expected.
        message: String,
    },

    /// A field breaks a rule.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Dotted field path.
        field: String,
        /// The rule broken.
        message: String,
    },

    /// A numeric field is outside its range.
    #[error("{field} is {value}, expected {min}..={max}")]
    OutOfRange {
        /// Dotted field path.
        field: String,
        /// Value found.
        value: String,
        /// Lowest accepted value.
        min: String,
        /// Highest accepted value.
        max: String,
    },

    /// No profile on the search path matches.
    #[error("Unknown profile: {name}")]
    ProfileNotFound {
        /// Requested profile name or path.
        name: String,
    },
}

impl ConfigError {
    /// Creates a parse error for text from `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    /// Creates a parse error for text with no file behind it.
    pub fn serialization(message: impl Display) -> Self {
        Self::Parse {
            path: None,
            message: message.to_string(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a profile not found error.
    pub fn profile_not_found(name: impl Into<String>) -> Self {
        Self::ProfileNotFound { name: name.into() }
    }

    /// Creates an out of range error.
    pub fn out_of_range<T: Display>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }
}
