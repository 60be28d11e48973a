// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the register data model.
//!
//! # Error Categories
//!
//! ```text
//! CoreError
//! ├── Validation - malformed profile or register metadata (fatal at load)
//! ├── Cast       - a value cannot be coerced to the declared datatype
//! ├── Decode     - word count does not match the datatype width
//! └── Profile    - profile file I/O and (de)serialization
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;

/// Result alias for data model operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// CoreError
// =============================================================================

/// Top-level error for the register data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed profile or register metadata.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Value coercion failure.
    #[error("{0}")]
    Cast(#[from] CastError),

    /// Word count mismatch.
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// Profile persistence failure.
    #[error("{0}")]
    Profile(#[from] ProfileError),
}

impl CoreError {
    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Cast(_) => "cast",
            Self::Decode(_) => "decode",
            Self::Profile(_) => "profile",
        }
    }

    /// Returns `true` if this error should abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Profile(_) | Self::Decode(_))
    }

    /// Returns the tracing level this error is reported at.
    pub fn tracing_level(&self) -> Level {
        match self {
            Self::Cast(_) => Level::WARN,
            _ => Level::ERROR,
        }
    }

    /// Logs this error with context.
    pub fn log(&self, context: &str) {
        match self.tracing_level() {
            Level::WARN => tracing::warn!(category = self.category(), context, "{self}"),
            _ => tracing::error!(category = self.category(), context, "{self}"),
        }
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// Malformed profile or register metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Unknown datatype tag.
    #[error("Unknown datatype: '{dtype}'")]
    UnknownDataType {
        /// The offending tag.
        dtype: String,
    },

    /// Unknown register class key.
    #[error("Unknown register class: '{class}'")]
    UnknownClass {
        /// The offending key.
        class: String,
    },

    /// Register address is not an integer in 0..=65535.
    #[error("Invalid register address '{address}' in {class}")]
    InvalidAddress {
        /// Register class key.
        class: String,
        /// The offending address string.
        address: String,
    },

    /// A metadata field has an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Description.
        message: String,
    },

    /// The initial value of a register cannot be cast to its datatype.
    #[error("Invalid initial value for {class}[{address}]: {source}")]
    InitialValue {
        /// Register class key.
        class: String,
        /// Register address.
        address: u16,
        /// Cast failure.
        #[source]
        source: CastError,
    },

    /// Two registers of one class occupy the same word.
    #[error("Register {class}[{address}] overlaps {class}[{other}]")]
    Overlap {
        /// Register class key.
        class: String,
        /// Address of the later register.
        address: u16,
        /// Address of the earlier register.
        other: u16,
    },

    /// A register's words run past address 65535.
    #[error("Register {class}[{address}] needs {width} words and runs past address 65535")]
    AddressOverflow {
        /// Register class key.
        class: String,
        /// Register start address.
        address: u16,
        /// Register width in words.
        width: usize,
    },
}

impl ValidationError {
    /// Creates an unknown datatype error.
    pub fn unknown_data_type(dtype: impl Into<String>) -> Self {
        Self::UnknownDataType { dtype: dtype.into() }
    }

    /// Creates an unknown class error.
    pub fn unknown_class(class: impl Into<String>) -> Self {
        Self::UnknownClass { class: class.into() }
    }

    /// Creates an invalid address error.
    pub fn invalid_address(class: impl Into<String>, address: impl Into<String>) -> Self {
        Self::InvalidAddress {
            class: class.into(),
            address: address.into(),
        }
    }

    /// Creates an address overflow error.
    pub fn address_overflow(class: impl Into<String>, address: u16, width: usize) -> Self {
        Self::AddressOverflow {
            class: class.into(),
            address,
            width,
        }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// CastError
// =============================================================================

/// A value could not be coerced to the declared datatype.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CastError {
    /// Input is not a valid integer.
    #[error("Cannot cast '{input}' to integer type {dtype}")]
    NotAnInteger {
        /// Target datatype tag.
        dtype: String,
        /// Offending input.
        input: String,
    },

    /// Input is not a valid number.
    #[error("Cannot cast '{input}' to float type {dtype}")]
    NotAFloat {
        /// Target datatype tag.
        dtype: String,
        /// Offending input.
        input: String,
    },
}

impl CastError {
    /// Creates an integer cast error.
    pub fn not_an_integer(dtype: impl Into<String>, input: impl ToString) -> Self {
        Self::NotAnInteger {
            dtype: dtype.into(),
            input: input.to_string(),
        }
    }

    /// Creates a float cast error.
    pub fn not_a_float(dtype: impl Into<String>, input: impl ToString) -> Self {
        Self::NotAFloat {
            dtype: dtype.into(),
            input: input.to_string(),
        }
    }
}

// =============================================================================
// DecodeError
// =============================================================================

/// Wire words that cannot be turned back into a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Wrong number of words for the datatype.
    #[error("Word count mismatch for {dtype}: expected {expected}, got {actual}")]
    WordCount {
        /// Datatype tag.
        dtype: String,
        /// Words required.
        expected: usize,
        /// Words supplied.
        actual: usize,
    },

    /// String words are not valid UTF-8 at the declared length.
    #[error("Invalid UTF-8 in {dtype} after byte {valid_up_to}")]
    InvalidText {
        /// Datatype tag.
        dtype: String,
        /// Length of the valid prefix in bytes.
        valid_up_to: usize,
    },
}

impl DecodeError {
    /// Creates a word count error.
    pub fn word_count(dtype: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::WordCount {
            dtype: dtype.into(),
            expected,
            actual,
        }
    }

    /// Creates an invalid text error.
    pub fn invalid_text(dtype: impl Into<String>, valid_up_to: usize) -> Self {
        Self::InvalidText {
            dtype: dtype.into(),
            valid_up_to,
        }
    }
}

// =============================================================================
// ProfileError
// =============================================================================

/// Profile persistence failure.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Profile could not be located.
    #[error("Unknown profile: {name}")]
    NotFound {
        /// Name or path that was looked up.
        name: String,
    },

    /// File I/O failed.
    #[error("Failed to access profile '{path}': {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON was malformed.
    #[error("Failed to parse profile '{path}': {message}")]
    Parse {
        /// File path, or `<string>` for in-memory input.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Profile could not be serialized.
    #[error("Failed to serialize profile: {message}")]
    Serialize {
        /// Serializer message.
        message: String,
    },
}

impl ProfileError {
    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
