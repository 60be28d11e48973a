// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # mbt-core
//!
//! Register data model for the MBTester Modbus harness.
//!
//! This crate holds everything that is independent of transport:
//!
//! - **Types**: register classes, datatype tags, byte/word order, values
//! - **Codec**: pure conversion between values and 16-bit wire words
//! - **Register**: fully populated register metadata and its defaults
//! - **Profile**: the JSON register bank, loaded once and saved on demand
//! - **Error**: validation, cast, decode and profile errors
//!
//! ## Example
//!
//! ```rust
//! use mbt_core::{codec, Profile, RegisterClass};
//!
//! let profile = Profile::from_json_str(
//!     r#"{"identity": "Demo", "datablocks": {"hr": {"10": {"dtype": "uint16", "value": 300}}}}"#,
//! ).unwrap();
//!
//! let register = profile.register(RegisterClass::HoldingRegister, 10).unwrap();
//! assert_eq!(codec::encode(register, &register.value).unwrap(), vec![300]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod codec;
pub mod error;
pub mod profile;
pub mod register;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{
    CastError, CoreError, CoreResult, DecodeError, ProfileError, ValidationError,
};
pub use profile::{Profile, RegisterBank, SharedProfile};
pub use register::{Register, RegisterSpec};
pub use types::{Access, DataType, Endian, RegisterClass, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Application name shown in banners and `version` output.
pub const APP_NAME: &str = "MBTester";

/// Returns the application title, optionally suffixed with a role.
///
/// ```
/// assert_eq!(mbt_core::app_title("proxy"), format!("MBTester Proxy {}", mbt_core::VERSION));
/// ```
pub fn app_title(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => format!(
            "{APP_NAME} {}{} {VERSION}",
            first.to_uppercase(),
            chars.as_str().to_lowercase()
        ),
        None => format!("{APP_NAME} {VERSION}"),
    }
}
