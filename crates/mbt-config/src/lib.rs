// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # mbt-config
//!
//! Configuration management for the MBTester Modbus harness.
//!
//! ## Features
//!
//! - **Schema Definition**: server, client, polling and logging sections
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `MBTESTER_*` variables and `${VAR:-default}` placeholders
//! - **Profile Discovery**: locate register profiles by name on a search path
//!
//! ## Quick Start
//!
//! ```no_run
//! use mbt_config::loader::load_config;
//!
//! let config = load_config("mbtester.yaml").unwrap();
//! println!("Client: {}", config.client.endpoint());
//! ```
//!
//! ## Example configuration
//!
//! ```yaml
//! profile: pump.json
//! server:
//!   host: 0.0.0.0
//!   port: 502
//! client:
//!   comm: serial
//!   serial:
//!     port: /dev/ttyUSB0
//!     baud_rate: 19200
//!   device_id: 7
//! polling:
//!   interval_ms: 5000
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod locator;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, parse_log_level, ConfigFormat, ConfigLoader};
pub use locator::{ProfileEntry, ProfileLocator};
pub use schema::{
    ClientConfig, CommKind, HarnessConfig, LogFormat, LogLevel, LoggingConfig, Parity,
    PollingConfig, SerialConfig, ServerConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "mbt-config");
    }
}
