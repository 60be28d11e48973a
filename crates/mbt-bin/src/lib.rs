// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # mbt-bin
//!
//! Command line front end of the MBTester Modbus harness.
//!
//! - CLI argument parsing with clap
//! - Configuration and profile resolution
//! - Logging initialization
//! - Signal-driven shutdown
//! - One command per harness role: serve, download, poll, proxy, read, write
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └──────────┘ └──────────┘
//!               │           │
//!               │    ┌──────▼──────┐
//!               │    │  shutdown   │
//!               │    └─────────────┘
//!        ┌──────┴──────┐
//!        │   mbt-*     │
//!        └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Serve a profile on port 5020
//! mbtester -p pump serve --listen-port 5020
//!
//! # Download every register from a device
//! mbtester -p pump download -H 192.168.1.20
//!
//! # Poll a serial device every five seconds
//! mbtester -p pump poll -s /dev/ttyUSB0 -i 5s
//!
//! # Mirror a device on a local server
//! mbtester -p pump proxy -H 192.168.1.20 --listen-port 5020
//!
//! # Single register access
//! mbtester -p pump read hr 10
//! mbtester -p pump write hr 10 1234
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{HarnessRuntime, RuntimeBuilder, Session};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
