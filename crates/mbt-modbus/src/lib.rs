// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # mbt-modbus
//!
//! Modbus roles for the MBTester harness, built on `tokio-modbus`.
//!
//! - **Client**: TCP/RTU transports, retries and a typed [`RemoteSession`]
//! - **Server**: sparse [`RegisterStore`]s with read/write observers, served
//!   over Modbus TCP
//! - **Poller**: a background [`PollingEngine`] cycling the profile through
//!   a remote device
//! - **Proxy**: a [`ProxyBridge`] mirroring every server access to a live
//!   remote device
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐
//!              │   Profile    │ (mbt-core)
//!              └──────────────┘
//!               │            │
//!               ▼            ▼
//! ┌────────────────────┐   ┌────────────────────┐
//! │   DeviceStore      │   │   RemoteSession    │
//! │ (server observers) │   │ (typed client)     │
//! └────────────────────┘   └────────────────────┘
//!               ▲            ▲            ▲
//!               │            │            │
//!          ┌─────────────────────┐   ┌────────────────┐
//!          │     ProxyBridge     │   │ PollingEngine  │
//!          └─────────────────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mbt_core::{Profile, RegisterClass};
//! use mbt_modbus::client::{AnyTransport, RemoteSession};
//! use mbt_modbus::types::{ClientEndpoint, ModbusTcpConfig};
//!
//! let profile = Profile::load("device.json")?.into_shared();
//! let endpoint = ClientEndpoint::Tcp(ModbusTcpConfig::new("192.168.1.100", 502));
//! let session = RemoteSession::new(AnyTransport::with_retries(&endpoint, 3), profile);
//!
//! session.connect().await?;
//! let value = session.read(RegisterClass::HoldingRegister, 10).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod client;
pub mod error;
pub mod hooks;
pub mod poller;
pub mod proxy;
pub mod server;
pub mod types;

// =============================================================================
// Re-exports - Error Module
// =============================================================================

pub use error::{
    // Main error type
    ModbusError,
    ModbusResult,
    // Error categories
    ConfigurationError,
    ConnectionError,
    OperationError,
    ProtocolError,
    TimeoutError,
    // Error metadata
    ErrorCode,
};

// =============================================================================
// Re-exports - Types Module
// =============================================================================

pub use types::{
    ClientEndpoint,
    ModbusRtuConfig,
    ModbusServerConfig,
    ModbusTcpConfig,
    Parity,
    SerialFrame,
};

// =============================================================================
// Re-exports - Roles
// =============================================================================

pub use client::{
    AnyTransport, BlockingSession, Connector, Download, DownloadEntry, LinkTransport,
    ModbusRtuTransport, ModbusTcpTransport, ModbusTransport, RemoteRegisters, RemoteSession,
    RetryConfig, RetryTransport, TransportState,
};
pub use hooks::{HookList, StoreAccess};
pub use poller::{BacklogEntry, PollStatus, PollingEngine};
pub use proxy::{BridgeState, BridgeStats, Proxy, ProxyBridge};
pub use server::{DeviceStore, ModbusServer, RegisterService, RegisterStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
