// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client side of the harness.
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ BlockingSession               │  RemoteRegisters for worker threads
//! └───────────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐
//! │ RemoteSession                 │  typed read/write through the codec
//! └───────────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐
//! │ RetryTransport<AnyTransport>  │  transient failure retries
//! └───────────────────────────────┘
//!        │                 │
//!        ▼                 ▼
//! ┌──────────────┐  ┌──────────────┐
//! │ TCP          │  │ RTU          │
//! └──────────────┘  └──────────────┘
//! ```

mod blocking;
mod link;
mod retry;
mod rtu;
mod session;
mod tcp;
mod transport;

pub use blocking::{BlockingSession, RemoteRegisters};
pub use link::{Connector, LinkTransport};
pub use retry::{RetryConfig, RetryTransport};
pub use rtu::ModbusRtuTransport;
pub use session::{Download, DownloadEntry, RemoteSession, SessionStats};
pub use tcp::ModbusTcpTransport;
pub use transport::{ModbusTransport, TransportState};

use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::Context;

use crate::error::ModbusResult;
use crate::types::ClientEndpoint;

// =============================================================================
// AnyTransport
// =============================================================================

/// A TCP or RTU transport chosen at runtime.
pub type AnyTransport = LinkTransport<ClientEndpoint>;

impl AnyTransport {
    /// Builds the transport for `endpoint`.
    pub fn from_endpoint(endpoint: &ClientEndpoint) -> Self {
        Self::new(endpoint.clone())
    }

    /// Builds the transport for `endpoint`, wrapped with `retries` retries.
    pub fn with_retries(endpoint: &ClientEndpoint, retries: u32) -> RetryTransport<Self> {
        RetryTransport::new(Self::from_endpoint(endpoint), RetryConfig::new(retries))
    }
}

#[async_trait]
impl Connector for ClientEndpoint {
    async fn open(&self) -> ModbusResult<Context> {
        match self {
            Self::Tcp(c) => c.open().await,
            Self::Rtu(c) => c.open().await,
        }
    }

    fn unit_id(&self) -> u8 {
        match self {
            Self::Tcp(c) => c.unit_id,
            Self::Rtu(c) => c.unit_id,
        }
    }

    fn request_timeout(&self) -> Duration {
        match self {
            Self::Tcp(c) => c.timeout,
            Self::Rtu(c) => c.timeout,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Tcp(c) => c.describe(),
            Self::Rtu(c) => c.describe(),
        }
    }
}
