// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP links.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use crate::error::{ConnectionError, ModbusResult};
use crate::types::ModbusTcpConfig;

use super::link::{Connector, LinkTransport};

/// Modbus TCP transport.
pub type ModbusTcpTransport = LinkTransport<ModbusTcpConfig>;

impl ModbusTcpTransport {
    /// Unit `unit_id` at `host:port` with default timeouts.
    pub fn simple(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self::new(ModbusTcpConfig::new(host, port).with_unit(unit_id))
    }
}

#[async_trait]
impl Connector for ModbusTcpConfig {
    async fn open(&self) -> ModbusResult<Context> {
        let endpoint = self.socket_addr();
        let stream = match timeout(self.timeout, TcpStream::connect(endpoint.as_str())).await {
            Err(_) => {
                return Err(ConnectionError::ConnectTimeout {
                    endpoint,
                    after: self.timeout,
                }
                .into())
            }
            Ok(Err(e)) => return Err(ConnectionError::unreachable(endpoint, e).into()),
            Ok(Ok(stream)) => stream,
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(endpoint = %endpoint, error = %e, "TCP_NODELAY not set");
        }
        Ok(tcp::attach_slave(stream, Slave(self.unit_id)))
    }

    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self) -> String {
        format!("Modbus TCP {} (unit {})", self.socket_addr(), self.unit_id)
    }
}
