// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Local Modbus TCP server backed by register stores.
//!
//! ```text
//! TCP client ──► ModbusServer ──► RegisterService ──► DeviceStore
//!                                                      │
//!                                            read/write observers
//! ```

mod service;
mod store;

pub use service::RegisterService;
pub use store::{DeviceStore, RegisterStore};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::error::{ConnectionError, ModbusError, ModbusResult};
use crate::types::ModbusServerConfig;

// =============================================================================
// ModbusServer
// =============================================================================

/// A running TCP server.
///
/// Dropping the server stops it.
#[derive(Debug)]
pub struct ModbusServer {
    local_addr: SocketAddr,
    device: Arc<DeviceStore>,
    task: Option<JoinHandle<()>>,
}

impl ModbusServer {
    /// Binds `config`'s address and starts accepting connections.
    ///
    /// Port 0 binds an ephemeral port; see [`local_addr`](Self::local_addr).
    pub async fn start(config: &ModbusServerConfig, device: Arc<DeviceStore>) -> ModbusResult<Self> {
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ConnectionError::io(format!("failed to bind {addr}"), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ConnectionError::io("failed to read bound address", e))?;

        let service = RegisterService::new(Arc::clone(&device));
        let task = tokio::spawn(async move {
            let server = Server::new(listener);
            let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
                let service = service.clone();
                async move {
                    tracing::debug!(peer = %socket_addr, "Client connected");
                    accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(service.clone())))
                }
            };
            let on_process_error = |error: std::io::Error| {
                tracing::warn!(error = %error, "Connection closed with error");
            };
            if let Err(e) = server.serve(&on_connected, on_process_error).await {
                ModbusError::from(ConnectionError::io("server stopped", e)).log("server");
            }
        });

        tracing::info!(
            address = %local_addr,
            device_id = device.device_id(),
            "Modbus server listening"
        );

        Ok(Self {
            local_addr,
            device,
            task: Some(task),
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The served registers.
    pub fn device(&self) -> &Arc<DeviceStore> {
        &self.device
    }

    /// Returns `true` while the accept loop runs.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops accepting connections.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(address = %self.local_addr, "Modbus server stopped");
        }
    }
}

impl Drop for ModbusServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbt_core::Profile;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let device = DeviceStore::from_profile(1, Profile::new("empty").into_shared()).unwrap();
        let mut server = ModbusServer::start(&ModbusServerConfig::new("127.0.0.1", 0, 1), Arc::new(device))
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.is_running());
        server.stop();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_bad_host_fails() {
        let device = DeviceStore::from_profile(1, Profile::new("empty").into_shared()).unwrap();
        let result =
            ModbusServer::start(&ModbusServerConfig::new("not an address", 0, 1), Arc::new(device))
                .await;
        assert!(result.is_err());
    }
}
