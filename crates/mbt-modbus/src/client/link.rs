// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! A [`ModbusTransport`] over a `tokio-modbus` client context.
//!
//! TCP and RTU differ only in how the context is opened. That step lives
//! behind [`Connector`]; request timing, exception mapping and state
//! tracking are shared by [`LinkTransport`].

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_modbus::ExceptionCode;

use crate::error::{
    ConnectionError, ModbusError, ModbusResult, OperationError, ProtocolError, TimeoutError,
};

use super::transport::{ModbusTransport, TransportState};

// =============================================================================
// Connector
// =============================================================================

/// Opens the link to one device.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a client context addressed to [`Connector::unit_id`].
    async fn open(&self) -> ModbusResult<Context>;

    /// Unit ID requests are sent to.
    fn unit_id(&self) -> u8;

    /// Deadline for one request.
    fn request_timeout(&self) -> Duration;

    /// Human-readable name of the device, used in logs and errors.
    fn describe(&self) -> String;
}

// =============================================================================
// LinkTransport
// =============================================================================

/// One request is in flight at a time; the context sits behind an async
/// mutex so `&self` requests can be issued from any task.
pub struct LinkTransport<C> {
    connector: C,
    context: Mutex<Option<Context>>,
    state: TransportState,
}

impl<C: Connector> LinkTransport<C> {
    /// Creates a disconnected transport.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            context: Mutex::new(None),
            state: TransportState::Disconnected,
        }
    }

    /// The connector this transport opens links with.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn request<T, F>(&self, function_code: u8, call: F) -> ModbusResult<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a mut Context) -> BoxFuture<'a, tokio_modbus::Result<T>> + Send,
    {
        let mut guard = self.context.lock().await;
        let ctx = guard.as_mut().ok_or_else(ModbusError::not_connected)?;
        let after = self.connector.request_timeout();

        match timeout(after, call(ctx)).await {
            Err(_) => Err(TimeoutError::new(function_code, after).into()),
            Ok(Err(tokio_modbus::Error::Transport(e))) if e.kind() == io::ErrorKind::TimedOut => {
                Err(TimeoutError::new(function_code, after).into())
            }
            Ok(Err(tokio_modbus::Error::Transport(e))) => {
                Err(ConnectionError::dropped(self.connector.describe(), e).into())
            }
            Ok(Err(tokio_modbus::Error::Protocol(e))) => Err(ProtocolError::Malformed {
                function_code,
                message: e.to_string(),
            }
            .into()),
            Ok(Ok(Err(exception))) => {
                Err(ModbusError::exception(function_code, exception_code(exception)))
            }
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

/// Numeric value of an exception response.
fn exception_code(code: ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

#[async_trait]
impl<C: Connector> ModbusTransport for LinkTransport<C> {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        match self.connector.open().await {
            Ok(ctx) => {
                *self.context.get_mut() = Some(ctx);
                self.state = TransportState::Connected;
                tracing::info!(device = %self.connector.describe(), "Connected");
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Error;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut ctx) = self.context.get_mut().take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::warn!(device = %self.connector.describe(), error = %e, "Error while disconnecting");
            }
        }
        self.state = TransportState::Disconnected;
        tracing::debug!(device = %self.connector.describe(), "Disconnected");
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.request(0x01, move |ctx| {
            Box::pin(async move { ctx.read_coils(address, count).await })
        })
        .await
    }

    async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.request(0x02, move |ctx| {
            Box::pin(async move { ctx.read_discrete_inputs(address, count).await })
        })
        .await
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.request(0x03, move |ctx| {
            Box::pin(async move { ctx.read_holding_registers(address, count).await })
        })
        .await
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.request(0x04, move |ctx| {
            Box::pin(async move { ctx.read_input_registers(address, count).await })
        })
        .await
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.request(0x05, move |ctx| {
            Box::pin(async move { ctx.write_single_coil(address, value).await })
        })
        .await
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        if values.is_empty() {
            return Err(OperationError::not_supported("empty register write").into());
        }
        let values = values.to_vec();
        self.request(0x10, move |ctx| {
            Box::pin(async move { ctx.write_multiple_registers(address, &values).await })
        })
        .await
    }

    fn unit_id(&self) -> u8 {
        self.connector.unit_id()
    }

    fn display_name(&self) -> String {
        self.connector.describe()
    }
}

impl<C: fmt::Debug> fmt::Debug for LinkTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkTransport")
            .field("connector", &self.connector)
            .field("state", &self.state)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
