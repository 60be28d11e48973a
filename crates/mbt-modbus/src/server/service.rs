// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol service answering requests from a [`DeviceStore`].
//!
//! Store access runs on the blocking pool because observers may perform a
//! blocking network round trip of their own.

use std::sync::Arc;

use futures::future::BoxFuture;
use mbt_core::RegisterClass;
use tokio_modbus::prelude::{ExceptionCode, Request, Response, SlaveRequest};

use super::store::DeviceStore;

/// Unit id that addresses every device.
const BROADCAST: u8 = 0;

/// Unit id TCP clients use when the field is unused.
const UNUSED_UNIT: u8 = 0xFF;

// =============================================================================
// RegisterService
// =============================================================================

/// `tokio_modbus` service over a [`DeviceStore`].
#[derive(Debug, Clone)]
pub struct RegisterService {
    device: Arc<DeviceStore>,
}

impl RegisterService {
    /// Creates a service answering for `device`.
    pub fn new(device: Arc<DeviceStore>) -> Self {
        Self { device }
    }

    /// Handles one request synchronously.
    pub fn handle(&self, unit: u8, request: Request<'_>) -> Result<Response, ExceptionCode> {
        if unit != self.device.device_id() && unit != BROADCAST && unit != UNUSED_UNIT {
            tracing::debug!(unit, device_id = self.device.device_id(), "Request for another unit");
            return Err(ExceptionCode::GatewayTargetDevice);
        }

        match request {
            Request::ReadCoils(address, count) => {
                self.read_bits(RegisterClass::Coil, address, count).map(Response::ReadCoils)
            }
            Request::ReadDiscreteInputs(address, count) => self
                .read_bits(RegisterClass::DiscreteInput, address, count)
                .map(Response::ReadDiscreteInputs),
            Request::ReadHoldingRegisters(address, count) => self
                .read_words(RegisterClass::HoldingRegister, address, count)
                .map(Response::ReadHoldingRegisters),
            Request::ReadInputRegisters(address, count) => self
                .read_words(RegisterClass::InputRegister, address, count)
                .map(Response::ReadInputRegisters),
            Request::WriteSingleCoil(address, value) => {
                let stored = self.write(RegisterClass::Coil, address, &[u16::from(value)])?;
                let bit = stored.first().is_some_and(|w| *w != 0);
                Ok(Response::WriteSingleCoil(address, bit))
            }
            Request::WriteMultipleCoils(address, values) => {
                let words: Vec<u16> = values.iter().map(|b| u16::from(*b)).collect();
                self.write(RegisterClass::Coil, address, &words)?;
                Ok(Response::WriteMultipleCoils(address, words.len() as u16))
            }
            Request::WriteSingleRegister(address, value) => {
                let stored = self.write(RegisterClass::HoldingRegister, address, &[value])?;
                Ok(Response::WriteSingleRegister(
                    address,
                    stored.first().copied().unwrap_or(value),
                ))
            }
            Request::WriteMultipleRegisters(address, values) => {
                self.write(RegisterClass::HoldingRegister, address, &values)?;
                Ok(Response::WriteMultipleRegisters(address, values.len() as u16))
            }
            other => {
                tracing::debug!(request = ?other, "Unsupported function");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }

    fn read_words(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ExceptionCode> {
        let store = self.device.store(class);
        if !store.validate(address, count as usize) {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        store.get(address, count as usize).map_err(|e| {
            e.log("server read");
            ExceptionCode::ServerDeviceFailure
        })
    }

    fn read_bits(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, ExceptionCode> {
        self.read_words(class, address, count)
            .map(|words| words.into_iter().map(|w| w != 0).collect())
    }

    fn write(
        &self,
        class: RegisterClass,
        address: u16,
        values: &[u16],
    ) -> Result<Vec<u16>, ExceptionCode> {
        let store = self.device.store(class);
        if !store.validate(address, values.len()) {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        store.set(address, values).map_err(|e| {
            e.log("server write");
            ExceptionCode::ServerDeviceFailure
        })
    }
}

impl tokio_modbus::server::Service for RegisterService {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = BoxFuture<'static, Result<Response, ExceptionCode>>;

    fn call(&self, request: Self::Request) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let SlaveRequest { slave, request } = request;
            tokio::task::spawn_blocking(move || service.handle(slave, request))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Request handler panicked");
                    Err(ExceptionCode::ServerDeviceFailure)
                })
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
