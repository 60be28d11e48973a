// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU links over a serial port opened with `tokio-serial`.

use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_serial::SerialPortBuilderExt;

use crate::error::{ConfigurationError, ConnectionError, ModbusResult};
use crate::types::{ModbusRtuConfig, Parity, SerialFrame};

use super::link::{Connector, LinkTransport};

/// Modbus RTU transport.
pub type ModbusRtuTransport = LinkTransport<ModbusRtuConfig>;

impl ModbusRtuTransport {
    /// Unit 1 on `port` at 9600 8N1.
    pub fn simple(port: impl Into<String>) -> Self {
        Self::new(ModbusRtuConfig::new(port))
    }
}

fn data_bits(frame: &SerialFrame) -> ModbusResult<tokio_serial::DataBits> {
    match frame.data_bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        other => Err(ConfigurationError::invalid("data_bits", other).into()),
    }
}

fn stop_bits(frame: &SerialFrame) -> ModbusResult<tokio_serial::StopBits> {
    match frame.stop_bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        other => Err(ConfigurationError::invalid("stop_bits", other).into()),
    }
}

fn parity(frame: &SerialFrame) -> tokio_serial::Parity {
    match frame.parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

#[async_trait]
impl Connector for ModbusRtuConfig {
    async fn open(&self) -> ModbusResult<Context> {
        let serial = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(data_bits(&self.frame)?)
            .parity(parity(&self.frame))
            .stop_bits(stop_bits(&self.frame)?)
            .open_native_async()
            .map_err(|e| ConnectionError::serial(&self.port, e.to_string()))?;
        Ok(rtu::attach_slave(serial, Slave(self.unit_id)))
    }

    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self) -> String {
        format!(
            "Modbus RTU {} {} {} (unit {})",
            self.port, self.baud_rate, self.frame, self.unit_id
        )
    }
}
