// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract transport layer for Modbus communication.
//!
//! [`ModbusTransport`] is the only way the rest of the crate talks to a
//! remote device. Everything above it works in terms of four primitives:
//! read bits, read words, write one bit and write words.

use std::fmt;

use async_trait::async_trait;
use mbt_core::RegisterClass;

use crate::error::{ModbusResult, OperationError};

// =============================================================================
// TransportState
// =============================================================================

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Transport is disconnected.
    #[default]
    Disconnected,
    /// Transport is connecting.
    Connecting,
    /// Transport is connected and ready.
    Connected,
    /// The last connect attempt failed.
    Error,
}

impl TransportState {
    /// Returns `true` if the transport is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

// =============================================================================
// ModbusTransport Trait
// =============================================================================

/// Abstract transport layer for Modbus communication.
///
/// Implementations own the link (socket or serial port) and translate
/// library failures into [`ModbusError`]. Requests are addressed with
/// wire addresses; profile offsets are applied by the caller.
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Establishes a connection to the Modbus device.
    async fn connect(&mut self) -> ModbusResult<()>;

    /// Disconnects from the Modbus device.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Returns `true` if the transport is connected.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns the current transport state.
    fn state(&self) -> TransportState;

    // =========================================================================
    // Function Codes 1-6, 16
    // =========================================================================

    /// Reads coils (FC 01).
    async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>>;

    /// Reads discrete inputs (FC 02).
    async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>>;

    /// Reads holding registers (FC 03).
    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Reads input registers (FC 04).
    async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// Writes a single coil (FC 05).
    async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()>;

    /// Writes multiple holding registers (FC 16).
    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()>;

    // =========================================================================
    // Primitives by register class
    // =========================================================================

    /// Reads `count` bits from a bit class.
    async fn read_bits(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        match class {
            RegisterClass::Coil => self.read_coils(address, count).await,
            RegisterClass::DiscreteInput => self.read_discrete_inputs(address, count).await,
            _ => Err(OperationError::not_supported(format!("bit read on {class}")).into()),
        }
    }

    /// Reads `count` words from a word class.
    async fn read_words(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        match class {
            RegisterClass::HoldingRegister => self.read_holding_registers(address, count).await,
            RegisterClass::InputRegister => self.read_input_registers(address, count).await,
            _ => Err(OperationError::not_supported(format!("word read on {class}")).into()),
        }
    }

    /// Writes one coil.
    async fn write_bit(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.write_single_coil(address, value).await
    }

    /// Writes consecutive holding registers.
    async fn write_words(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        self.write_multiple_registers(address, values).await
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the unit ID (slave address).
    fn unit_id(&self) -> u8;

    /// Returns a display name for this transport.
    fn display_name(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Connected.is_connected());
        assert!(!TransportState::Disconnected.is_connected());
        assert!(!TransportState::Error.is_connected());
        assert_eq!(TransportState::default(), TransportState::Disconnected);
    }

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Connected.to_string(), "connected");
        assert_eq!(TransportState::Disconnected.to_string(), "disconnected");
    }
}
