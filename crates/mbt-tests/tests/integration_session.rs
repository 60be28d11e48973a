// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Remote Session Integration Tests
//!
//! A [`RemoteSession`] over a [`MockTransport`]:
//!
//! - `test_read_*` / `test_write_*`: typed access through the codec
//! - `test_offset_*`: profile to wire address translation
//! - `test_download_*`: whole-profile reads

use std::sync::Arc;

use mbt_core::{RegisterClass, Value};
use mbt_modbus::error::OperationError;
use mbt_modbus::{BlockingSession, ModbusError, RemoteRegisters, RemoteSession, TransportState};

use mbt_tests::common::{init_test_logging, MockDevice, MockTransport, ProfileFixtures};

fn pump_device() -> Arc<MockDevice> {
    let device = MockDevice::new();
    device.load(RegisterClass::DiscreteInput, 0, &[1, 0]);
    device.load(RegisterClass::Coil, 0, &[0]);
    device.load(RegisterClass::HoldingRegister, 10, &[300]);
    // 12.5f32 = 0x4148_0000, high word first
    device.load(RegisterClass::HoldingRegister, 20, &[0x4148, 0x0000]);
    device.load(RegisterClass::InputRegister, 0, &[(-5i16) as u16]);
    device
}

async fn session(device: &Arc<MockDevice>) -> RemoteSession<MockTransport> {
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(device)),
        ProfileFixtures::pump().into_shared(),
    );
    session.connect().await.unwrap();
    session
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_read_before_connect_fails() {
    init_test_logging();
    let device = pump_device();
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::pump().into_shared(),
    );

    let result = session.read(RegisterClass::HoldingRegister, 10).await;
    assert!(matches!(result, Err(ModbusError::Connection(_))));
    assert_eq!(session.stats().total_requests(), 1);
    assert_eq!(session.stats().failed_requests(), 1);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let device = pump_device();
    device.set_refuse_connect(true);
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::pump().into_shared(),
    );

    assert!(session.connect().await.is_err());
    assert_eq!(session.state().await, TransportState::Error);
}

#[tokio::test]
async fn test_close_disconnects() {
    let device = pump_device();
    let session = session(&device).await;
    assert_eq!(session.state().await, TransportState::Connected);

    session.close().await;
    assert_eq!(session.state().await, TransportState::Disconnected);
    assert!(session.read(RegisterClass::HoldingRegister, 10).await.is_err());
}

// =============================================================================
// Read / Write
// =============================================================================

#[tokio::test]
async fn test_read_decodes_every_class() {
    let device = pump_device();
    let session = session(&device).await;

    assert_eq!(
        session.read(RegisterClass::DiscreteInput, 0).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        session.read(RegisterClass::Coil, 0).await.unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        session.read(RegisterClass::HoldingRegister, 10).await.unwrap(),
        Value::Int(300)
    );
    assert_eq!(
        session.read(RegisterClass::HoldingRegister, 20).await.unwrap(),
        Value::Float(12.5)
    );
    assert_eq!(
        session.read(RegisterClass::InputRegister, 0).await.unwrap(),
        Value::Int(-5)
    );
    assert_eq!(session.stats().failed_requests(), 0);
}

#[tokio::test]
async fn test_read_failure_returns_error() {
    init_test_logging();
    let device = pump_device();
    let session = session(&device).await;
    device.set_fail(true);

    assert!(matches!(
        session.read(RegisterClass::HoldingRegister, 10).await,
        Err(ModbusError::Protocol(_))
    ));
    assert_eq!(session.stats().failed_requests(), 1);
}

#[tokio::test]
async fn test_read_unknown_register_fails_locally() {
    let device = pump_device();
    let session = session(&device).await;

    let result = session.read(RegisterClass::HoldingRegister, 99).await;
    assert!(matches!(
        result,
        Err(ModbusError::Operation(OperationError::UnknownRegister { .. }))
    ));
    assert_eq!(device.requests(), 0);
}

#[tokio::test]
async fn test_write_casts_and_encodes() {
    let device = pump_device();
    let session = session(&device).await;

    session
        .write(RegisterClass::HoldingRegister, 10, &Value::from("301"))
        .await
        .unwrap();
    session
        .write(RegisterClass::Coil, 0, &Value::from("TRUE"))
        .await
        .unwrap();

    assert_eq!(
        device.writes(),
        vec![
            (RegisterClass::HoldingRegister, 10, vec![301]),
            (RegisterClass::Coil, 0, vec![1]),
        ]
    );
}

#[tokio::test]
async fn test_write_to_read_only_class_is_rejected_locally() {
    let device = pump_device();
    let session = session(&device).await;

    for class in [RegisterClass::DiscreteInput, RegisterClass::InputRegister] {
        let result = session.write(class, 0, &Value::Int(1)).await;
        assert!(matches!(
            result,
            Err(ModbusError::Operation(OperationError::ReadOnly { .. }))
        ));
    }
    assert_eq!(device.requests(), 0);
    assert_eq!(session.stats().failed_requests(), 2);
}

#[tokio::test]
async fn test_write_uncastable_value_fails() {
    let device = pump_device();
    let session = session(&device).await;

    let result = session
        .write(RegisterClass::HoldingRegister, 10, &Value::from("pump"))
        .await;
    assert!(matches!(result, Err(ModbusError::Codec(_))));
    assert!(device.writes().is_empty());
}

// =============================================================================
// Offset
// =============================================================================

#[tokio::test]
async fn test_offset_shifts_wire_address() {
    let device = MockDevice::new();
    device.load(RegisterClass::HoldingRegister, 9, &[77]);
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::scenario().into_shared(),
    )
    .with_offset(-1);
    session.connect().await.unwrap();

    assert_eq!(
        session.read(RegisterClass::HoldingRegister, 10).await.unwrap(),
        Value::Int(77)
    );
    session
        .write(RegisterClass::HoldingRegister, 10, &Value::Int(5))
        .await
        .unwrap();
    assert_eq!(device.word(RegisterClass::HoldingRegister, 9), Some(5));
}

#[tokio::test]
async fn test_offset_below_zero_fails() {
    let device = pump_device();
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::pump().into_shared(),
    )
    .with_offset(-1);
    session.connect().await.unwrap();

    assert!(session.read(RegisterClass::InputRegister, 0).await.is_err());
    assert_eq!(device.requests(), 0);
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_skips_unreadable_registers() {
    init_test_logging();
    let device = pump_device();
    let session = session(&device).await;

    let download = session.download().await;
    assert_eq!(download.identity, "Pump Controller");

    let hr = &download.datablocks[&RegisterClass::HoldingRegister];
    assert_eq!(hr[&10].name, "Setpoint");
    assert_eq!(hr[&10].value, Value::Int(300));
    // the tag at 30 was never loaded into the device
    assert!(!hr.contains_key(&30));
    assert_eq!(download.datablocks[&RegisterClass::DiscreteInput].len(), 2);

    let json = serde_json::to_value(&download).unwrap();
    assert_eq!(json["identity"], "Pump Controller");
}

#[tokio::test]
async fn test_download_omits_empty_classes() {
    let device = pump_device();
    let session = session(&device).await;
    device.set_fail(true);

    let download = session.download().await;
    assert!(download.datablocks.is_empty());
}

// =============================================================================
// Blocking access
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_session_from_worker_thread() {
    let device = pump_device();
    let session = Arc::new(session(&device).await);
    let blocking = BlockingSession::current(Arc::clone(&session));

    let value = tokio::task::spawn_blocking(move || {
        blocking.write(RegisterClass::HoldingRegister, 10, &Value::Int(42))?;
        blocking.read(RegisterClass::HoldingRegister, 10)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(value, Value::Int(42));
}
