// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Proxy Bridge Integration Tests
//!
//! - `test_bridge_*`: store accesses mirrored to a [`MockRemote`]
//! - `test_concurrency_*`: serialized remote access under load
//! - `test_proxy_*`: the full proxy over a mock transport

use std::sync::Arc;

use mbt_core::{RegisterClass, Value};
use mbt_modbus::{
    BridgeState, DeviceStore, ModbusServerConfig, ModbusTcpTransport, ModbusTransport, Proxy,
    ProxyBridge, RemoteSession,
};

use mbt_tests::common::{
    init_test_logging, MockDevice, MockRemote, MockTransport, ProfileFixtures, RemoteCall,
};

const HR: RegisterClass = RegisterClass::HoldingRegister;

fn bridged() -> (Arc<MockRemote>, Arc<DeviceStore>, Arc<ProxyBridge>) {
    init_test_logging();
    let device = Arc::new(
        DeviceStore::from_profile(1, ProfileFixtures::scenario().into_shared()).unwrap(),
    );
    let remote = MockRemote::new();
    remote.set(HR, 10, 300);
    let bridge = ProxyBridge::attach(remote.clone(), Arc::clone(&device));
    (remote, device, bridge)
}

fn stored_value(device: &DeviceStore) -> Value {
    device
        .profile()
        .read()
        .register(HR, 10)
        .unwrap()
        .value
        .clone()
}

// =============================================================================
// Bridge
// =============================================================================

#[test]
fn test_bridge_read_refreshes_store() {
    let (remote, device, bridge) = bridged();
    remote.set(HR, 10, 555);

    let store = device.store(HR);
    assert_eq!(store.get(10, 1).unwrap(), vec![555]);
    assert_eq!(store.snapshot(10, 1).unwrap(), vec![555]);
    assert_eq!(stored_value(&device), Value::Int(555));

    assert_eq!(remote.history(), vec![RemoteCall::Read(HR, 10)]);
    assert_eq!(bridge.stats().reads(), 1);
    // refreshing the store fired the bridge's own write observer
    assert_eq!(bridge.stats().passthrough(), 1);
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[test]
fn test_bridge_write_reaches_remote() {
    let (remote, device, bridge) = bridged();

    assert_eq!(device.store(HR).set(10, &[301]).unwrap(), vec![301]);
    assert_eq!(remote.get(HR, 10), Some(Value::Int(301)));
    assert_eq!(stored_value(&device), Value::Int(301));
    assert_eq!(bridge.stats().writes(), 1);
    assert_eq!(bridge.stats().failures(), 0);
}

#[test]
fn test_bridge_write_failure_rolls_back() {
    let (remote, device, bridge) = bridged();
    remote.set_fail_writes(true);

    let store = device.store(HR);
    assert_eq!(store.set(10, &[301]).unwrap(), vec![300]);
    assert_eq!(store.snapshot(10, 1).unwrap(), vec![300]);
    assert_eq!(stored_value(&device), Value::Int(300));
    assert_eq!(remote.get(HR, 10), Some(Value::Int(300)));
    assert_eq!(bridge.stats().failures(), 1);
}

#[test]
fn test_bridge_read_failure_serves_stored_words() {
    let (remote, device, bridge) = bridged();
    remote.set_fail_reads(true);

    assert_eq!(device.store(HR).get(10, 1).unwrap(), vec![300]);
    assert_eq!(bridge.stats().failures(), 1);
    assert_eq!(bridge.stats().passthrough(), 0);
}

#[test]
fn test_bridge_does_not_outlive_itself() {
    let (remote, device, bridge) = bridged();
    drop(bridge);

    assert_eq!(device.store(HR).get(10, 1).unwrap(), vec![300]);
    assert_eq!(remote.calls(), 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrency_thousand_reads_make_thousand_remote_calls() {
    let (remote, device, bridge) = bridged();

    std::thread::scope(|scope| {
        for _ in 0..10 {
            let store = Arc::clone(device.store(HR));
            scope.spawn(move || {
                for _ in 0..100 {
                    store.get(10, 1).unwrap();
                }
            });
        }
    });

    assert_eq!(remote.reads(), 1000);
    assert_eq!(remote.calls(), 1000);
    assert_eq!(remote.max_depth(), 1);
    assert_eq!(bridge.stats().passthrough(), 1000);
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[test]
fn test_concurrency_mixed_access_is_serialized() {
    let (remote, device, _bridge) = bridged();

    std::thread::scope(|scope| {
        for worker in 0..10u16 {
            let store = Arc::clone(device.store(HR));
            scope.spawn(move || {
                for i in 0..100u16 {
                    if (worker + i) % 2 == 0 {
                        store.get(10, 1).unwrap();
                    } else {
                        store.set(10, &[worker * 100 + i]).unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(remote.reads(), 500);
    assert_eq!(remote.writes(), 500);
    assert_eq!(remote.max_depth(), 1);
}

// =============================================================================
// Proxy
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_proxy_refuses_to_start_without_remote() {
    init_test_logging();
    let device = MockDevice::new();
    device.set_refuse_connect(true);
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::scenario().into_shared(),
    );

    let result = Proxy::start(session, &ModbusServerConfig::new("127.0.0.1", 0, 1)).await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_proxy_serves_remote_values() {
    init_test_logging();
    let device = MockDevice::new();
    device.load(HR, 10, &[300]);
    let session = RemoteSession::new(
        MockTransport::new(Arc::clone(&device)),
        ProfileFixtures::scenario().into_shared(),
    );
    let proxy = Proxy::start(session, &ModbusServerConfig::new("127.0.0.1", 0, 1))
        .await
        .unwrap();

    let mut client = ModbusTcpTransport::simple("127.0.0.1", proxy.local_addr().port(), 1);
    client.connect().await.unwrap();

    device.load(HR, 10, &[444]);
    assert_eq!(client.read_holding_registers(10, 1).await.unwrap(), vec![444]);

    client.write_multiple_registers(10, &[301]).await.unwrap();
    assert_eq!(device.word(HR, 10), Some(301));

    device.set_fail(true);
    client.write_multiple_registers(10, &[302]).await.unwrap();
    device.set_fail(false);
    // the failed write was rolled back locally and never reached the device
    assert_eq!(device.word(HR, 10), Some(301));
    assert_eq!(
        proxy.session().profile().read().register(HR, 10).unwrap().value,
        Value::Int(301)
    );

    assert_eq!(proxy.bridge().stats().failures(), 1);
    client.disconnect().await.unwrap();
    proxy.stop().await;
}
