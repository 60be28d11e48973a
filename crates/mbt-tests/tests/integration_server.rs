// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Server Integration Tests
//!
//! Real Modbus TCP traffic on the loopback interface:
//!
//! - `test_server_*`: a client against the local server
//! - `test_chain_*`: client, proxy and device server end to end

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mbt_core::{RegisterClass, Value};
use mbt_modbus::{
    DeviceStore, ModbusServer, ModbusServerConfig, ModbusTcpTransport, ModbusTransport, Proxy,
    RemoteSession,
};

use mbt_tests::common::{init_test_logging, ProfileFixtures};

const HR: RegisterClass = RegisterClass::HoldingRegister;

async fn pump_server() -> (ModbusServer, Arc<DeviceStore>) {
    init_test_logging();
    let device = Arc::new(DeviceStore::from_profile(1, ProfileFixtures::pump().into_shared()).unwrap());
    let server = ModbusServer::start(&ModbusServerConfig::new("127.0.0.1", 0, 1), Arc::clone(&device))
        .await
        .unwrap();
    (server, device)
}

async fn client(port: u16, unit_id: u8) -> ModbusTcpTransport {
    let mut client = ModbusTcpTransport::simple("127.0.0.1", port, unit_id);
    client.connect().await.unwrap();
    client
}

// =============================================================================
// Server
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_answers_reads() {
    let (mut server, _device) = pump_server().await;
    let client = client(server.local_addr().port(), 1).await;

    assert_eq!(client.read_holding_registers(10, 1).await.unwrap(), vec![300]);
    assert_eq!(client.read_discrete_inputs(0, 2).await.unwrap(), vec![true, false]);
    assert_eq!(client.read_coils(0, 1).await.unwrap(), vec![false]);
    assert_eq!(
        client.read_input_registers(0, 1).await.unwrap(),
        vec![(-5i16) as u16]
    );

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_rejects_undeclared_addresses() {
    let (mut server, _device) = pump_server().await;
    let client = client(server.local_addr().port(), 1).await;

    assert!(client.read_holding_registers(11, 1).await.is_err());
    assert!(client.read_holding_registers(10, 2).await.is_err());
    assert!(client.write_multiple_registers(12, &[1]).await.is_err());

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_rejects_other_units() {
    let (mut server, _device) = pump_server().await;
    let client = client(server.local_addr().port(), 7).await;

    assert!(client.read_holding_registers(10, 1).await.is_err());

    server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_writes_reach_profile_and_observers() {
    let (mut server, device) = pump_server().await;
    let writes = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&writes);
    device.store(HR).on_write(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        None
    });
    let client = client(server.local_addr().port(), 1).await;

    client.write_multiple_registers(10, &[301]).await.unwrap();
    client.write_single_coil(0, true).await.unwrap();

    assert_eq!(writes.load(Ordering::SeqCst), 1);
    let profile = device.profile().read();
    assert_eq!(profile.register(HR, 10).unwrap().value, Value::Int(301));
    assert_eq!(
        profile.register(RegisterClass::Coil, 0).unwrap().value,
        Value::Bool(true)
    );
    drop(profile);

    server.stop();
    assert!(!server.is_running());
}

// =============================================================================
// Chain
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chain_client_proxy_device() {
    let (mut device_server, device) = pump_server().await;

    let remote = ModbusTcpTransport::simple("127.0.0.1", device_server.local_addr().port(), 1);
    let session = RemoteSession::new(remote, ProfileFixtures::pump().into_shared());
    let proxy = Proxy::start(session, &ModbusServerConfig::new("127.0.0.1", 0, 1))
        .await
        .unwrap();
    let client = client(proxy.local_addr().port(), 1).await;

    // reads go through to the device
    device.store(HR).set(10, &[777]).unwrap();
    assert_eq!(client.read_holding_registers(10, 1).await.unwrap(), vec![777]);

    // writes land on the device and in both profiles
    client.write_multiple_registers(10, &[123]).await.unwrap();
    assert_eq!(device.store(HR).snapshot(10, 1).unwrap(), vec![123]);
    assert_eq!(
        proxy.session().profile().read().register(HR, 10).unwrap().value,
        Value::Int(123)
    );

    // multi-word registers are mirrored as a whole
    let words = client.read_holding_registers(20, 2).await.unwrap();
    assert_eq!(words, device.store(HR).snapshot(20, 2).unwrap());

    let stats = proxy.bridge().stats();
    assert!(stats.reads() >= 2);
    assert_eq!(stats.writes(), 1);
    assert_eq!(stats.failures(), 0);

    proxy.stop().await;
    device_server.stop();
}
