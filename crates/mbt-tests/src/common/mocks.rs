// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Mock remote devices for testing.
//!
//! - [`MockRemote`]: typed, synchronous remote implementing
//!   [`RemoteRegisters`], for the polling engine and the proxy bridge
//! - [`MockTransport`]: word-level transport implementing
//!   [`ModbusTransport`], for the remote session

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mbt_core::{RegisterClass, Value};
use mbt_modbus::{ModbusError, ModbusResult, ModbusTransport, RemoteRegisters, TransportState};
use parking_lot::Mutex;

// =============================================================================
// MockRemote
// =============================================================================

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// A read of one register.
    Read(RegisterClass, u16),
    /// A write of one register.
    Write(RegisterClass, u16, Value),
}

/// In-memory remote device.
///
/// Unknown registers read as `Int(0)`. Every call is recorded, and the
/// number of calls in progress at once is tracked so tests can check that
/// access is serialized.
#[derive(Debug, Default)]
pub struct MockRemote {
    values: Mutex<BTreeMap<(RegisterClass, u16), Value>>,
    history: Mutex<Vec<RemoteCall>>,
    latency: Mutex<Duration>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    depth: AtomicUsize,
    max_depth: AtomicUsize,
}

impl MockRemote {
    /// Creates an empty remote.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the value the remote holds for a register.
    pub fn set(&self, class: RegisterClass, address: u16, value: impl Into<Value>) {
        self.values.lock().insert((class, address), value.into());
    }

    /// The value the remote holds for a register.
    pub fn get(&self, class: RegisterClass, address: u16) -> Option<Value> {
        self.values.lock().get(&(class, address)).cloned()
    }

    /// Makes every call sleep for `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes reads fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reads attempted.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Writes attempted.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Calls attempted.
    pub fn calls(&self) -> u64 {
        self.reads() + self.writes()
    }

    /// The most calls ever in progress at once.
    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }

    /// Every call so far, in order.
    pub fn history(&self) -> Vec<RemoteCall> {
        self.history.lock().clone()
    }

    fn enter(&self, call: RemoteCall) -> DepthGuard<'_> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_depth.fetch_max(depth, Ordering::SeqCst);
        self.history.lock().push(call);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        DepthGuard { depth: &self.depth }
    }
}

struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RemoteRegisters for MockRemote {
    fn read(&self, class: RegisterClass, address: u16) -> ModbusResult<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(RemoteCall::Read(class, address));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ModbusError::not_connected());
        }
        Ok(self.get(class, address).unwrap_or(Value::Int(0)))
    }

    fn write(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(RemoteCall::Write(class, address, value.clone()));
        if !class.is_writable() {
            return Err(ModbusError::read_only(class, address));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ModbusError::exception(class.write_function_code().unwrap_or(0), 0x04));
        }
        self.values.lock().insert((class, address), value.clone());
        Ok(())
    }
}

// =============================================================================
// MockTransport
// =============================================================================

/// Word-level state of a mock device, shared with its transports.
#[derive(Debug, Default)]
pub struct MockDevice {
    words: Mutex<BTreeMap<(RegisterClass, u16), u16>>,
    writes: Mutex<Vec<(RegisterClass, u16, Vec<u16>)>>,
    fail: AtomicBool,
    refuse_connect: AtomicBool,
    requests: AtomicU64,
}

impl MockDevice {
    /// Creates an empty device.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores consecutive words (or bits as 0/1) at a wire address.
    pub fn load(&self, class: RegisterClass, address: u16, words: &[u16]) {
        let mut map = self.words.lock();
        for (i, word) in words.iter().enumerate() {
            map.insert((class, address.wrapping_add(i as u16)), *word);
        }
    }

    /// The word at a wire address.
    pub fn word(&self, class: RegisterClass, address: u16) -> Option<u16> {
        self.words.lock().get(&(class, address)).copied()
    }

    /// Every write received, as `(class, wire address, words)`.
    pub fn writes(&self) -> Vec<(RegisterClass, u16, Vec<u16>)> {
        self.writes.lock().clone()
    }

    /// Makes every request fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes `connect` fail.
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Requests received, failed ones included.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn read(&self, class: RegisterClass, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModbusError::exception(class.read_function_code(), 0x04));
        }
        let map = self.words.lock();
        (0..count)
            .map(|i| {
                map.get(&(class, address.wrapping_add(i)))
                    .copied()
                    .ok_or_else(|| ModbusError::exception(class.read_function_code(), 0x02))
            })
            .collect()
    }

    fn write(&self, class: RegisterClass, address: u16, words: &[u16]) -> ModbusResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModbusError::exception(
                class.write_function_code().unwrap_or(0),
                0x04,
            ));
        }
        self.load(class, address, words);
        self.writes.lock().push((class, address, words.to_vec()));
        Ok(())
    }
}

/// Transport talking to a [`MockDevice`].
#[derive(Debug)]
pub struct MockTransport {
    device: Arc<MockDevice>,
    state: TransportState,
    unit_id: u8,
}

impl MockTransport {
    /// Creates a disconnected transport for `device`.
    pub fn new(device: Arc<MockDevice>) -> Self {
        Self {
            device,
            state: TransportState::Disconnected,
            unit_id: 1,
        }
    }

    fn check(&self) -> ModbusResult<()> {
        if self.state.is_connected() {
            Ok(())
        } else {
            Err(ModbusError::not_connected())
        }
    }
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.device.refuse_connect.load(Ordering::SeqCst) {
            self.state = TransportState::Error;
            return Err(ModbusError::not_connected());
        }
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.check()?;
        let words = self.device.read(RegisterClass::Coil, address, count)?;
        Ok(words.into_iter().map(|w| w != 0).collect())
    }

    async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.check()?;
        let words = self.device.read(RegisterClass::DiscreteInput, address, count)?;
        Ok(words.into_iter().map(|w| w != 0).collect())
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.check()?;
        self.device.read(RegisterClass::HoldingRegister, address, count)
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.check()?;
        self.device.read(RegisterClass::InputRegister, address, count)
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.check()?;
        self.device.write(RegisterClass::Coil, address, &[u16::from(value)])
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        self.check()?;
        self.device.write(RegisterClass::HoldingRegister, address, values)
    }

    fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn display_name(&self) -> String {
        format!("mock (unit {})", self.unit_id)
    }
}
