// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed register access against one remote device.
//!
//! A [`RemoteSession`] resolves register metadata from the shared profile,
//! computes the word count through the codec and issues exactly one of the
//! four primitive requests. Every failure comes back as an `Err` and is
//! logged at warning level here; nothing is retried at this layer.
//!
//! Writes to discrete inputs and input registers fail locally with
//! [`OperationError::ReadOnly`] and never reach the wire.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mbt_core::{codec, CoreError, DecodeError, Register, RegisterClass, SharedProfile, Value};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{ModbusError, ModbusResult, OperationError};

use super::transport::{ModbusTransport, TransportState};

// =============================================================================
// RemoteSession
// =============================================================================

/// Client wrapper issuing typed reads and writes.
pub struct RemoteSession<T: ModbusTransport> {
    transport: Mutex<T>,
    profile: SharedProfile,
    offset: i32,
    stats: SessionStats,
}

impl<T: ModbusTransport> RemoteSession<T> {
    /// Creates a session over `transport` using metadata from `profile`.
    pub fn new(transport: T, profile: SharedProfile) -> Self {
        Self {
            transport: Mutex::new(transport),
            profile,
            offset: 0,
            stats: SessionStats::default(),
        }
    }

    /// Sets the offset added to every profile address on the wire.
    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    /// The address offset.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// The profile this session resolves registers from.
    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    /// Request counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Connects to the remote device.
    pub async fn connect(&self) -> ModbusResult<()> {
        let mut transport = self.transport.lock().await;
        match transport.connect().await {
            Ok(()) => {
                tracing::info!(transport = %transport.display_name(), "Session connected");
                Ok(())
            }
            Err(e) => {
                e.log("session connect");
                Err(e)
            }
        }
    }

    /// Current transport state.
    pub async fn state(&self) -> TransportState {
        self.transport.lock().await.state()
    }

    /// Closes the connection.
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.disconnect().await {
            e.log("session close");
        }
    }

    // =========================================================================
    // Register access
    // =========================================================================

    /// Reads and decodes one register.
    pub async fn read(&self, class: RegisterClass, address: u16) -> ModbusResult<Value> {
        let started = Instant::now();
        let result = self.read_inner(class, address).await;
        self.stats.record(&result, started.elapsed());
        if let Err(e) = &result {
            warn_failure("read", class, address, e);
        }
        result
    }

    /// Encodes and writes one register.
    pub async fn write(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<()> {
        let started = Instant::now();
        let result = self.write_inner(class, address, value).await;
        self.stats.record(&result, started.elapsed());
        if let Err(e) = &result {
            warn_failure("write", class, address, e);
        }
        result
    }

    async fn read_inner(&self, class: RegisterClass, address: u16) -> ModbusResult<Value> {
        let register = self.lookup(class, address)?;
        let wire = self.wire_address(address)?;
        let transport = self.transport.lock().await;

        if class.is_bit() {
            let bits = transport.read_bits(class, wire, 1).await?;
            match bits.first() {
                Some(bit) => Ok(Value::Bool(*bit)),
                None => Err(CoreError::from(DecodeError::word_count("bit", 1, 0)).into()),
            }
        } else {
            let count = codec::words_needed(&register) as u16;
            let words = transport.read_words(class, wire, count).await?;
            Ok(codec::decode(&register, &words).map_err(CoreError::from)?)
        }
    }

    async fn write_inner(
        &self,
        class: RegisterClass,
        address: u16,
        value: &Value,
    ) -> ModbusResult<()> {
        if !class.is_writable() {
            return Err(ModbusError::read_only(class, address));
        }

        let register = self.lookup(class, address)?;
        let words = codec::encode(&register, value)?;
        let wire = self.wire_address(address)?;
        let transport = self.transport.lock().await;

        match class {
            RegisterClass::Coil => {
                let bit = words.first().is_some_and(|w| *w != 0);
                transport.write_bit(wire, bit).await
            }
            _ => transport.write_words(wire, &words).await,
        }
    }

    fn lookup(&self, class: RegisterClass, address: u16) -> ModbusResult<Register> {
        self.profile
            .read()
            .register(class, address)
            .cloned()
            .ok_or_else(|| ModbusError::unknown_register(class, address))
    }

    fn wire_address(&self, address: u16) -> ModbusResult<u16> {
        let wire = i64::from(address) + i64::from(self.offset);
        u16::try_from(wire)
            .map_err(|_| OperationError::address_out_of_range(address, self.offset).into())
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Reads every register in the profile.
    ///
    /// Registers that fail to read are left out; classes with no readable
    /// register are left out entirely.
    pub async fn download(&self) -> Download {
        let (identity, entries) = {
            let profile = self.profile.read();
            let entries: Vec<(RegisterClass, u16, String)> = profile
                .iter()
                .map(|(class, r)| (class, r.address, r.description.clone()))
                .collect();
            (profile.identity.clone(), entries)
        };

        let mut download = Download {
            identity,
            datablocks: BTreeMap::new(),
        };
        for (class, address, name) in entries {
            if let Ok(value) = self.read(class, address).await {
                download
                    .datablocks
                    .entry(class)
                    .or_default()
                    .insert(address, DownloadEntry { name, value });
            }
        }
        download
    }
}

impl<T: ModbusTransport> std::fmt::Debug for RemoteSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("offset", &self.offset)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn warn_failure(operation: &str, class: RegisterClass, address: u16, error: &ModbusError) {
    tracing::warn!(
        operation,
        class = class.key(),
        address,
        error_code = %error.error_code(),
        "Remote {operation} failed: {error}"
    );
}

// =============================================================================
// Download
// =============================================================================

/// Snapshot of every readable register on the remote device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    /// Profile identity.
    pub identity: String,
    /// Values per class, then per address.
    pub datablocks: BTreeMap<RegisterClass, BTreeMap<u16, DownloadEntry>>,
}

/// One downloaded register.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadEntry {
    /// Register description.
    pub name: String,
    /// Decoded value.
    pub value: Value,
}

// =============================================================================
// SessionStats
// =============================================================================

/// Request counters for a session.
#[derive(Debug, Default)]
pub struct SessionStats {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time_us: AtomicU64,
}

impl SessionStats {
    fn record<R>(&self, result: &ModbusResult<R>, elapsed: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(_) => {
                self.total_response_time_us
                    .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns the total number of requests.
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Returns the number of failed requests.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Mean response time of successful requests.
    pub fn average_response_time(&self) -> Duration {
        let ok = self.total_requests() - self.failed_requests();
        if ok == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_response_time_us.load(Ordering::Relaxed) / ok)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mbt_core::{DataType, Profile};
    use parking_lot::Mutex as SyncMutex;

    #[derive(Default)]
    struct Recorder {
        calls: SyncMutex<Vec<String>>,
        words: Vec<u16>,
        fail: bool,
        empty_bits: bool,
    }

    impl Recorder {
        fn bits(&self, bit: bool) -> Vec<bool> {
            if self.empty_bits {
                Vec::new()
            } else {
                vec![bit]
            }
        }
    }

    impl Recorder {
        fn log(&self, entry: String) -> ModbusResult<()> {
            self.calls.lock().push(entry);
            if self.fail {
                Err(ModbusError::exception(0x03, 0x02))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ModbusTransport for Recorder {
        async fn connect(&mut self) -> ModbusResult<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> ModbusResult<()> {
            Ok(())
        }
        fn state(&self) -> TransportState {
            TransportState::Connected
        }
        async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
            self.log(format!("fc1 {address} {count}"))?;
            Ok(self.bits(true))
        }
        async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
            self.log(format!("fc2 {address} {count}"))?;
            Ok(self.bits(false))
        }
        async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
            self.log(format!("fc3 {address} {count}"))?;
            Ok(self.words.clone())
        }
        async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
            self.log(format!("fc4 {address} {count}"))?;
            Ok(self.words.clone())
        }
        async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
            self.log(format!("fc5 {address} {value}"))
        }
        async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
            self.log(format!("fc16 {address} {values:?}"))
        }
        fn unit_id(&self) -> u8 {
            1
        }
        fn display_name(&self) -> String {
            "recorder".into()
        }
    }

    fn profile() -> SharedProfile {
        let mut profile = Profile::new("Test device");
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(10, DataType::Uint16, 0).with_description("Setpoint"),
        );
        profile.insert(
            RegisterClass::InputRegister,
            Register::new(20, DataType::Uint32, 0),
        );
        profile.insert(RegisterClass::Coil, Register::new(1, DataType::Bit, false));
        profile.insert(
            RegisterClass::DiscreteInput,
            Register::new(2, DataType::Bit, false),
        );
        profile.into_shared()
    }

    fn session(words: Vec<u16>, fail: bool) -> RemoteSession<Recorder> {
        let recorder = Recorder {
            words,
            fail,
            ..Default::default()
        };
        RemoteSession::new(recorder, profile())
    }

    async fn calls(session: &RemoteSession<Recorder>) -> Vec<String> {
        session.transport.lock().await.calls.lock().clone()
    }

    #[tokio::test]
    async fn test_read_uses_width_and_offset() {
        let session = session(vec![0x0001, 0x0002], false).with_offset(-1);
        let value = session.read(RegisterClass::InputRegister, 20).await.unwrap();
        assert_eq!(value, Value::Int(0x0002_0001));
        assert_eq!(calls(&session).await, vec!["fc4 19 2"]);
    }

    #[tokio::test]
    async fn test_bit_reads_one_unit() {
        let session = session(vec![], false);
        assert_eq!(
            session.read(RegisterClass::Coil, 1).await.unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            session.read(RegisterClass::DiscreteInput, 2).await.unwrap(),
            Value::Bool(false)
        );
        assert_eq!(calls(&session).await, vec!["fc1 1 1", "fc2 2 1"]);
    }

    #[tokio::test]
    async fn test_empty_bit_payload_is_a_decode_failure() {
        let recorder = Recorder {
            empty_bits: true,
            ..Default::default()
        };
        let session = RemoteSession::new(recorder, profile());

        for (class, address) in [(RegisterClass::Coil, 1), (RegisterClass::DiscreteInput, 2)] {
            let err = session.read(class, address).await.unwrap_err();
            assert!(
                matches!(err, ModbusError::Codec(CoreError::Decode(_))),
                "unexpected error: {err}"
            );
        }
        assert_eq!(session.stats().failed_requests(), 2);
    }

    #[tokio::test]
    async fn test_write_encodes_through_codec() {
        let session = session(vec![], false);
        session
            .write(RegisterClass::HoldingRegister, 10, &Value::from("300"))
            .await
            .unwrap();
        session
            .write(RegisterClass::Coil, 1, &Value::from("FALSE"))
            .await
            .unwrap();
        assert_eq!(calls(&session).await, vec!["fc16 10 [300]", "fc5 1 false"]);
    }

    #[tokio::test]
    async fn test_read_only_classes_never_reach_the_wire() {
        let session = session(vec![], false);
        let result = session
            .write(RegisterClass::InputRegister, 20, &Value::Int(1))
            .await;
        assert!(matches!(
            result,
            Err(ModbusError::Operation(OperationError::ReadOnly { .. }))
        ));
        let result = session
            .write(RegisterClass::DiscreteInput, 2, &Value::Bool(true))
            .await;
        assert!(result.is_err());
        assert!(calls(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_returned_not_raised() {
        let session = session(vec![1], true);
        assert!(session.read(RegisterClass::HoldingRegister, 10).await.is_err());
        assert!(session
            .write(RegisterClass::HoldingRegister, 10, &Value::Int(5))
            .await
            .is_err());
        assert_eq!(session.stats().total_requests(), 2);
        assert_eq!(session.stats().failed_requests(), 2);
    }

    #[tokio::test]
    async fn test_unknown_register_and_offset_underflow() {
        let session = session(vec![1], false);
        assert!(matches!(
            session.read(RegisterClass::HoldingRegister, 99).await,
            Err(ModbusError::Operation(OperationError::UnknownRegister { .. }))
        ));

        let mut profile = Profile::new("zero");
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(0, DataType::Uint16, 0),
        );
        let session = RemoteSession::new(Recorder::default(), profile.into_shared()).with_offset(-1);
        assert!(matches!(
            session.read(RegisterClass::HoldingRegister, 0).await,
            Err(ModbusError::Operation(OperationError::AddressOutOfRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_download_skips_failures() {
        let session = session(vec![7], false);
        let download = session.download().await;
        assert_eq!(download.identity, "Test device");
        // The u32 input register gets one word back and fails to decode.
        assert!(!download.datablocks.contains_key(&RegisterClass::InputRegister));
        let hr = &download.datablocks[&RegisterClass::HoldingRegister];
        assert_eq!(hr[&10].name, "Setpoint");
        assert_eq!(hr[&10].value, Value::Int(7));
        assert_eq!(download.datablocks.len(), 3);
    }
}
