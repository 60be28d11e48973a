// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transparent proxy between the local server and a remote device.
//!
//! A [`ProxyBridge`] attaches one read and one write observer to every
//! register store. Each server access becomes a live remote access:
//!
//! - **read**: the register is read remotely, pushed into the store and
//!   returned. On failure the stored value is returned unchanged.
//! - **write**: the written value is sent remotely. On failure the store is
//!   rolled back and the previous value is reported to the writer.
//!
//! # Reentrancy
//!
//! Pushing a fresh value into the store fires the store's write observers,
//! including the bridge's own. The bridge holds a reentrant lock around
//! its [`BridgeState`] for the whole remote round trip: a nested call on
//! the same thread sees `InFlight` and passes through, while accesses from
//! other threads wait for the lock. Exactly one bridged access is in flight
//! at any time.

use std::cell::Cell;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mbt_core::{codec, RegisterClass, Value};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::client::{BlockingSession, ModbusTransport, RemoteRegisters, RemoteSession};
use crate::error::{ModbusError, ModbusResult};
use crate::hooks::StoreAccess;
use crate::server::{DeviceStore, ModbusServer};
use crate::types::ModbusServerConfig;

// =============================================================================
// BridgeState
// =============================================================================

/// Whether a bridged access is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    /// No access in progress.
    #[default]
    Idle,
    /// A remote round trip is in progress.
    InFlight,
}

/// Marks the bridge in flight until dropped.
struct InFlight<'a> {
    guard: ReentrantMutexGuard<'a, Cell<BridgeState>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.guard.set(BridgeState::Idle);
    }
}

// =============================================================================
// BridgeStats
// =============================================================================

/// Counters for bridged traffic.
#[derive(Debug, Default)]
pub struct BridgeStats {
    reads: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
    passthrough: AtomicU64,
}

impl BridgeStats {
    /// Remote reads issued.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Remote writes issued.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Remote accesses that failed.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Nested store accesses that bypassed the bridge.
    pub fn passthrough(&self) -> u64 {
        self.passthrough.load(Ordering::Relaxed)
    }
}

// =============================================================================
// ProxyBridge
// =============================================================================

/// Store observers that turn local accesses into remote ones.
pub struct ProxyBridge {
    remote: Arc<dyn RemoteRegisters>,
    device: Arc<DeviceStore>,
    state: ReentrantMutex<Cell<BridgeState>>,
    stats: BridgeStats,
}

impl ProxyBridge {
    /// Creates a bridge and registers its observers on every store.
    pub fn attach(remote: Arc<dyn RemoteRegisters>, device: Arc<DeviceStore>) -> Arc<Self> {
        let bridge = Arc::new(Self {
            remote,
            device: Arc::clone(&device),
            state: ReentrantMutex::new(Cell::new(BridgeState::Idle)),
            stats: BridgeStats::default(),
        });

        for store in device.iter() {
            let weak = Arc::downgrade(&bridge);
            store.on_read(move |access| weak.upgrade()?.bridge_read(access));
            let weak = Arc::downgrade(&bridge);
            store.on_write(move |access| weak.upgrade()?.bridge_write(access));
        }
        bridge
    }

    /// Current state, blocking while another thread is in flight.
    pub fn state(&self) -> BridgeState {
        self.state.lock().get()
    }

    /// Traffic counters.
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Enters the guarded section, or returns `None` when this thread is
    /// already inside it.
    fn enter(&self) -> Option<InFlight<'_>> {
        let guard = self.state.lock();
        if guard.get() == BridgeState::InFlight {
            self.stats.passthrough.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        guard.set(BridgeState::InFlight);
        Some(InFlight { guard })
    }

    /// Start addresses of the registers overlapping an access.
    fn registers_in(&self, class: RegisterClass, address: u16, count: usize) -> Vec<(u16, usize)> {
        let end = (address as usize + count).saturating_sub(1).min(u16::MAX as usize) as u16;
        let profile = self.device.profile().read();
        let first = profile.covering(class, address).map_or(address, |r| r.address);
        profile
            .bank(class)
            .range(first..=end)
            .map(|(start, r)| (*start, r.width()))
            .collect()
    }

    fn bridge_read(&self, access: &StoreAccess<'_>) -> Option<Vec<u16>> {
        let _flight = self.enter()?;
        let store = self.device.store(access.class);

        let mut refreshed = false;
        for (address, _) in self.registers_in(access.class, access.address, access.count()) {
            self.stats.reads.fetch_add(1, Ordering::Relaxed);
            let words = self
                .remote
                .read(access.class, address)
                .and_then(|value| self.encode(access.class, address, &value));
            match words.and_then(|words| store.set(address, &words)) {
                Ok(_) => refreshed = true,
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        class = access.class.key(),
                        address,
                        error = %e,
                        "Proxied read failed; serving stored value"
                    );
                }
            }
        }

        if !refreshed {
            return None;
        }
        store.snapshot(access.address, access.count()).ok()
    }

    fn bridge_write(&self, access: &StoreAccess<'_>) -> Option<Vec<u16>> {
        let previous = access.previous?;
        let _flight = self.enter()?;
        let store = self.device.store(access.class);

        for (address, width) in self.registers_in(access.class, access.address, access.count()) {
            self.stats.writes.fetch_add(1, Ordering::Relaxed);
            let result = store
                .snapshot(address, width)
                .and_then(|words| self.decode(access.class, address, &words))
                .and_then(|value| self.remote.write(access.class, address, &value));
            if let Err(e) = result {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    class = access.class.key(),
                    address,
                    error = %e,
                    "Proxied write failed; rolling back"
                );
                return Some(previous.to_vec());
            }
        }
        None
    }

    fn encode(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<Vec<u16>> {
        let profile = self.device.profile().read();
        let register = profile
            .register(class, address)
            .ok_or_else(|| ModbusError::unknown_register(class, address))?;
        Ok(codec::encode(register, value)?)
    }

    fn decode(&self, class: RegisterClass, address: u16, words: &[u16]) -> ModbusResult<Value> {
        let profile = self.device.profile().read();
        let register = profile
            .register(class, address)
            .ok_or_else(|| ModbusError::unknown_register(class, address))?;
        Ok(codec::decode(register, words).map_err(mbt_core::CoreError::from)?)
    }
}

impl fmt::Debug for ProxyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyBridge")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Proxy
// =============================================================================

/// A running proxy: connected session, bridge and local server.
pub struct Proxy<T: ModbusTransport + 'static> {
    session: Arc<RemoteSession<T>>,
    bridge: Arc<ProxyBridge>,
    server: ModbusServer,
}

impl<T: ModbusTransport + 'static> Proxy<T> {
    /// Connects `session`, then serves its profile on `config`.
    ///
    /// The server does not accept requests until the session is connected.
    /// If either step fails nothing is left running.
    pub async fn start(session: RemoteSession<T>, config: &ModbusServerConfig) -> ModbusResult<Self> {
        if let Err(e) = session.connect().await {
            tracing::error!(error = %e, "Proxy failed to start: remote connection failed");
            return Err(e);
        }
        let session = Arc::new(session);

        let started = async {
            let device = Arc::new(DeviceStore::from_profile(
                config.device_id,
                Arc::clone(session.profile()),
            )?);
            let remote: Arc<dyn RemoteRegisters> =
                Arc::new(BlockingSession::current(Arc::clone(&session)));
            let bridge = ProxyBridge::attach(remote, Arc::clone(&device));
            let server = ModbusServer::start(config, device).await?;
            Ok::<_, ModbusError>((bridge, server))
        }
        .await;

        match started {
            Ok((bridge, server)) => {
                tracing::info!(address = %server.local_addr(), "Proxy started");
                Ok(Self {
                    session,
                    bridge,
                    server,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Proxy failed to start: local server failed");
                session.close().await;
                Err(e)
            }
        }
    }

    /// The local server address.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// The bridge.
    pub fn bridge(&self) -> &Arc<ProxyBridge> {
        &self.bridge
    }

    /// The remote session.
    pub fn session(&self) -> &Arc<RemoteSession<T>> {
        &self.session
    }

    /// Stops the server and closes the session.
    pub async fn stop(mut self) {
        self.server.stop();
        self.session.close().await;
        tracing::info!("Proxy stopped");
    }
}

impl<T: ModbusTransport + 'static> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("local_addr", &self.server.local_addr())
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModbusError;
    use mbt_core::{DataType, Profile, Register};
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Remote {
        calls: AtomicU64,
        fail: AtomicBool,
        value: AtomicU64,
    }

    impl RemoteRegisters for Remote {
        fn read(&self, _: RegisterClass, _: u16) -> ModbusResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ModbusError::not_connected());
            }
            Ok(Value::Int(self.value.load(Ordering::SeqCst) as i64))
        }

        fn write(&self, _: RegisterClass, _: u16, value: &Value) -> ModbusResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ModbusError::not_connected());
            }
            self.value
                .store(value.as_i64().unwrap_or_default() as u64, Ordering::SeqCst);
            Ok(())
        }
    }

    fn bridged() -> (Arc<Remote>, Arc<DeviceStore>, Arc<ProxyBridge>) {
        let mut profile = Profile::new("proxy");
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(10, DataType::Uint16, 1),
        );
        let device = Arc::new(DeviceStore::from_profile(1, profile.into_shared()).unwrap());
        let remote = Arc::new(Remote::default());
        let bridge = ProxyBridge::attach(remote.clone(), Arc::clone(&device));
        (remote, device, bridge)
    }

    #[test]
    fn test_read_fetches_remote_value() {
        let (remote, device, bridge) = bridged();
        remote.value.store(42, Ordering::SeqCst);

        let store = device.store(RegisterClass::HoldingRegister);
        assert_eq!(store.get(10, 1).unwrap(), vec![42]);
        assert_eq!(store.snapshot(10, 1).unwrap(), vec![42]);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.stats().passthrough(), 1);
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[test]
    fn test_failed_read_serves_stored_value() {
        let (remote, device, bridge) = bridged();
        remote.fail.store(true, Ordering::SeqCst);
        let store = device.store(RegisterClass::HoldingRegister);
        assert_eq!(store.get(10, 1).unwrap(), vec![1]);
        assert_eq!(bridge.stats().failures(), 1);
    }

    #[test]
    fn test_write_reaches_remote() {
        let (remote, device, _bridge) = bridged();
        let store = device.store(RegisterClass::HoldingRegister);
        assert_eq!(store.set(10, &[300]).unwrap(), vec![300]);
        assert_eq!(remote.value.load(Ordering::SeqCst), 300);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let (remote, device, _bridge) = bridged();
        remote.fail.store(true, Ordering::SeqCst);
        let store = device.store(RegisterClass::HoldingRegister);
        assert_eq!(store.set(10, &[300]).unwrap(), vec![1]);
        assert_eq!(store.snapshot(10, 1).unwrap(), vec![1]);
        assert_eq!(
            device
                .profile()
                .read()
                .register(RegisterClass::HoldingRegister, 10)
                .unwrap()
                .value,
            Value::Int(1)
        );
    }
}
