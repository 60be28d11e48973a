// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Synchronous register access for worker threads.
//!
//! The polling engine and the server's request handlers run on plain
//! threads. They talk to the remote device through [`RemoteRegisters`],
//! which [`BlockingSession`] implements by blocking on the runtime that
//! owns the connection.

use std::sync::Arc;

use mbt_core::{RegisterClass, Value};
use tokio::runtime::Handle;

use crate::error::ModbusResult;

use super::session::RemoteSession;
use super::transport::ModbusTransport;

// =============================================================================
// RemoteRegisters
// =============================================================================

/// Typed, blocking access to a remote device.
///
/// Implementations must be callable concurrently from many threads.
pub trait RemoteRegisters: Send + Sync {
    /// Reads one register.
    fn read(&self, class: RegisterClass, address: u16) -> ModbusResult<Value>;

    /// Writes one register.
    fn write(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<()>;
}

impl<R: RemoteRegisters + ?Sized> RemoteRegisters for Arc<R> {
    fn read(&self, class: RegisterClass, address: u16) -> ModbusResult<Value> {
        (**self).read(class, address)
    }

    fn write(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<()> {
        (**self).write(class, address, value)
    }
}

// =============================================================================
// BlockingSession
// =============================================================================

/// A [`RemoteSession`] driven from synchronous code.
///
/// Calls block the current thread until the request completes. Use it from
/// `std::thread` or `spawn_blocking`, never from inside an async task.
pub struct BlockingSession<T: ModbusTransport> {
    session: Arc<RemoteSession<T>>,
    handle: Handle,
}

impl<T: ModbusTransport> BlockingSession<T> {
    /// Wraps `session`, running requests on `handle`.
    pub fn new(session: Arc<RemoteSession<T>>, handle: Handle) -> Self {
        Self { session, handle }
    }

    /// Wraps `session` on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current(session: Arc<RemoteSession<T>>) -> Self {
        Self::new(session, Handle::current())
    }

    /// The wrapped session.
    pub fn session(&self) -> &Arc<RemoteSession<T>> {
        &self.session
    }
}

impl<T: ModbusTransport> Clone for BlockingSession<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            handle: self.handle.clone(),
        }
    }
}

impl<T: ModbusTransport + 'static> RemoteRegisters for BlockingSession<T> {
    fn read(&self, class: RegisterClass, address: u16) -> ModbusResult<Value> {
        self.handle.block_on(self.session.read(class, address))
    }

    fn write(&self, class: RegisterClass, address: u16, value: &Value) -> ModbusResult<()> {
        self.handle.block_on(self.session.write(class, address, value))
    }
}

impl<T: ModbusTransport> std::fmt::Debug for BlockingSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingSession")
            .field("session", &self.session)
            .finish()
    }
}
