// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport-level retries.
//!
//! [`RetryTransport`] wraps any [`ModbusTransport`] and repeats a request
//! that failed with a timeout or a dropped link. Exception responses are
//! never retried: the device answered, and the answer was no.
//!
//! The remote session above never retries on its own. This layer is the
//! only place a request is sent more than once.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{ModbusError, ModbusResult};

use super::transport::{ModbusTransport, TransportState};

// =============================================================================
// RetryConfig
// =============================================================================

/// How often and how patiently a request is repeated.
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`, then moved by up to `jitter` of itself in either direction.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
    /// Jitter fraction, 0.0 to 1.0.
    pub jitter: f64,
}

impl RetryConfig {
    /// `max_retries` retries starting at 50ms, capped at 2s, 10% jitter.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            jitter: 0.1,
        }
    }

    /// Every request is sent exactly once.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// `max_retries` retries, `delay` apart.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: delay,
            jitter: 0.0,
        }
    }

    /// Returns `true` if `error` should be attempted again.
    pub fn should_retry(&self, error: &ModbusError) -> bool {
        self.max_retries > 0 && error.is_retryable()
    }

    /// Delay before retry `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(16) as i32);
        let capped = doubled.min(self.max_delay.as_secs_f64());
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || capped == 0.0 {
            return Duration::from_secs_f64(capped);
        }
        let range = capped * jitter;
        let moved = capped + rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64(moved.max(0.0))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

// =============================================================================
// RetryTransport
// =============================================================================

/// Transport decorator that retries transient failures.
#[derive(Debug)]
pub struct RetryTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T: ModbusTransport> RetryTransport<T> {
    /// Wraps `inner` with `config`.
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    async fn execute<F, Fut, R>(&self, operation: &str, call: F) -> ModbusResult<R>
    where
        F: Fn() -> Fut + Send,
        Fut: std::future::Future<Output = ModbusResult<R>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.config.max_retries || !self.config.should_retry(&error) {
                        return Err(error);
                    }

                    let delay = self.config.delay(attempt);
                    tracing::debug!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying Modbus request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<T: ModbusTransport> ModbusTransport for RetryTransport<T> {
    async fn connect(&mut self) -> ModbusResult<()> {
        self.inner.connect().await
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.inner.disconnect().await
    }

    fn state(&self) -> TransportState {
        self.inner.state()
    }

    async fn read_coils(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.execute("read_coils", || self.inner.read_coils(address, count))
            .await
    }

    async fn read_discrete_inputs(&self, address: u16, count: u16) -> ModbusResult<Vec<bool>> {
        self.execute("read_discrete_inputs", || {
            self.inner.read_discrete_inputs(address, count)
        })
        .await
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.execute("read_holding_registers", || {
            self.inner.read_holding_registers(address, count)
        })
        .await
    }

    async fn read_input_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        self.execute("read_input_registers", || {
            self.inner.read_input_registers(address, count)
        })
        .await
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.execute("write_single_coil", || {
            self.inner.write_single_coil(address, value)
        })
        .await
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        self.execute("write_multiple_registers", || {
            self.inner.write_multiple_registers(address, values)
        })
        .await
    }

    fn unit_id(&self) -> u8 {
        self.inner.unit_id()
    }

    fn display_name(&self) -> String {
        self.inner.display_name()
    }
}

// =============================================================================
// Tests
// =============================================================================
