// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Background polling engine.
//!
//! A [`PollingEngine`] owns a single worker thread and a FIFO backlog of
//! pending reads and writes. On every deadline the whole register list is
//! appended to the backlog as reads; ad-hoc [`read`](PollingEngine::read)
//! and [`write`](PollingEngine::write) requests are appended behind
//! whatever is already queued. The worker executes exactly one entry per
//! tick, so ad-hoc requests never wait for more than the entries ahead of
//! them.
//!
//! # Scheduling
//!
//! | Interval       | Behavior                                         |
//! |----------------|--------------------------------------------------|
//! | `None`         | No scheduled cycles; only ad-hoc entries run     |
//! | `Some(ZERO)`   | Continuous: the next cycle starts on drain       |
//! | `Some(d)`      | A new cycle is due `d` after the previous start  |
//!
//! A cycle is appended only once the backlog is empty, so two cycles never
//! interleave.
//!
//! # Failure handling
//!
//! A failed entry is logged at warning level and dropped. The engine never
//! retries it and never stops because of it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use mbt_core::{Profile, RegisterClass, SharedProfile, Value};
use parking_lot::Mutex;

use crate::client::RemoteRegisters;
use crate::hooks::{CycleHook, HookList, RegisterHook};

/// Worker sleep when there is nothing to do.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Backlog
// =============================================================================

/// One pending remote access.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogEntry {
    /// Register class.
    pub class: RegisterClass,
    /// Register address.
    pub address: u16,
    /// Value to write; `None` for a read.
    pub write: Option<Value>,
}

impl BacklogEntry {
    /// Creates a read entry.
    pub fn read(class: RegisterClass, address: u16) -> Self {
        Self {
            class,
            address,
            write: None,
        }
    }

    /// Creates a write entry.
    pub fn write(class: RegisterClass, address: u16, value: Value) -> Self {
        Self {
            class,
            address,
            write: Some(value),
        }
    }

    /// Returns `true` for a write entry.
    pub fn is_write(&self) -> bool {
        self.write.is_some()
    }
}

// =============================================================================
// Status
// =============================================================================

/// Point-in-time engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollStatus {
    /// Entries waiting in the backlog.
    pub backlog: usize,
    /// Reads executed since start.
    pub read_count: u64,
    /// Writes executed since start.
    pub write_count: u64,
    /// Moving average of cycle duration; `None` before the first cycle.
    pub duration: Option<Duration>,
    /// Progress towards the next deadline, `0..=100`.
    pub interval_progress: u8,
    /// Progress through the current cycle, `0..=100`.
    pub cycle_progress: u8,
    /// Whether the engine is paused.
    pub paused: bool,
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backlog={} reads={} writes={} cycle={} interval={}% progress={}%",
            self.backlog,
            self.read_count,
            self.write_count,
            self.duration
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "-".to_string()),
            self.interval_progress,
            self.cycle_progress,
        )?;
        if self.paused {
            f.write_str(" (paused)")?;
        }
        Ok(())
    }
}

// =============================================================================
// Internal state
// =============================================================================

#[derive(Debug, Default)]
struct PollState {
    interval: Option<Duration>,
    next: Option<Instant>,
    backlog: VecDeque<BacklogEntry>,
    reglist: Vec<(RegisterClass, u16)>,
    started: Option<Instant>,
    duration: Option<Duration>,
    read_count: u64,
    write_count: u64,
    paused: bool,
}

impl PollState {
    /// Weights the previous average by three quarters.
    fn record_cycle(&mut self, elapsed: Duration) -> Duration {
        let average = match self.duration {
            None => elapsed,
            Some(old) => (old * 3 + elapsed) / 4,
        };
        self.duration = Some(average);
        average
    }

    fn status(&self, now: Instant) -> PollStatus {
        let mut status = PollStatus {
            backlog: self.backlog.len(),
            read_count: self.read_count,
            write_count: self.write_count,
            duration: self.duration,
            paused: self.paused,
            ..Default::default()
        };
        if self.paused {
            return status;
        }

        if let (Some(next), Some(interval)) = (self.next, self.interval) {
            if !interval.is_zero() {
                let remaining = next.saturating_duration_since(now).as_secs_f64();
                status.interval_progress = percent(1.0 - remaining / interval.as_secs_f64());
            }
        }
        if !self.backlog.is_empty() && !self.reglist.is_empty() {
            let left = self.backlog.len() as f64 / self.reglist.len() as f64;
            status.cycle_progress = percent(1.0 - left);
        }
        status
    }
}

fn percent(fraction: f64) -> u8 {
    (fraction * 100.0).clamp(0.0, 100.0) as u8
}

struct Shared {
    state: Mutex<PollState>,
    running: AtomicBool,
    remote: Arc<dyn RemoteRegisters>,
    profile: SharedProfile,
    read_hooks: HookList<RegisterHook>,
    write_hooks: HookList<RegisterHook>,
    cycle_hooks: HookList<CycleHook>,
}

enum Tick {
    Ran,
    Idle,
}

// =============================================================================
// PollingEngine
// =============================================================================

/// Scheduler cycling a register list through a remote device.
pub struct PollingEngine {
    shared: Arc<Shared>,
    idle_delay: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PollingEngine {
    /// Creates a stopped engine polling every register in `profile`.
    ///
    /// The register list is fixed here; registers added to the profile
    /// later are not polled.
    pub fn new(remote: Arc<dyn RemoteRegisters>, profile: SharedProfile) -> Self {
        let reglist = profile.read().register_list();
        let state = PollState {
            reglist,
            ..Default::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                running: AtomicBool::new(false),
                remote,
                profile,
                read_hooks: HookList::new(),
                write_hooks: HookList::new(),
                cycle_hooks: HookList::new(),
            }),
            idle_delay: DEFAULT_IDLE_DELAY,
            worker: Mutex::new(None),
        }
    }

    /// Sets how long the worker sleeps when idle.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the worker thread.
    ///
    /// With an interval the first cycle is due immediately. Calling `start`
    /// on a running engine does nothing.
    pub fn start(&self, interval: Option<Duration>) -> std::io::Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            tracing::debug!("Polling engine already running");
            return Ok(());
        }

        {
            let mut state = self.shared.state.lock();
            state.interval = interval;
            state.next = interval.map(|_| Instant::now());
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let idle = self.idle_delay;
        let handle = std::thread::Builder::new()
            .name("mbt-poller".into())
            .spawn(move || run(shared, idle));

        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                tracing::info!(
                    registers = self.shared.state.lock().reglist.len(),
                    interval = ?interval,
                    "Polling engine started"
                );
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Returns `true` while the worker runs.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// An in-flight remote call is allowed to complete first.
    pub fn close(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Polling worker panicked");
            }
            tracing::info!("Polling engine stopped");
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queues an ad-hoc read.
    pub fn read(&self, class: RegisterClass, address: u16) {
        tracing::info!(class = class.key(), address, "Queued read");
        self.shared
            .state
            .lock()
            .backlog
            .push_back(BacklogEntry::read(class, address));
    }

    /// Queues an ad-hoc write.
    pub fn write(&self, class: RegisterClass, address: u16, value: Value) {
        tracing::info!(class = class.key(), address, value = %value, "Queued write");
        self.shared
            .state
            .lock()
            .backlog
            .push_back(BacklogEntry::write(class, address, value));
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Changes the polling interval.
    ///
    /// A changed interval takes effect immediately: `None` cancels the
    /// pending deadline, anything else makes a cycle due now.
    pub fn set_interval(&self, interval: Option<Duration>) {
        let mut state = self.shared.state.lock();
        if state.interval == interval {
            return;
        }
        state.interval = interval;
        state.next = interval.map(|_| Instant::now());
        tracing::info!(interval = ?interval, "Polling interval changed");
    }

    /// The polling interval.
    pub fn interval(&self) -> Option<Duration> {
        self.shared.state.lock().interval
    }

    /// Makes the next cycle due immediately.
    pub fn trigger(&self) {
        self.shared.state.lock().next = Some(Instant::now());
    }

    /// Pauses or resumes the worker.
    pub fn set_paused(&self, paused: bool) {
        self.shared.state.lock().paused = paused;
    }

    /// Current status.
    pub fn status(&self) -> PollStatus {
        self.shared.state.lock().status(Instant::now())
    }

    /// Copies the profile while no entry can be dequeued.
    pub fn snapshot(&self) -> Profile {
        let _state = self.shared.state.lock();
        self.shared.profile.read().clone()
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers an observer for successful reads.
    pub fn on_read<F>(&self, hook: F)
    where
        F: Fn(RegisterClass, u16, &Value) + Send + Sync + 'static,
    {
        self.shared.read_hooks.push(Arc::new(hook));
    }

    /// Registers an observer for successful writes.
    pub fn on_write<F>(&self, hook: F)
    where
        F: Fn(RegisterClass, u16, &Value) + Send + Sync + 'static,
    {
        self.shared.write_hooks.push(Arc::new(hook));
    }

    /// Registers an observer for completed cycles.
    pub fn on_cycle<F>(&self, hook: F)
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.shared.cycle_hooks.push(Arc::new(hook));
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingEngine")
            .field("running", &self.is_running())
            .field("status", &self.status())
            .finish()
    }
}

// =============================================================================
// Worker
// =============================================================================

fn run(shared: Arc<Shared>, idle: Duration) {
    while shared.running.load(Ordering::SeqCst) {
        if let Tick::Idle = tick(&shared) {
            std::thread::sleep(idle);
        }
    }
}

fn tick(shared: &Shared) -> Tick {
    let (entry, completed) = {
        let mut state = shared.state.lock();
        if state.paused {
            return Tick::Idle;
        }
        let now = Instant::now();

        let mut completed = None;
        if state.backlog.is_empty() {
            if let Some(started) = state.started.take() {
                let elapsed = now.duration_since(started);
                let average = state.record_cycle(elapsed);
                completed = Some((elapsed, average));
            }
        }

        if state.backlog.is_empty() && state.next.is_some_and(|next| now >= next) {
            let reads: Vec<BacklogEntry> = state
                .reglist
                .iter()
                .map(|(class, address)| BacklogEntry::read(*class, *address))
                .collect();
            state.backlog.extend(reads);
            state.started = Some(now);
            state.next = state.interval.map(|interval| now + interval);
        }

        let entry = state.backlog.pop_front();
        match &entry {
            Some(e) if e.is_write() => state.write_count += 1,
            Some(_) => state.read_count += 1,
            None => {}
        }
        (entry, completed)
    };

    if let Some((elapsed, average)) = completed {
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            average_ms = average.as_millis() as u64,
            "Cycle completed in {} ms",
            elapsed.as_millis()
        );
        shared.cycle_hooks.notify(elapsed);
    }

    match entry {
        Some(entry) => {
            execute(shared, entry);
            Tick::Ran
        }
        None => Tick::Idle,
    }
}

fn execute(shared: &Shared, entry: BacklogEntry) {
    let BacklogEntry {
        class,
        address,
        write,
    } = entry;

    match write {
        None => match shared.remote.read(class, address) {
            Ok(value) => {
                let stored = store_value(shared, class, address, value);
                shared.read_hooks.notify(class, address, &stored);
            }
            Err(e) => tracing::warn!(
                class = class.key(),
                address,
                error = %e,
                "Polled read failed"
            ),
        },
        Some(value) => match shared.remote.write(class, address, &value) {
            Ok(()) => {
                let stored = store_value(shared, class, address, value);
                shared.write_hooks.notify(class, address, &stored);
            }
            Err(e) => tracing::warn!(
                class = class.key(),
                address,
                error = %e,
                "Polled write failed"
            ),
        },
    }
}

/// Casts `value` into the profile; falls back to the raw value when the
/// profile has no such register.
fn store_value(shared: &Shared, class: RegisterClass, address: u16, value: Value) -> Value {
    match shared.profile.write().set_value(class, address, &value) {
        Ok(cast) => cast,
        Err(e) => {
            tracing::debug!(class = class.key(), address, error = %e, "Value not stored");
            value
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModbusError, ModbusResult};
    use mbt_core::{DataType, Register};
    use std::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct Counter {
        reads: AtomicU64,
        writes: AtomicU64,
        fail: AtomicBool,
    }

    impl RemoteRegisters for Counter {
        fn read(&self, _: RegisterClass, address: u16) -> ModbusResult<Value> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ModbusError::not_connected());
            }
            Ok(Value::Int(i64::from(address) * 2))
        }

        fn write(&self, _: RegisterClass, _: u16, _: &Value) -> ModbusResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ModbusError::not_connected());
            }
            Ok(())
        }
    }

    fn profile(n: u16) -> SharedProfile {
        let mut profile = Profile::new("poll");
        for address in 0..n {
            profile.insert(
                RegisterClass::HoldingRegister,
                Register::new(address, DataType::Uint16, 0),
            );
        }
        profile.into_shared()
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_ewma_weights() {
        let mut state = PollState::default();
        assert_eq!(state.record_cycle(Duration::from_millis(100)), Duration::from_millis(100));
        assert_eq!(state.record_cycle(Duration::from_millis(200)), Duration::from_millis(125));
    }

    #[test]
    fn test_status_progress() {
        let now = Instant::now();
        let mut state = PollState {
            interval: Some(Duration::from_secs(10)),
            next: Some(now + Duration::from_secs(5)),
            reglist: vec![(RegisterClass::Coil, 0); 4],
            ..Default::default()
        };
        state.backlog.push_back(BacklogEntry::read(RegisterClass::Coil, 0));
        let status = state.status(now);
        assert_eq!(status.interval_progress, 50);
        assert_eq!(status.cycle_progress, 75);

        state.paused = true;
        let status = state.status(now);
        assert_eq!((status.interval_progress, status.cycle_progress), (0, 0));
        assert!(status.paused);
    }

    #[test]
    fn test_status_without_interval_or_backlog() {
        let state = PollState {
            reglist: vec![(RegisterClass::Coil, 0)],
            ..Default::default()
        };
        let status = state.status(Instant::now());
        assert_eq!(status, PollStatus::default());
    }

    #[test]
    fn test_single_cycle_reads_every_register() {
        let remote = Arc::new(Counter::default());
        let profile = profile(7);
        let engine = PollingEngine::new(remote.clone(), Arc::clone(&profile))
            .with_idle_delay(Duration::from_millis(1));
        let cycles = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&cycles);
        engine.on_cycle(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.start(Some(Duration::from_secs(3600))).unwrap();
        wait_for(|| cycles.load(Ordering::SeqCst) == 1);

        assert_eq!(remote.reads.load(Ordering::SeqCst), 7);
        let status = engine.status();
        assert_eq!(status.backlog, 0);
        assert_eq!(status.read_count, 7);
        assert!(status.duration.is_some());
        assert_eq!(
            profile
                .read()
                .register(RegisterClass::HoldingRegister, 3)
                .unwrap()
                .value,
            Value::Int(6)
        );
        engine.close();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_disabled_interval_runs_only_adhoc_entries() {
        let remote = Arc::new(Counter::default());
        let engine = PollingEngine::new(remote.clone(), profile(3))
            .with_idle_delay(Duration::from_millis(1));
        let writes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&writes);
        engine.on_write(move |class, address, value| {
            log.lock().push((class, address, value.clone()));
        });

        engine.start(None).unwrap();
        engine.write(RegisterClass::HoldingRegister, 1, Value::from("70000"));
        engine.read(RegisterClass::HoldingRegister, 2);
        wait_for(|| engine.status().read_count == 1);

        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);
        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);
        // 70000 wraps to the register width.
        assert_eq!(
            writes.lock().as_slice(),
            &[(RegisterClass::HoldingRegister, 1, Value::Int(70000 - 65536))]
        );
        engine.close();
    }

    #[test]
    fn test_failures_do_not_stop_engine() {
        let remote = Arc::new(Counter::default());
        remote.fail.store(true, Ordering::SeqCst);
        let engine = PollingEngine::new(remote.clone(), profile(2))
            .with_idle_delay(Duration::from_millis(1));
        engine.start(Some(Duration::ZERO)).unwrap();
        wait_for(|| remote.reads.load(Ordering::SeqCst) >= 6);
        assert!(engine.is_running());
        engine.close();
    }

    #[test]
    fn test_paused_engine_does_nothing() {
        let remote = Arc::new(Counter::default());
        let engine = PollingEngine::new(remote.clone(), profile(2))
            .with_idle_delay(Duration::from_millis(1));
        engine.set_paused(true);
        engine.start(Some(Duration::ZERO)).unwrap();
        engine.read(RegisterClass::HoldingRegister, 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(remote.reads.load(Ordering::SeqCst), 0);
        assert_eq!(engine.status().backlog, 1);

        engine.set_paused(false);
        wait_for(|| remote.reads.load(Ordering::SeqCst) >= 3);
        engine.close();
    }

    #[test]
    fn test_set_interval_and_trigger() {
        let remote = Arc::new(Counter::default());
        let engine = PollingEngine::new(remote.clone(), profile(1))
            .with_idle_delay(Duration::from_millis(1));
        engine.start(None).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(remote.reads.load(Ordering::SeqCst), 0);

        engine.trigger();
        wait_for(|| remote.reads.load(Ordering::SeqCst) == 1);

        engine.set_interval(Some(Duration::from_secs(3600)));
        assert_eq!(engine.interval(), Some(Duration::from_secs(3600)));
        wait_for(|| remote.reads.load(Ordering::SeqCst) == 2);
        engine.close();
    }
}
