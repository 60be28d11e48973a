// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mbt_core::{RegisterClass, Value};
use mbt_modbus::{BlockingSession, PollingEngine, RemoteRegisters};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::cli::PollArgs;
use crate::error::{BinError, BinResult};
use crate::runtime::HarnessRuntime;

/// How often the engine status is logged.
const STATUS_PERIOD: Duration = Duration::from_secs(1);

/// Runs the polling engine until a shutdown signal arrives or the requested
/// number of cycles completed.
pub async fn poll(runtime: &HarnessRuntime, args: PollArgs) -> BinResult<()> {
    let profile = runtime.load_profile()?;
    let session = Arc::new(runtime.remote_session(Arc::clone(&profile))?);
    session
        .connect()
        .await
        .map_err(|e| BinError::from(e).with_context("connecting to remote device"))?;

    let remote: Arc<dyn RemoteRegisters> = Arc::new(BlockingSession::current(Arc::clone(&session)));
    let engine = PollingEngine::new(remote, profile);

    engine.on_read(|class: RegisterClass, address: u16, value: &Value| {
        info!(class = class.key(), address, %value, "Read");
    });
    engine.on_write(|class: RegisterClass, address: u16, value: &Value| {
        info!(class = class.key(), address, %value, "Wrote");
    });

    let completed = Arc::new(AtomicU64::new(0));
    let cycle_done = Arc::new(Notify::new());
    {
        let completed = Arc::clone(&completed);
        let cycle_done = Arc::clone(&cycle_done);
        engine.on_cycle(move |_: Duration| {
            completed.fetch_add(1, Ordering::SeqCst);
            cycle_done.notify_one();
        });
    }

    let interval = match args.interval {
        Some(interval) => interval.0,
        None => runtime.config().polling.interval(),
    };

    println!("{}", mbt_core::app_title("client"));
    println!("{}", runtime.client_report());
    println!(
        "polling: {}",
        match interval {
            None => "on demand".to_string(),
            Some(d) if d.is_zero() => "continuous".to_string(),
            Some(d) => humantime::format_duration(d).to_string(),
        }
    );

    engine
        .start(interval)
        .map_err(|e| BinError::init(format!("failed to start polling worker: {e}")))?;
    if interval.is_none() {
        engine.trigger();
    }

    let mut shutdown = runtime.shutdown_on_signal();
    let mut status = tokio::time::interval(STATUS_PERIOD);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = cycle_done.notified() => {
                let done = completed.load(Ordering::SeqCst);
                if args.cycles.is_some_and(|max| done >= max) {
                    info!(cycles = done, "Requested cycles completed");
                    break;
                }
            }
            _ = status.tick() => debug!(status = %engine.status(), "Polling"),
        }
    }

    // The worker may be inside a blocking remote call; join it off the
    // async threads.
    let engine = tokio::task::spawn_blocking(move || {
        engine.close();
        engine
    })
    .await
    .map_err(|e| BinError::runtime(format!("polling worker panicked: {e}")))?;

    println!("{}", engine.status());
    if let Some(path) = args.save {
        engine.snapshot().save(&path)?;
        println!("Saved profile to {}", path.display());
    }
    session.close().await;
    Ok(())
}
