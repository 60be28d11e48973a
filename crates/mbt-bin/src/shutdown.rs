// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown for the long-running commands (serve, poll, proxy).
//!
//! One `watch` channel holds the stop flag. OS signals and explicit calls
//! both set it; every [`ShutdownSignal`] resolves once it is set, including
//! signals created afterwards.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tracing::info;

/// Shared stop flag for the running roles.
#[derive(Clone, Debug)]
pub struct ShutdownCoordinator {
    stopped: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that has not stopped.
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            stopped: Arc::new(stopped),
        }
    }

    /// A future that resolves once shutdown is initiated.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        let mut stopped = self.stopped.subscribe();
        ShutdownSignal {
            inner: Box::pin(async move {
                // Err: every coordinator was dropped.
                let _ = stopped.wait_for(|stopped| *stopped).await;
            }),
        }
    }

    /// Sets the stop flag. Only the first call logs.
    pub fn initiate_shutdown(&self) {
        let changed = self.stopped.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if changed {
            info!("Shutdown initiated");
        }
    }

    /// Returns `true` once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Waits for SIGINT/SIGTERM (Ctrl+C elsewhere) or an explicit
    /// [`initiate_shutdown`](Self::initiate_shutdown).
    ///
    /// Fails only if the signal handlers cannot be installed.
    pub async fn wait_for_shutdown(&self) -> std::io::Result<()> {
        let manual = self.shutdown_signal();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = manual => return Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("Received Ctrl+C");
                }
                _ = manual => return Ok(()),
            }
        }

        self.initiate_shutdown();
        Ok(())
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when shutdown is initiated. `Unpin`, so `&mut signal` can sit
/// in a `select!` loop.
pub struct ShutdownSignal {
    inner: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_resolves_on_initiate() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.shutdown_signal();
        assert!(!coordinator.is_shutdown_initiated());

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .expect("signal resolves after initiate_shutdown");
        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_late_signal_and_wait_resolve() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), coordinator.shutdown_signal())
            .await
            .expect("signal created after shutdown resolves");
        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .expect("wait returns after shutdown")
            .unwrap();
    }
}
