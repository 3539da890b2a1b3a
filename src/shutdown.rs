// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Graceful shutdown.
//!
//! [`ReconcileTracker`] counts in-flight reconciliations. Trigger loops ask it
//! for permission before each reconciliation; once it is closed no new
//! reconciliation starts, loops return at their next suspension point, and
//! `main` waits (bounded) for the running ones to finish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct TrackerState {
    in_flight: usize,
    closed: bool,
}

/// Counts in-flight reconciliations and gates new ones after shutdown starts.
#[derive(Debug)]
pub struct ReconcileTracker {
    state: Mutex<TrackerState>,
    idle: Notify,
    closed_tx: watch::Sender<bool>,
}

impl Default for ReconcileTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileTracker {
    #[must_use]
    pub fn new() -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(TrackerState::default()),
            idle: Notify::new(),
            closed_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a reconciliation; `None` once shutdown has started.
    ///
    /// The reconciliation counts as in flight until the guard is dropped.
    #[must_use]
    pub fn try_begin(self: &Arc<Self>) -> Option<InFlightGuard> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.in_flight += 1;
        Some(InFlightGuard {
            tracker: Arc::clone(self),
        })
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Stop admitting reconciliations and wake everything waiting on [`Self::closed`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.closed_tx.send_replace(true);
    }

    /// Resolves once [`Self::close`] has been called.
    pub async fn closed(&self) {
        let mut closed_rx = self.closed_tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }

    /// Resolves once no reconciliation is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Close the tracker and wait up to `timeout` for in-flight reconciliations.
    ///
    /// Returns `true` when everything finished in time.
    pub async fn close_and_wait(&self, timeout: Duration) -> bool {
        self.close();

        let in_flight = self.in_flight();
        if in_flight > 0 {
            info!(
                in_flight,
                timeout_secs = timeout.as_secs(),
                "Waiting for in-flight reconciliations to finish"
            );
        }

        if tokio::time::timeout(timeout, self.wait_idle()).await.is_ok() {
            true
        } else {
            warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout reached with reconciliations still in flight"
            );
            false
        }
    }

    fn finish(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Marks one reconciliation as in flight while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<ReconcileTracker>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "SIGINT")
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod shutdown_tests;
