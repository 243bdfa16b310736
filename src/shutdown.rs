// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Graceful shutdown coordination for the notification server.
//!
//! Shutdown is a forward-only state machine:
//!
//! ```text
//! Running -> ShutdownRequested -> Draining -> Terminated
//!                                     \-> ForcedClose -> Terminated
//! ```
//!
//! - [`ShutdownHandle`] is the cheap, clonable side. Signal handlers, the
//!   scheduler and HTTP handlers use it to request shutdown or read the state.
//! - [`ShutdownCoordinator`] owns the drain loop. Once a request is observed
//!   it waits for the registry to empty, forces every session closed when the
//!   drain timeout elapses, and finally runs the termination callback.

use log::{info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::{CloseReport, ConnectionRegistry};

/// Lifecycle of the process. Variants are declared in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    Running,
    ShutdownRequested,
    Draining,
    ForcedClose,
    Terminated,
}

/// Monotonic drain budget, started on entry to [`ShutdownState::Draining`].
#[derive(Debug, Clone, Copy)]
pub struct DrainTimer {
    started: Instant,
    timeout: Duration,
}

impl DrainTimer {
    pub fn start(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.timeout
    }
}

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every session left before the timeout.
    Drained,
    /// The timeout elapsed and the remaining sessions were closed.
    Forced(CloseReport),
}

/// Shared view of the shutdown state.
#[derive(Clone)]
pub struct ShutdownHandle {
    /// Cancelled once shutdown is requested
    token: CancellationToken,
    state: Arc<watch::Sender<ShutdownState>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            token: CancellationToken::new(),
            state: Arc::new(state),
        }
    }

    /// Request shutdown.
    ///
    /// Safe to call from any task, any number of times. Only performs a
    /// short non-blocking state update; the drain itself runs on the
    /// coordinator's task. Returns `true` for the call that moved the state
    /// out of `Running`.
    pub fn request_shutdown(&self) -> bool {
        let requested = self.advance(ShutdownState::ShutdownRequested);
        // State first, so anyone woken by the token sees it already updated.
        self.token.cancel();
        if requested {
            info!("Shutdown requested");
        }
        requested
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }

    /// Wait for SIGTERM or SIGINT and request shutdown.
    ///
    /// On non-Unix platforms only Ctrl+C is handled.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C)");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl+C");
        }

        self.request_shutdown();
        Ok(())
    }

    /// Move to `next` if it is later than the current state.
    fn advance(&self, next: ShutdownState) -> bool {
        self.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

/// Drives the drain once shutdown is requested.
pub struct ShutdownCoordinator {
    registry: Arc<ConnectionRegistry>,
    handle: ShutdownHandle,
    timeout: Duration,
    poll_interval: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            registry,
            handle: ShutdownHandle::new(),
            timeout,
            poll_interval,
        }
    }

    pub fn handle(&self) -> ShutdownHandle {
        self.handle.clone()
    }

    /// Wait for a shutdown request, drain, then call `on_terminate`.
    ///
    /// Always reaches [`ShutdownState::Terminated`] once the request is seen:
    /// the worst case is the drain timeout plus one close timeout per
    /// session still open at that point.
    pub async fn run<F, Fut>(self, on_terminate: F) -> ShutdownOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!("Waiting for shutdown request...");
        self.handle.requested().await;

        let outcome = self.drain().await;

        self.handle.advance(ShutdownState::Terminated);
        info!("Shutdown complete: {:?}", outcome);
        on_terminate().await;
        outcome
    }

    async fn drain(&self) -> ShutdownOutcome {
        self.handle.advance(ShutdownState::Draining);
        info!("Shutdown triggered, waiting for active sessions to close...");
        let timer = DrainTimer::start(self.timeout);

        loop {
            let live = self.registry.live_count();
            if live == 0 {
                info!("All sessions closed, shutting down...");
                return ShutdownOutcome::Drained;
            }

            if timer.expired() {
                warn!(
                    "Shutdown timeout reached with {} session(s) open, forcing shutdown...",
                    live
                );
                self.handle.advance(ShutdownState::ForcedClose);
                let report = self.registry.close_all().await;
                return ShutdownOutcome::Forced(report);
            }

            let remaining = timer.remaining();
            info!(
                "Active sessions: {}, time remaining: {:.2} seconds",
                live,
                remaining.as_secs_f64()
            );
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;
    use crate::session::Session;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixture(timeout: u64, poll: u64) -> (Arc<ConnectionRegistry>, ShutdownCoordinator) {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = ShutdownCoordinator::new(
            registry.clone(),
            Duration::from_secs(timeout),
            Duration::from_secs(poll),
        );
        (registry, coordinator)
    }

    #[test]
    fn test_shutdown_handle_starts_running() {
        let (_, coordinator) = fixture(30, 5);
        let handle = coordinator.handle();
        assert!(!handle.is_shutting_down());
        assert_eq!(handle.state(), ShutdownState::Running);
    }

    #[test]
    fn test_shutdown_request_is_idempotent() {
        let (_, coordinator) = fixture(30, 5);
        let handle = coordinator.handle();

        assert!(handle.request_shutdown());
        assert!(!handle.request_shutdown());

        assert!(handle.is_shutting_down());
        assert_eq!(handle.state(), ShutdownState::ShutdownRequested);
    }

    #[test]
    fn test_handle_clones_share_state() {
        let (_, coordinator) = fixture(30, 5);
        let handle = coordinator.handle();
        let other = handle.clone();

        other.request_shutdown();
        assert!(handle.is_shutting_down());
    }

    #[test]
    fn test_state_never_moves_backwards() {
        let (_, coordinator) = fixture(30, 5);
        let handle = coordinator.handle();

        assert!(handle.advance(ShutdownState::Draining));
        assert!(!handle.advance(ShutdownState::ShutdownRequested));
        assert!(!handle.request_shutdown());
        assert_eq!(handle.state(), ShutdownState::Draining);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_request() {
        let (_, coordinator) = fixture(30, 5);
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run(|| async {}));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!task.is_finished());
        assert_eq!(handle.state(), ShutdownState::Running);

        handle.request_shutdown();
        assert_eq!(task.await.unwrap(), ShutdownOutcome::Drained);
        assert_eq!(handle.state(), ShutdownState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_drain_terminates_when_last_session_leaves() {
        let (registry, coordinator) = fixture(30, 1);
        let handle = coordinator.handle();
        let session = Arc::new(MockSession::new());
        registry.register(session.clone()).await.unwrap();

        let leaver = {
            let registry = registry.clone();
            let id = session.id();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                registry.deregister(&id);
            })
        };

        let started = Instant::now();
        let terminated = Arc::new(AtomicUsize::new(0));
        handle.request_shutdown();
        let outcome = coordinator
            .run({
                let terminated = terminated.clone();
                move || async move {
                    terminated.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        leaver.await.unwrap();

        let elapsed = started.elapsed();
        assert_eq!(outcome, ShutdownOutcome::Drained);
        assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(4), "{:?}", elapsed);
        assert_eq!(session.close_calls(), 0);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ShutdownState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_drain_closes_stragglers_at_timeout() {
        let (registry, coordinator) = fixture(5, 5);
        let handle = coordinator.handle();
        let stuck = Arc::new(MockSession::new().failing_close());
        registry.register(stuck.clone()).await.unwrap();

        let started = Instant::now();
        handle.request_shutdown();
        let state_at_terminate = Arc::new(std::sync::Mutex::new(None));
        let outcome = coordinator
            .run({
                let handle = handle.clone();
                let state_at_terminate = state_at_terminate.clone();
                move || async move {
                    *state_at_terminate.lock().unwrap() = Some(handle.state());
                }
            })
            .await;

        assert_eq!(
            outcome,
            ShutdownOutcome::Forced(CloseReport { closed: 0, failed: 1 })
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "{:?}", elapsed);
        assert_eq!(stuck.close_calls(), 1);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(
            *state_at_terminate.lock().unwrap(),
            Some(ShutdownState::Terminated)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_drain_terminates_when_close_never_returns() {
        let (registry, coordinator) = fixture(5, 5);
        let handle = coordinator.handle();
        registry
            .register(Arc::new(MockSession::new().hanging_close()))
            .await
            .unwrap();

        handle.request_shutdown();
        let terminated = Arc::new(AtomicUsize::new(0));
        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            coordinator.run({
                let terminated = terminated.clone();
                move || async move {
                    terminated.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .await
        .expect("drain must finish");

        assert_eq!(
            outcome,
            ShutdownOutcome::Forced(CloseReport { closed: 0, failed: 1 })
        );
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), ShutdownState::Terminated);
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_close_is_not_delayed_by_long_poll_interval() {
        let (registry, coordinator) = fixture(5, 60);
        let handle = coordinator.handle();
        registry.register(Arc::new(MockSession::new())).await.unwrap();

        let started = Instant::now();
        handle.request_shutdown();
        let outcome = coordinator.run(|| async {}).await;

        assert!(matches!(outcome, ShutdownOutcome::Forced(_)));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[test]
    fn test_drain_timer_remaining_saturates() {
        let timer = DrainTimer {
            started: Instant::now() - Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        };
        assert!(timer.expired());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&ShutdownState::ShutdownRequested).unwrap();
        assert_eq!(json, "\"shutdown_requested\"");
    }
}
