// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Authoritative set of live sessions.
//!
//! Membership is kept in insertion order behind a mutex. The lock is only
//! ever held for plain `Vec` operations; no transport I/O happens while it is
//! held, so `live_count` never waits on a slow peer.
//!
//! Lock order is `sessions` then `pending`.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::SessionError;
use crate::session::{close_within, Session, SessionId};

/// Default bound on a single transport close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`ConnectionRegistry::close_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReport {
    pub closed: usize,
    pub failed: usize,
}

pub struct ConnectionRegistry {
    sessions: Mutex<Vec<Arc<dyn Session>>>,
    /// Sessions whose handshake is in flight
    pending: Mutex<HashSet<SessionId>>,
    close_timeout: Duration,
}

/// Holds a handshake slot for one session id until dropped.
struct Reservation<'a> {
    registry: &'a ConnectionRegistry,
    id: SessionId,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.pending().remove(&self.id);
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_close_timeout(DEFAULT_CLOSE_TIMEOUT)
    }

    pub fn with_close_timeout(close_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            pending: Mutex::new(HashSet::new()),
            close_timeout,
        }
    }

    /// Upper bound on any single close issued on behalf of the registry.
    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    fn sessions(&self) -> MutexGuard<'_, Vec<Arc<dyn Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashSet<SessionId>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the handshake for `id`, unless it is already a member or
    /// another register call is mid-handshake for it.
    fn reserve(&self, id: SessionId) -> Option<Reservation<'_>> {
        let sessions = self.sessions();
        if sessions.iter().any(|s| s.id() == id) || !self.pending().insert(id) {
            return None;
        }
        Some(Reservation { registry: self, id })
    }

    /// Accept the session's handshake and add it to the live set.
    ///
    /// Returns `Ok(false)` when the session is already a member or is being
    /// registered by a concurrent call; the handshake runs at most once.
    pub async fn register(&self, session: Arc<dyn Session>) -> Result<bool, SessionError> {
        let id = session.id();
        let Some(reservation) = self.reserve(id) else {
            return Ok(false);
        };

        let accepted = session.accept().await;

        let mut sessions = self.sessions();
        drop(reservation);
        accepted?;
        sessions.push(session);
        info!("Registered session {} ({} live)", id, sessions.len());
        Ok(true)
    }

    /// Remove a session. Removing a non-member is a no-op.
    pub fn deregister(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions();
        match sessions.iter().position(|s| s.id() == *id) {
            Some(index) => {
                sessions.remove(index);
                info!("Deregistered session {} ({} live)", id, sessions.len());
                true
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.sessions().len()
    }

    /// Point-in-time copy of the live set, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Session>> {
        self.sessions().clone()
    }

    /// Close every live session and empty the registry.
    ///
    /// Membership is cleared up front and unconditionally. Each close is
    /// bounded by the close timeout; failures and timeouts are counted and
    /// otherwise ignored.
    pub async fn close_all(&self) -> CloseReport {
        let sessions = std::mem::take(&mut *self.sessions());
        let mut report = CloseReport::default();

        for session in sessions {
            match close_within(session.as_ref(), self.close_timeout).await {
                Ok(()) => {
                    debug!("Closed session {}", session.id());
                    report.closed += 1;
                }
                Err(e) => {
                    warn!("Failed to close session {}: {}", session.id(), e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Closed all sessions: {} closed, {} failed",
            report.closed, report.failed
        );
        report
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
