// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fan-out delivery of a payload to every live session.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SessionError;
use crate::registry::ConnectionRegistry;
use crate::session::{close_quietly, Session};

/// Immutable notification text, shared between broadcast cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload(Arc<str>);

impl NotificationPayload {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of one broadcast, for logging and metrics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub removed: usize,
}

pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Send `payload` to every session in a snapshot of the registry.
    ///
    /// Sessions are visited in snapshot order. A session whose send fails
    /// (or exceeds the send timeout) is closed best-effort, bounded by the
    /// registry's close timeout, and deregistered;
    /// delivery to the remaining sessions continues.
    pub async fn broadcast(&self, payload: &NotificationPayload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for session in self.registry.snapshot() {
            match self.send(session.as_ref(), payload.as_str()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Error sending message to session {}: {}", session.id(), e);
                    close_quietly(session.as_ref(), self.registry.close_timeout()).await;
                    self.registry.deregister(&session.id());
                    report.removed += 1;
                }
            }
        }

        debug!(
            "Broadcast delivered to {} session(s), removed {}",
            report.delivered, report.removed
        );
        report
    }

    async fn send(&self, session: &dyn Session, text: &str) -> Result<(), SessionError> {
        tokio::time::timeout(self.send_timeout, session.send_text(text))
            .await
            .map_err(|_| SessionError::Timeout(self.send_timeout))?
    }
}
