// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction for a single subscriber.
//!
//! A [`Session`] is whatever duplex channel the transport hands us: the
//! registry, broadcaster and coordinator only ever talk to it through this
//! trait, so they can be driven by a real WebSocket or by a test double.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::SessionError;
use crate::registry::ConnectionRegistry;

/// Identity of a session. Sessions carry no business identity, so this is
/// just a random id used for membership checks and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capabilities the transport layer exposes for one connection.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    /// Complete the transport handshake.
    async fn accept(&self) -> Result<(), SessionError>;

    async fn send_text(&self, text: &str) -> Result<(), SessionError>;

    /// Wait for the next inbound text message. Returns
    /// [`SessionError::Disconnected`] once the peer is gone.
    async fn receive_text(&self) -> Result<String, SessionError>;

    /// Best-effort close. Callers log and ignore the error.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Close a session, giving up after `limit`. A close that never completes
/// is reported as [`SessionError::Timeout`].
pub(crate) async fn close_within(
    session: &dyn Session,
    limit: Duration,
) -> Result<(), SessionError> {
    tokio::time::timeout(limit, session.close())
        .await
        .map_err(|_| SessionError::Timeout(limit))?
}

/// Close a session and swallow any failure.
pub(crate) async fn close_quietly(session: &dyn Session, limit: Duration) {
    if let Err(e) = close_within(session, limit).await {
        debug!("Ignoring close failure for session {}: {}", session.id(), e);
    }
}

/// Drive one connection from registration to removal.
///
/// Inbound text is echoed back to the sender. Whatever ends the loop, the
/// session is removed from the registry before returning.
pub async fn serve_session(registry: Arc<ConnectionRegistry>, session: Arc<dyn Session>) {
    let id = session.id();

    if let Err(e) = registry.register(session.clone()).await {
        warn!("Rejected session {}: {}", id, e);
        close_quietly(session.as_ref(), registry.close_timeout()).await;
        return;
    }

    loop {
        match session.receive_text().await {
            Ok(text) => {
                debug!("Message received from {}: {}", id, text);
                let reply = format!("Message text was: {}", text);
                if let Err(e) = session.send_text(&reply).await {
                    warn!("Reply to session {} failed: {}", id, e);
                    close_quietly(session.as_ref(), registry.close_timeout()).await;
                    break;
                }
            }
            Err(SessionError::Disconnected) => {
                info!("Client {} disconnected", id);
                break;
            }
            Err(e) => {
                warn!("Client {} disconnected due to error: {}", id, e);
                close_quietly(session.as_ref(), registry.close_timeout()).await;
                break;
            }
        }
    }

    registry.deregister(&id);
}
