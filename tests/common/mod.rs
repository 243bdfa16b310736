// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use notify_websrv::{Session, SessionError, SessionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Subscriber double that records what it was sent.
pub struct Subscriber {
    id: SessionId,
    fail_close: bool,
    received: Mutex<Vec<String>>,
    closed: AtomicBool,
    gone: Notify,
}

impl Subscriber {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            fail_close: false,
            received: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            gone: Notify::new(),
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::new()
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for Subscriber {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn accept(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if self.was_closed() {
            return Err(SessionError::Send("closed".into()));
        }
        self.received.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn receive_text(&self) -> Result<String, SessionError> {
        self.gone.notified().await;
        Err(SessionError::Disconnected)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        self.gone.notify_waiters();
        if self.fail_close {
            return Err(SessionError::Close("connection reset".into()));
        }
        Ok(())
    }
}
