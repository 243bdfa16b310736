// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket transport.
//!
//! Provides:
//! - [`WsConnection`], the actix actor that owns the socket
//! - [`WsSession`], the [`Session`] implementation that talks to that actor
//!   through its mailbox

use actix::prelude::*;
use actix_web_actors::ws;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use crate::error::SessionError;
use crate::session::{Session, SessionId};

/// Mailbox capacity per connection; a full mailbox makes senders wait.
pub const MAILBOX_CAPACITY: usize = 16;

// ============================================================================
// Actor Messages
// ============================================================================

/// Outbound text frame
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

/// Send a close frame and stop the actor
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect;

/// Handshake probe, answered only while the actor is alive
#[derive(Message)]
#[rtype(result = "()")]
pub struct Probe;

// ============================================================================
// WebSocket Actor
// ============================================================================

/// Actor owning one client socket. Inbound text is forwarded to the paired
/// [`WsSession`]; dropping the actor closes that channel.
pub struct WsConnection {
    inbound: mpsc::UnboundedSender<String>,
    capacity: usize,
}

impl WsConnection {
    pub fn new(inbound: mpsc::UnboundedSender<String>, capacity: usize) -> Self {
        WsConnection { inbound, capacity }
    }
}

impl Actor for WsConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if self.capacity > 0 {
            ctx.set_mailbox_capacity(self.capacity);
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                if self.inbound.send(text.to_string()).is_err() {
                    ctx.stop();
                }
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => {
                debug!("Client sent close frame: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                warn!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

impl Handler<Deliver> for WsConnection {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<Disconnect> for WsConnection {
    type Result = ();

    fn handle(&mut self, _: Disconnect, ctx: &mut Self::Context) {
        ctx.close(Some(ws::CloseCode::Away.into()));
        ctx.stop();
    }
}

impl Handler<Probe> for WsConnection {
    type Result = ();

    fn handle(&mut self, _: Probe, _: &mut Self::Context) {}
}

// ============================================================================
// Session Handle
// ============================================================================

/// [`Session`] backed by a [`WsConnection`] actor.
pub struct WsSession {
    id: SessionId,
    addr: Addr<WsConnection>,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl WsSession {
    pub fn new(addr: Addr<WsConnection>, inbound: mpsc::UnboundedReceiver<String>) -> Self {
        WsSession {
            id: SessionId::new(),
            addr,
            inbound: Mutex::new(inbound),
        }
    }
}

#[async_trait]
impl Session for WsSession {
    fn id(&self) -> SessionId {
        self.id
    }

    /// The HTTP upgrade has already happened by the time a `WsSession`
    /// exists, so this only confirms the actor is still running.
    async fn accept(&self) -> Result<(), SessionError> {
        self.addr
            .send(Probe)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.addr
            .send(Deliver(text.to_owned()))
            .await
            .map_err(|e| SessionError::Send(e.to_string()))
    }

    async fn receive_text(&self) -> Result<String, SessionError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(SessionError::Disconnected)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.addr
            .send(Disconnect)
            .await
            .map_err(|e| SessionError::Close(e.to_string()))
    }
}
