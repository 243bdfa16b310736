// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! HTTP routes and the shared server context.

use actix_web::{web, HttpRequest, HttpResponse, Responder, Result};
use actix_web_actors::ws;
use log::{error, info};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::registry::ConnectionRegistry;
use crate::session::{serve_session, Session};
use crate::shutdown::{ShutdownHandle, ShutdownState};
use crate::websocket::{WsConnection, WsSession, MAILBOX_CAPACITY};

/// Everything a request handler needs, built once at startup.
pub struct ServerContext {
    pub registry: Arc<ConnectionRegistry>,
    pub shutdown: ShutdownHandle,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub state: ShutdownState,
    pub live_sessions: usize,
}

/// Register the service routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(websocket_handler))
        .route("/status", web::get().to(status));
}

/// Upgrade to a WebSocket subscriber session.
///
/// New subscribers are turned away once shutdown has been requested.
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<ServerContext>,
) -> Result<HttpResponse, actix_web::Error> {
    if data.shutdown.is_shutting_down() {
        info!("Rejecting WebSocket connection during shutdown");
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": "server is shutting down"
        })));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let (addr, response) =
        ws::WsResponseBuilder::new(WsConnection::new(tx, MAILBOX_CAPACITY), &req, stream)
            .start_with_addr()
            .map_err(|e| {
                error!("WebSocket connection failed: {:?}", e);
                e
            })?;

    let session: Arc<dyn Session> = Arc::new(WsSession::new(addr, rx));
    actix_web::rt::spawn(serve_session(data.registry.clone(), session));

    Ok(response)
}

pub async fn status(data: web::Data<ServerContext>) -> impl Responder {
    HttpResponse::Ok().json(StatusResponse {
        state: data.shutdown.state(),
        live_sessions: data.registry.live_count(),
    })
}
