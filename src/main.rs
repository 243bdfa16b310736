// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use notify_websrv::{
    server, Args, Broadcaster, ConnectionRegistry, NotificationScheduler, ServerContext,
    ShutdownCoordinator, ShutdownOutcome,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = args.settings().context("Invalid configuration")?;

    let registry = Arc::new(ConnectionRegistry::with_close_timeout(
        settings.close_timeout,
    ));
    let broadcaster = Arc::new(Broadcaster::new(registry.clone(), settings.send_timeout));
    let coordinator = ShutdownCoordinator::new(
        registry.clone(),
        settings.shutdown_timeout,
        settings.drain_poll,
    );
    let shutdown = coordinator.handle();

    let ctx = web::Data::new(ServerContext {
        registry: registry.clone(),
        shutdown: shutdown.clone(),
    });

    // Signals are routed through the coordinator, not actix's own handler.
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(ctx.clone())
            .configure(server::configure)
    })
    .disable_signals()
    .workers(settings.workers)
    .bind((settings.host.as_str(), settings.http_port))
    .with_context(|| format!("Failed to bind {}:{}", settings.host, settings.http_port))?
    .run();
    let server_handle = http_server.handle();
    info!("Listening on ws://{}:{}/ws", settings.host, settings.http_port);

    let cancel = CancellationToken::new();

    let signal_task = tokio::spawn({
        let shutdown = shutdown.clone();
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = shutdown.wait_for_signal() => {
                    if let Err(e) = result {
                        error!("Failed to install signal handlers: {}", e);
                        shutdown.request_shutdown();
                    }
                }
            }
        }
    });

    let scheduler = NotificationScheduler::new(
        registry,
        broadcaster,
        shutdown,
        settings.payload.clone(),
        settings.interval,
        settings.empty_policy,
    );
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));

    let drain = coordinator.run(move || async move {
        cancel.cancel();
        match scheduler_task.await {
            Ok(summary) => info!(
                "Scheduler stopped after {} cycle(s), {} delivered, {} removed",
                summary.cycles, summary.delivered, summary.removed
            ),
            Err(e) => warn!("Scheduler task failed: {}", e),
        }
        if let Err(e) = signal_task.await {
            warn!("Signal task failed: {}", e);
        }
        server_handle.stop(true).await;
    });

    // The server keeps serving subscribers while they drain; the termination
    // callback stops it.
    let (served, outcome) = tokio::join!(http_server, drain);
    if let Err(e) = served {
        warn!("HTTP server exited with error: {}", e);
    }

    if let ShutdownOutcome::Forced(report) = outcome {
        warn!(
            "Forced {} session(s) closed, {} close failure(s)",
            report.closed, report.failed
        );
    }
    info!("Server shut down");
    Ok(())
}
