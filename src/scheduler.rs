// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic notification task.

use clap::ValueEnum;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, NotificationPayload};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownHandle;

/// What a cycle does when no session is connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EmptyPolicy {
    /// Skip the cycle and keep waiting for subscribers.
    #[default]
    Skip,
    /// Treat an empty registry as the end of the service and request shutdown.
    Shutdown,
}

/// Totals over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub delivered: u64,
    pub removed: u64,
}

pub struct NotificationScheduler {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    shutdown: ShutdownHandle,
    payload: NotificationPayload,
    interval: Duration,
    empty_policy: EmptyPolicy,
}

impl NotificationScheduler {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown: ShutdownHandle,
        payload: NotificationPayload,
        interval: Duration,
        empty_policy: EmptyPolicy,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            shutdown,
            payload,
            interval,
            empty_policy,
        }
    }

    /// Broadcast the payload every interval until shutdown is requested or
    /// `cancel` fires. The first cycle runs one interval after start.
    pub async fn run(self, cancel: CancellationToken) -> SchedulerSummary {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = SchedulerSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Notification scheduler cancelled");
                    break;
                }
                _ = self.shutdown.requested() => {
                    info!("Shutdown requested, stopping notification scheduler");
                    break;
                }
                _ = ticker.tick() => {}
            }

            summary.cycles += 1;
            let live = self.registry.live_count();
            if live == 0 {
                match self.empty_policy {
                    EmptyPolicy::Skip => {
                        debug!("No active sessions, skipping broadcast");
                        continue;
                    }
                    EmptyPolicy::Shutdown => {
                        info!("No active sessions, requesting shutdown");
                        self.shutdown.request_shutdown();
                        break;
                    }
                }
            }

            let report = self.broadcaster.broadcast(&self.payload).await;
            summary.delivered += report.delivered as u64;
            summary.removed += report.removed as u64;
            info!(
                "Sent notification to {} session(s), {} removed",
                report.delivered, report.removed
            );
        }

        summary
    }
}
