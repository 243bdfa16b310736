// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Notification broadcast server library.
//!
//! Holds a set of connected WebSocket subscribers, periodically pushes a
//! notification to all of them, and drains them within a bounded time when
//! the process is asked to stop.

pub mod args;
pub mod broadcast;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod websocket;

// Re-export commonly used types for convenience
pub use args::{Args, Settings};
pub use broadcast::{BroadcastReport, Broadcaster, NotificationPayload};
pub use error::{SessionError, SettingsError};
pub use registry::{CloseReport, ConnectionRegistry};
pub use scheduler::{EmptyPolicy, NotificationScheduler, SchedulerSummary};
pub use server::ServerContext;
pub use session::{serve_session, Session, SessionId};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownOutcome, ShutdownState};
