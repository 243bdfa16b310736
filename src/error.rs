// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-session failure taxonomy.
//!
//! None of these escape the registry or the broadcaster. They are logged and
//! the failing session is dropped from the live set.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The transport handshake failed; the session is never registered.
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    /// The peer went away while we were waiting for input.
    #[error("session disconnected")]
    Disconnected,

    #[error("close failed: {0}")]
    Close(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Rejected command line / environment configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("notification payload must not be empty")]
    EmptyPayload,
}
