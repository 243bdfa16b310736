// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::time::Duration;

use crate::broadcast::NotificationPayload;
use crate::error::SettingsError;
use crate::scheduler::EmptyPolicy;

/// Command-line arguments for the notification server.
///
/// Every option can also be supplied through the environment.
///
/// # Example
///
/// ```bash
/// # Via command line
/// notify-websrv --http-port 8080 --interval-secs 30 --payload '{"type":"refresh"}'
///
/// # Via environment variables
/// export NOTIFY_HTTP_PORT=8080
/// export NOTIFY_EMPTY_POLICY=shutdown
/// notify-websrv
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "NOTIFY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "NOTIFY_HTTP_PORT", default_value = "8000")]
    pub http_port: u16,

    /// Text broadcast to every subscriber each cycle
    #[arg(long, env = "NOTIFY_PAYLOAD", default_value = "notification")]
    pub payload: String,

    /// Seconds between broadcast cycles
    #[arg(long, env = "NOTIFY_INTERVAL_SECS", default_value = "10")]
    pub interval_secs: u64,

    /// Minutes to wait for subscribers to disconnect before forcing them closed
    #[arg(long, env = "NOTIFY_SHUTDOWN_TIMEOUT_MINS", default_value = "5")]
    pub shutdown_timeout_mins: u64,

    /// Seconds between checks while draining
    #[arg(long, env = "NOTIFY_DRAIN_POLL_SECS", default_value = "5")]
    pub drain_poll_secs: u64,

    /// Milliseconds a single send may take before the subscriber is dropped
    #[arg(long, env = "NOTIFY_SEND_TIMEOUT_MS", default_value = "5000")]
    pub send_timeout_ms: u64,

    /// Milliseconds a single close may take before it is counted as failed
    #[arg(long, env = "NOTIFY_CLOSE_TIMEOUT_MS", default_value = "2000")]
    pub close_timeout_ms: u64,

    /// What to do on a cycle with no subscribers
    #[arg(long, env = "NOTIFY_EMPTY_POLICY", value_enum, default_value_t = EmptyPolicy::Skip)]
    pub empty_policy: EmptyPolicy,

    /// HTTP worker threads
    #[arg(long, env = "NOTIFY_WORKERS", default_value = "4")]
    pub workers: usize,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub http_port: u16,
    pub payload: NotificationPayload,
    pub interval: Duration,
    pub shutdown_timeout: Duration,
    pub drain_poll: Duration,
    pub send_timeout: Duration,
    pub close_timeout: Duration,
    pub empty_policy: EmptyPolicy,
    pub workers: usize,
}

impl Args {
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        fn non_zero(value: u64, name: &'static str) -> Result<u64, SettingsError> {
            if value == 0 {
                Err(SettingsError::Zero(name))
            } else {
                Ok(value)
            }
        }

        if self.payload.is_empty() {
            return Err(SettingsError::EmptyPayload);
        }
        if self.workers == 0 {
            return Err(SettingsError::Zero("workers"));
        }

        Ok(Settings {
            host: self.host.clone(),
            http_port: self.http_port,
            payload: NotificationPayload::new(self.payload.as_str()),
            interval: Duration::from_secs(non_zero(self.interval_secs, "interval-secs")?),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_mins * 60),
            drain_poll: Duration::from_secs(non_zero(self.drain_poll_secs, "drain-poll-secs")?),
            send_timeout: Duration::from_millis(non_zero(
                self.send_timeout_ms,
                "send-timeout-ms",
            )?),
            close_timeout: Duration::from_millis(non_zero(
                self.close_timeout_ms,
                "close-timeout-ms",
            )?),
            empty_policy: self.empty_policy,
            workers: self.workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Args::try_parse_from(["notify-websrv"])
            .unwrap()
            .settings()
            .unwrap();

        assert_eq!(settings.http_port, 8000);
        assert_eq!(settings.payload.as_str(), "notification");
        assert_eq!(settings.interval, Duration::from_secs(10));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(300));
        assert_eq!(settings.drain_poll, Duration::from_secs(5));
        assert_eq!(settings.send_timeout, Duration::from_millis(5000));
        assert_eq!(settings.close_timeout, Duration::from_millis(2000));
        assert_eq!(settings.empty_policy, EmptyPolicy::Skip);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "notify-websrv",
            "--http-port",
            "9001",
            "--shutdown-timeout-mins",
            "1",
            "--empty-policy",
            "shutdown",
            "--payload",
            "refresh",
        ])
        .unwrap();
        let settings = args.settings().unwrap();

        assert_eq!(settings.http_port, 9001);
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(60));
        assert_eq!(settings.empty_policy, EmptyPolicy::Shutdown);
        assert_eq!(settings.payload.as_str(), "refresh");
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let args = Args::try_parse_from(["notify-websrv", "--interval-secs", "0"]).unwrap();
        assert_eq!(
            args.settings().unwrap_err(),
            SettingsError::Zero("interval-secs")
        );
    }

    #[test]
    fn test_zero_close_timeout_is_rejected() {
        let args = Args::try_parse_from(["notify-websrv", "--close-timeout-ms", "0"]).unwrap();
        assert_eq!(
            args.settings().unwrap_err(),
            SettingsError::Zero("close-timeout-ms")
        );
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let args = Args::try_parse_from(["notify-websrv", "--payload", ""]).unwrap();
        assert_eq!(args.settings().unwrap_err(), SettingsError::EmptyPayload);
    }

    #[test]
    fn test_unknown_policy_fails_to_parse() {
        assert!(Args::try_parse_from(["notify-websrv", "--empty-policy", "sometimes"]).is_err());
    }
}
