// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration.
//!
//! Every flag can also be set through the environment variable shown in its help.

use crate::constants::{
    CREDENTIALS_POLL_SECS, DEFAULT_LISTEN_ADDRESS, SHUTDOWN_TIMEOUT_SECS,
    SWEEP_INTERVAL_BASE_SECS, WATCH_RETRY_BASE_SECS,
};
use crate::controller::LoopSettings;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Sync annotated Service and Ingress load-balancer IPs into Google Cloud DNS.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "cloud-dns-sync", version, about, long_about = None)]
pub struct Config {
    /// Google Cloud project owning the managed zone
    #[arg(long, env = "GOOGLE_CLOUD_DNS_PROJECT")]
    pub project: String,

    /// Name of the Cloud DNS managed zone to write records into
    #[arg(long, env = "GOOGLE_CLOUD_DNS_ZONE")]
    pub zone: String,

    /// Address for the metrics and liveness HTTP server
    #[arg(long, env = "LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: SocketAddr,

    /// Service account or authorized user JSON; the metadata server is used when unset
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials_file: Option<PathBuf>,

    /// Base sleep before reopening a watch, jittered by 25%
    #[arg(
        long,
        env = "WATCH_RETRY_SECS",
        default_value_t = WATCH_RETRY_BASE_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub watch_retry_secs: u64,

    /// Base sleep between full sweeps, jittered by 25%
    #[arg(
        long,
        env = "SWEEP_INTERVAL_SECS",
        default_value_t = SWEEP_INTERVAL_BASE_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,

    /// How often the credentials file is checked for changes
    #[arg(
        long,
        env = "CREDENTIALS_POLL_SECS",
        default_value_t = CREDENTIALS_POLL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub credentials_poll_secs: u64,

    /// Maximum wait for in-flight reconciliations on shutdown
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    #[must_use]
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            watch_retry: Duration::from_secs(self.watch_retry_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    #[must_use]
    pub fn credentials_poll(&self) -> Duration {
        Duration::from_secs(self.credentials_poll_secs)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
