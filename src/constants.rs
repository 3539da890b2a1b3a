// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Cloud DNS sync controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Annotation Constants
// ============================================================================

/// Annotation that enables DNS sync for a Service or Ingress when set to `"true"`
pub const ANNOTATION_ENABLED: &str = "estafette.io/google-cloud-dns";

/// Annotation holding the comma-separated hostnames to point at the resource
pub const ANNOTATION_HOSTNAMES: &str = "estafette.io/google-cloud-dns-hostnames";

/// Annotation holding the JSON snapshot of the last state written to Cloud DNS
pub const ANNOTATION_STATE: &str = "estafette.io/google-cloud-dns-state";

/// Value of the enable annotation that switches sync on
pub const ENABLED_TRUE: &str = "true";

/// Value assumed when the enable annotation is absent
pub const ENABLED_FALSE: &str = "false";

// ============================================================================
// Resource Kind Constants
// ============================================================================

/// Metric/log label for `Service` resources
pub const KIND_SERVICE: &str = "service";

/// Metric/log label for `Ingress` resources
pub const KIND_INGRESS: &str = "ingress";

/// Service type that receives an external load-balancer IP
pub const SERVICE_TYPE_LOAD_BALANCER: &str = "LoadBalancer";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// The only record type this controller writes
pub const RECORD_TYPE_A: &str = "A";

/// TTL for DNS records written to Cloud DNS (5 minutes)
pub const DNS_RECORD_TTL_SECS: i32 = 300;

/// Minimum number of labels in a hostname (a subdomain within a zone)
pub const MIN_HOSTNAME_LABELS: usize = 2;

/// Maximum length of a single DNS label
pub const MAX_LABEL_LENGTH: usize = 63;

// ============================================================================
// Google Cloud Constants
// ============================================================================

/// Base URL of the Cloud DNS REST API
pub const CLOUD_DNS_API_URL: &str = "https://dns.googleapis.com";

/// OAuth2 scope required to read and write Cloud DNS record sets
pub const CLOUD_DNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Default OAuth2 token endpoint
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Metadata server token endpoint used when no credentials file is configured
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Lifetime requested for service account JWT assertions (1 hour)
pub const JWT_LIFETIME_SECS: i64 = 3600;

/// Access tokens are refreshed this long before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Timeout for a single HTTP request to Google APIs
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Trigger Loop Constants
// ============================================================================

/// Server-side timeout for a single watch request.
///
/// The Kubernetes client rejects watch timeouts of 295s and above.
pub const WATCH_TIMEOUT_SECS: u32 = 290;

/// Base sleep between watch reconnects (30 seconds, jittered)
pub const WATCH_RETRY_BASE_SECS: u64 = 30;

/// Base sleep between full list sweeps (15 minutes, jittered)
pub const SWEEP_INTERVAL_BASE_SECS: u64 = 900;

/// Jitter applied to loop sleeps (±25%)
pub const JITTER_FACTOR: f64 = 0.25;

/// Lower bound applied to every loop interval; a zero base would spin
pub const MIN_LOOP_INTERVAL_SECS: u64 = 1;

/// How often the credentials file is checked for changes
pub const CREDENTIALS_POLL_SECS: u64 = 30;

/// Maximum time to wait for in-flight reconciliations on shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;

/// Initiator label for reconciliations triggered by a watch event
pub const INITIATOR_WATCHER: &str = "watcher";

/// Initiator label for reconciliations triggered by the periodic sweep
pub const INITIATOR_POLLER: &str = "poller";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default listen address for the metrics and liveness HTTP server
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9101";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness probe endpoint
pub const LIVENESS_PATH: &str = "/liveness";
