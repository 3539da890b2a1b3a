// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # cloud-dns-sync - Google Cloud DNS records for Kubernetes load balancers
//!
//! cloud-dns-sync is a Kubernetes controller that keeps Google Cloud DNS `A`
//! records pointed at the load-balancer IPs of annotated Services and Ingresses.
//!
//! ## Overview
//!
//! A resource opts in with three annotations:
//!
//! - `estafette.io/google-cloud-dns: "true"` enables sync
//! - `estafette.io/google-cloud-dns-hostnames` lists the hostnames, comma separated
//! - `estafette.io/google-cloud-dns-state` is written by the controller and holds
//!   the last state applied to Cloud DNS
//!
//! Resources reach the reconciler from a watch per kind and from a periodic
//! sweep over all resources. The reconciler only writes to Cloud DNS when the
//! desired state drifts from the recorded one.
//!
//! ## Modules
//!
//! - [`state`] - desired/recorded state extraction and drift detection
//! - [`reconciler`] - the per-resource reconciliation pipeline
//! - [`dns`] - the Cloud DNS gateway, REST provider and credentials
//! - [`controller`] - watch and sweep trigger loops
//! - [`shutdown`] - in-flight tracking and signal handling
//! - [`metrics`] and [`server`] - Prometheus metrics and the HTTP surface
//!
//! ## Example
//!
//! ```rust
//! use cloud_dns_sync::state::DnsSyncState;
//!
//! let recorded = DnsSyncState {
//!     enabled: "true".to_string(),
//!     hostnames: "web.example.com".to_string(),
//!     ip_address: "10.0.0.1".to_string(),
//! };
//! let desired = DnsSyncState {
//!     ip_address: "10.0.0.2".to_string(),
//!     ..recorded.clone()
//! };
//!
//! assert!(desired.is_active());
//! assert!(desired.has_drift(&recorded));
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod dns;
pub mod errors;
pub mod jitter;
pub mod metrics;
pub mod reconciler;
pub mod resource;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod testing;
