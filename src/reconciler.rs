// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of a single Service or Ingress.
//!
//! ## Reconciliation Flow
//!
//! 1. Read the desired state (annotations + load-balancer IP) and the current
//!    state (state annotation)
//! 2. Skip unless sync is enabled, hostnames are set and an IP is assigned
//! 3. Skip unless the IP address or the hostnames differ from the current state
//! 4. Upsert an A record per valid hostname, stopping at the first failure
//! 5. Write the desired state into the state annotation and update the resource
//!
//! A failure after DNS writes leaves those records in place. The state
//! annotation is then not updated, so the next attempt sends the same
//! (idempotent) writes again.

use crate::constants::{INITIATOR_POLLER, INITIATOR_WATCHER, RECORD_TYPE_A};
use crate::dns::DnsProvider;
use crate::errors::ReconcileError;
use crate::resource::{ResourceClient, SyncResource};
use crate::state::{current_state, desired_state};
use crate::validation::{split_hostnames, validate_hostname};
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, error, info};

/// Outcome of one reconciliation, used as the `status` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// Nothing to do: sync disabled, incomplete, or already applied
    Skipped,
    /// DNS records written and state persisted
    Succeeded,
    /// A DNS write or the state update failed
    Failed,
}

impl ReconcileStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What triggered a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    /// A watch event, with its type (`ADDED` or `MODIFIED`)
    Watcher(&'static str),
    /// The periodic sweep
    Poller,
}

impl Initiator {
    /// Value of the `initiator` metric label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Watcher(_) => INITIATOR_WATCHER,
            Self::Poller => INITIATOR_POLLER,
        }
    }
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watcher(event) => write!(f, "{INITIATOR_WATCHER}:{event}"),
            Self::Poller => f.write_str(INITIATOR_POLLER),
        }
    }
}

/// Bring Cloud DNS in line with one resource's annotations.
///
/// Returns [`ReconcileStatus::Skipped`] or [`ReconcileStatus::Succeeded`];
/// every error is a failed reconciliation.
///
/// # Errors
///
/// - [`ReconcileError::Dns`] when an upsert fails (remaining hostnames are not attempted)
/// - [`ReconcileError::Serialize`] when the state cannot be serialized
/// - [`ReconcileError::Update`] when the state annotation cannot be written back
/// - [`ReconcileError::MissingMetadata`] when the resource has no namespace
pub async fn reconcile<R, D, C>(
    resource: R,
    initiator: Initiator,
    dns: &D,
    client: &C,
) -> Result<ReconcileStatus, ReconcileError>
where
    R: SyncResource,
    D: DnsProvider + ?Sized,
    C: ResourceClient<R> + ?Sized,
{
    let kind = R::KIND;
    let name = resource.name_any();
    let namespace = resource.namespace();
    let desired = desired_state(&resource);
    let current = current_state(&resource);

    if !desired.is_active() {
        debug!(
            kind,
            name = %name,
            namespace = ?namespace,
            initiator = %initiator,
            enabled = %desired.enabled,
            "Dns sync not enabled or incomplete, skipping"
        );
        return Ok(ReconcileStatus::Skipped);
    }

    if !desired.has_drift(&current) {
        debug!(
            kind,
            name = %name,
            namespace = ?namespace,
            initiator = %initiator,
            "Dns records already up to date, skipping"
        );
        return Ok(ReconcileStatus::Skipped);
    }

    if namespace.is_none() {
        return Err(ReconcileError::MissingMetadata {
            kind,
            field: "namespace",
        });
    }

    info!(
        kind,
        name = %name,
        namespace = ?namespace,
        initiator = %initiator,
        hostnames = %desired.hostnames,
        ip_address = %desired.ip_address,
        previous_hostnames = %current.hostnames,
        previous_ip_address = %current.ip_address,
        "Hostnames or ip address changed, updating dns records"
    );

    for hostname in split_hostnames(&desired.hostnames) {
        if let Err(e) = validate_hostname(hostname) {
            error!(
                kind,
                name = %name,
                namespace = ?namespace,
                initiator = %initiator,
                hostname = %hostname,
                error = %e,
                "Skipping invalid hostname"
            );
            continue;
        }

        dns.upsert_record(RECORD_TYPE_A, hostname, &desired.ip_address)
            .await
            .map_err(|source| ReconcileError::Dns {
                hostname: hostname.to_string(),
                ip_address: desired.ip_address.clone(),
                source,
            })?;

        info!(
            kind,
            name = %name,
            namespace = ?namespace,
            initiator = %initiator,
            hostname = %hostname,
            ip_address = %desired.ip_address,
            "Dns record (A) upserted"
        );
    }

    let state = serde_json::to_string(&desired)?;
    let mut updated = resource;
    updated.set_state_annotation(state);
    client.update(&updated).await?;

    info!(
        kind,
        name = %name,
        namespace = ?namespace,
        initiator = %initiator,
        "State annotation updated"
    );

    Ok(ReconcileStatus::Succeeded)
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
