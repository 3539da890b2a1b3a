// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired and current state snapshots.
//!
//! The desired state is read from the enable and hostnames annotations plus the
//! load-balancer status. The current state is whatever this controller last
//! wrote into the state annotation; it is never read back from Cloud DNS.

use crate::constants::{ANNOTATION_ENABLED, ANNOTATION_HOSTNAMES, ENABLED_FALSE, ENABLED_TRUE};
use crate::resource::SyncResource;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What should be, or what was last written, to Cloud DNS for one resource.
///
/// Serialized as `{"enabled":"true","hostnames":"a.example.com","ipAddress":"10.0.0.1"}`
/// into the state annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSyncState {
    /// `"true"` when sync is switched on
    pub enabled: String,

    /// Comma-separated hostnames, order significant
    pub hostnames: String,

    /// IP address the hostnames point to
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
}

impl DnsSyncState {
    /// True when the snapshot asks for DNS records to exist.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled == ENABLED_TRUE && !self.hostnames.is_empty() && !self.ip_address.is_empty()
    }

    /// True when this (desired) snapshot needs to be written over `current`.
    ///
    /// Only hostnames and IP address count. Hostnames compare as strings, so a
    /// reordered list is a change.
    #[must_use]
    pub fn has_drift(&self, current: &DnsSyncState) -> bool {
        self.ip_address != current.ip_address || self.hostnames != current.hostnames
    }
}

/// Build the desired snapshot from annotations and load-balancer status.
pub fn desired_state<R: SyncResource>(resource: &R) -> DnsSyncState {
    DnsSyncState {
        enabled: resource
            .annotation(ANNOTATION_ENABLED)
            .unwrap_or(ENABLED_FALSE)
            .to_string(),
        hostnames: resource
            .annotation(ANNOTATION_HOSTNAMES)
            .unwrap_or_default()
            .to_string(),
        ip_address: resource.assigned_ips().into_iter().next().unwrap_or_default(),
    }
}

/// Read the last applied snapshot from the state annotation.
///
/// A missing or unparseable annotation yields the empty snapshot.
pub fn current_state<R: SyncResource>(resource: &R) -> DnsSyncState {
    let Some(raw) = resource.state_annotation() else {
        return DnsSyncState::default();
    };

    match serde_json::from_str(raw) {
        Ok(state) => state,
        Err(e) => {
            debug!(
                kind = R::KIND,
                error = %e,
                "Ignoring unparseable state annotation"
            );
            DnsSyncState::default()
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
