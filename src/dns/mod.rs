// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider gateway.
//!
//! The reconciler only needs "create or replace an A record". Providers expose
//! two primitives, list matching record sets and apply a change, and
//! [`DnsProvider::upsert_record`] combines them: the existing record sets are
//! sent as deletions in the same change as the new record set, so a single
//! provider round trip replaces any stale record.
//!
//! Implementations:
//!
//! - [`cloud_dns::CloudDnsProvider`] - Google Cloud DNS REST API v1

pub mod cloud_dns;
pub mod credentials;
pub mod types;

pub use cloud_dns::CloudDnsProvider;

use crate::constants::DNS_RECORD_TTL_SECS;
use crate::errors::DnsError;
use async_trait::async_trait;
use tracing::{debug, info};
use types::{Change, ResourceRecordSet};

/// A DNS zone that can be listed and changed.
///
/// Implementations must be thread-safe (`Send + Sync`); one provider is shared
/// by all trigger loops.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List record sets matching a fully qualified name and type.
    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, DnsError>;

    /// Submit a change with its deletions and additions.
    async fn apply_change(&self, change: &Change) -> Result<(), DnsError>;

    /// Create or replace the record set `name`/`record_type` with a single value.
    ///
    /// # Errors
    ///
    /// Returns the provider error unmodified; no retry happens here.
    async fn upsert_record(
        &self,
        record_type: &str,
        name: &str,
        value: &str,
    ) -> Result<(), DnsError> {
        let fqdn = fully_qualified(name);
        let desired = ResourceRecordSet::new(
            fqdn.clone(),
            record_type.to_string(),
            DNS_RECORD_TTL_SECS,
            vec![value.to_string()],
        );

        let existing = self.list_record_sets(&fqdn, record_type).await?;

        if existing.len() == 1 && existing[0].same_records(&desired) {
            debug!(
                name = %fqdn,
                record_type = %record_type,
                value = %value,
                "Record set already up to date, skipping change"
            );
            return Ok(());
        }

        let change = Change {
            additions: vec![desired],
            deletions: existing,
        };

        self.apply_change(&change).await?;

        info!(
            name = %fqdn,
            record_type = %record_type,
            value = %value,
            replaced = change.deletions.len(),
            "Upserted DNS record set"
        );

        Ok(())
    }
}

/// Append the trailing dot exactly once.
#[must_use]
pub fn fully_qualified(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}
