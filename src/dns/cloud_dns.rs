// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS provider.
//!
//! Uses the Cloud DNS REST API v1 against a single managed zone.
//!
//! # API Endpoints Used
//!
//! - `GET /dns/v1/projects/{project}/managedZones/{zone}/rrsets?name=&type=` - List record sets
//! - `POST /dns/v1/projects/{project}/managedZones/{zone}/changes` - Apply a change
//!
//! # Required Permissions
//!
//! The credentials need the `ndev.clouddns.readwrite` scope and the
//! `roles/dns.admin` role (or equivalent) on the project.

use super::credentials::TokenSource;
use super::types::{google_error_message, Change, RecordSetsListResponse, ResourceRecordSet};
use super::DnsProvider;
use crate::constants::{CLOUD_DNS_API_URL, HTTP_REQUEST_TIMEOUT_SECS};
use crate::errors::DnsError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Build the HTTP client shared by the provider and the token source.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .build()
}

/// Cloud DNS provider for one managed zone.
pub struct CloudDnsProvider {
    http: reqwest::Client,
    token_source: Arc<TokenSource>,
    project: String,
    zone: String,
    base_url: String,
}

impl CloudDnsProvider {
    /// Create a provider talking to the public Cloud DNS endpoint.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        token_source: Arc<TokenSource>,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Self {
        Self::new_with_base_url(http, token_source, project, zone, CLOUD_DNS_API_URL)
    }

    /// Create a provider with a custom API base URL (used in tests).
    #[must_use]
    pub fn new_with_base_url(
        http: reqwest::Client,
        token_source: Arc<TokenSource>,
        project: impl Into<String>,
        zone: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_source,
            project: project.into(),
            zone: zone.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn zone_url(&self, resource: &str) -> Result<Url, DnsError> {
        let raw = format!(
            "{}/dns/v1/projects/{}/managedZones/{}/{}",
            self.base_url, self.project, self.zone, resource
        );
        Url::parse(&raw).map_err(|e| DnsError::HttpRequestFailed {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Attach the bearer token, send, and return the body of a 2xx response.
    async fn send(&self, url: &Url, request: reqwest::RequestBuilder) -> Result<String, DnsError> {
        let token = self.token_source.access_token().await?;

        let request_failed = |e: reqwest::Error| DnsError::HttpRequestFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;

        if !status.is_success() {
            error!(
                url = %url,
                status = %status,
                body = %body,
                "Cloud DNS request failed"
            );
            return Err(DnsError::Api {
                url: url.to_string(),
                status_code: status.as_u16(),
                message: google_error_message(&body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl DnsProvider for CloudDnsProvider {
    async fn list_record_sets(
        &self,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<ResourceRecordSet>, DnsError> {
        let mut record_sets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.zone_url("rrsets")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("name", name).append_pair("type", record_type);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let body = self.send(&url, self.http.get(url.as_str())).await?;
            let page: RecordSetsListResponse =
                serde_json::from_str(&body).map_err(|e| DnsError::InvalidResponse {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            record_sets.extend(page.rrsets);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            zone = %self.zone,
            name = %name,
            record_type = %record_type,
            count = record_sets.len(),
            "Listed Cloud DNS record sets"
        );

        Ok(record_sets)
    }

    async fn apply_change(&self, change: &Change) -> Result<(), DnsError> {
        let url = self.zone_url("changes")?;
        self.send(&url, self.http.post(url.as_str()).json(change))
            .await?;

        debug!(
            zone = %self.zone,
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            "Submitted Cloud DNS change"
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "cloud_dns_tests.rs"]
mod cloud_dns_tests;
