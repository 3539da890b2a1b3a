// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Cloud DNS operations, credentials and reconciliation.
//!
//! This module provides specialized error types for:
//! - Cloud DNS REST API operations (listing and changing record sets)
//! - Google credential loading and OAuth2 token exchange
//! - Reconciliation of a single Service or Ingress
//!
//! All errors are contained at the reconciliation boundary: the trigger loops
//! log them and count them, they never stop a loop.

use thiserror::Error;

/// Errors that can occur when talking to the Cloud DNS API.
///
/// These errors are returned unmodified by the DNS gateway; retrying is left
/// to the trigger loops.
#[derive(Error, Debug, Clone)]
pub enum DnsError {
    /// The HTTP request could not be sent or its body could not be read
    #[error("HTTP request to {url} failed: {reason}")]
    HttpRequestFailed {
        /// The request URL
        url: String,
        /// Transport-level failure description
        reason: String,
    },

    /// Cloud DNS answered with a non-success status code
    ///
    /// The message is the `error.message` field of the Google error body when
    /// present, otherwise the raw body.
    #[error("Cloud DNS API returned HTTP {status_code} for {url}: {message}")]
    Api {
        /// The request URL
        url: String,
        /// HTTP status code
        status_code: u16,
        /// Error message reported by the API
        message: String,
    },

    /// The response body did not match the expected Cloud DNS schema
    #[error("Failed to parse Cloud DNS response from {url}: {reason}")]
    InvalidResponse {
        /// The request URL
        url: String,
        /// Deserialization failure description
        reason: String,
    },

    /// An access token could not be obtained
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

impl DnsError {
    /// Returns true if this error is transient and a later attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequestFailed { .. } => true,
            Self::Api { status_code, .. } => is_retryable_status(*status_code),
            Self::InvalidResponse { .. } => false,
            Self::Credentials(err) => err.is_transient(),
        }
    }

    /// Short reason code used in structured logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::HttpRequestFailed { .. } => "HttpRequestFailed",
            Self::Api { .. } => "CloudDnsApiError",
            Self::InvalidResponse { .. } => "InvalidResponse",
            Self::Credentials(_) => "CredentialsError",
        }
    }
}

/// Errors related to Google credentials and OAuth2 access tokens.
#[derive(Error, Debug, Clone)]
pub enum CredentialsError {
    /// The credentials file could not be read
    #[error("Failed to read credentials file '{path}': {reason}")]
    ReadFailed {
        /// Path of the credentials file
        path: String,
        /// I/O failure description
        reason: String,
    },

    /// The credentials file is not valid JSON or misses required fields
    #[error("Invalid credentials file '{path}': {reason}")]
    InvalidFile {
        /// Path of the credentials file
        path: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The credentials file has a `type` this controller cannot use
    #[error("Unsupported credentials type '{credential_type}' in '{path}'")]
    UnsupportedType {
        /// Path of the credentials file
        path: String,
        /// The `type` field found in the file
        credential_type: String,
    },

    /// The service account private key could not be decoded
    #[error("Invalid service account private key: {reason}")]
    InvalidPrivateKey {
        /// Explanation of what is invalid
        reason: String,
    },

    /// Signing the JWT assertion failed
    #[error("Failed to sign JWT assertion: {reason}")]
    SigningFailed {
        /// Signing failure description
        reason: String,
    },

    /// The token endpoint could not be reached
    #[error("Token request to {url} failed: {reason}")]
    TokenRequestFailed {
        /// Token endpoint URL
        url: String,
        /// Transport-level failure description
        reason: String,
    },

    /// The token endpoint refused to issue a token
    #[error("Token endpoint {url} returned HTTP {status_code}: {message}")]
    TokenRejected {
        /// Token endpoint URL
        url: String,
        /// HTTP status code
        status_code: u16,
        /// Response body
        message: String,
    },
}

impl CredentialsError {
    /// Returns true if a later token request may succeed without operator action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TokenRequestFailed { .. } => true,
            Self::TokenRejected { status_code, .. } => is_retryable_status(*status_code),
            Self::ReadFailed { .. }
            | Self::InvalidFile { .. }
            | Self::UnsupportedType { .. }
            | Self::InvalidPrivateKey { .. }
            | Self::SigningFailed { .. } => false,
        }
    }
}

/// Errors that turn a reconciliation into a `failed` outcome.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Upserting one of the hostnames failed; remaining hostnames were not attempted
    #[error("Upserting dns record {hostname} (A) to ip address {ip_address} failed: {source}")]
    Dns {
        /// The hostname whose upsert failed
        hostname: String,
        /// The IP address that was being written
        ip_address: String,
        /// The gateway error
        #[source]
        source: DnsError,
    },

    /// The new state snapshot could not be serialized
    #[error("Marshalling state failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the state annotation back to the resource failed
    #[error("Updating resource state has failed: {0}")]
    Update(#[from] kube::Error),

    /// The resource lacks metadata needed to update it
    #[error("{kind} has no {field}")]
    MissingMetadata {
        /// Resource kind label
        kind: &'static str,
        /// The missing metadata field
        field: &'static str,
    },
}

impl ReconcileError {
    /// Returns true if a later reconciliation may succeed without a resource change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Dns { source, .. } => source.is_transient(),
            Self::Update(kube::Error::Api(api_err)) => {
                api_err.code == 409 || is_retryable_status(api_err.code)
            }
            Self::Update(_) => true,
            Self::Serialize(_) | Self::MissingMetadata { .. } => false,
        }
    }

    /// Short reason code used in structured logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Dns { .. } => "DnsUpsertFailed",
            Self::Serialize(_) => "StateSerializationFailed",
            Self::Update(_) => "ResourceUpdateFailed",
            Self::MissingMetadata { .. } => "MissingMetadata",
        }
    }
}

/// HTTP 429 and 5xx are worth retrying, everything else needs a change first.
fn is_retryable_status(status_code: u16) -> bool {
    status_code == 429 || (500..600).contains(&status_code)
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
