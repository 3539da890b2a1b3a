// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname validation for the hostnames annotation.
//!
//! A hostname is accepted when it has at least a subdomain within a zone
//! (two or more dot-separated labels) and every label is non-empty and fits
//! the 63 character DNS limit. Invalid hostnames are skipped by the reconciler, they never
//! fail the whole resource.

use crate::constants::{MAX_LABEL_LENGTH, MIN_HOSTNAME_LABELS};
use thiserror::Error;

/// Why a hostname was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostnameError {
    #[error("hostname '{hostname}' has {labels} label(s), at least 2 required")]
    TooFewLabels { hostname: String, labels: usize },

    #[error("label '{label}' in hostname '{hostname}' exceeds 63 characters")]
    LabelTooLong { hostname: String, label: String },

    #[error("hostname '{hostname}' has an empty label")]
    EmptyLabel { hostname: String },
}

/// Validate a single hostname from the hostnames annotation.
///
/// # Errors
///
/// Returns [`HostnameError`] when the hostname has fewer than two labels, an
/// empty label or a label longer than 63 characters. A single trailing dot is
/// allowed.
pub fn validate_hostname(hostname: &str) -> Result<(), HostnameError> {
    let labels: Vec<&str> = hostname
        .strip_suffix('.')
        .unwrap_or(hostname)
        .split('.')
        .collect();

    if labels.len() < MIN_HOSTNAME_LABELS {
        return Err(HostnameError::TooFewLabels {
            hostname: hostname.to_string(),
            labels: labels.len(),
        });
    }

    if labels.iter().any(|label| label.is_empty()) {
        return Err(HostnameError::EmptyLabel {
            hostname: hostname.to_string(),
        });
    }

    if let Some(label) = labels.iter().find(|label| label.len() > MAX_LABEL_LENGTH) {
        return Err(HostnameError::LabelTooLong {
            hostname: hostname.to_string(),
            label: (*label).to_string(),
        });
    }

    Ok(())
}

/// Split the hostnames annotation value into its entries, in order.
///
/// Surrounding whitespace is trimmed from each entry; empty entries are kept
/// so the reconciler can report them as invalid.
pub fn split_hostnames(hostnames: &str) -> impl Iterator<Item = &str> {
    hostnames.split(',').map(str::trim)
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
