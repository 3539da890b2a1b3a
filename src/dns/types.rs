// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud DNS v1 wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record set in a managed zone.
///
/// Fields this controller does not model (`routingPolicy`, `signatureRrdatas`,
/// ...) are kept in `extra` so a listed record set can be sent back as a
/// deletion exactly as Cloud DNS returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecordSet {
    /// Fully qualified name, with trailing dot
    pub name: String,

    /// Record type, e.g. `A`
    #[serde(rename = "type")]
    pub record_type: String,

    /// Time to live in seconds
    #[serde(default)]
    pub ttl: i32,

    /// Record data, one entry per value
    #[serde(default)]
    pub rrdatas: Vec<String>,

    /// Resource kind marker, `dns#resourceRecordSet` on listed sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResourceRecordSet {
    /// A plain record set with no routing policy or signatures.
    #[must_use]
    pub fn new(name: String, record_type: String, ttl: i32, rrdatas: Vec<String>) -> Self {
        Self {
            name,
            record_type,
            ttl,
            rrdatas,
            ..Self::default()
        }
    }

    /// Equal in everything Cloud DNS serves, ignoring the `kind` marker.
    #[must_use]
    pub fn same_records(&self, other: &ResourceRecordSet) -> bool {
        self.name == other.name
            && self.record_type == other.record_type
            && self.ttl == other.ttl
            && self.rrdatas == other.rrdatas
            && self.extra == other.extra
    }
}

/// A single atomic change request: deletions are applied together with additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<ResourceRecordSet>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<ResourceRecordSet>,
}

/// Response of `GET .../rrsets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSetsListResponse {
    #[serde(default)]
    pub rrsets: Vec<ResourceRecordSet>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`; only the message is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Extract the human readable message from a Google error body, falling back
/// to the raw body.
#[must_use]
pub fn google_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorResponse>(body)
        .map(|resp| resp.error.message)
        .unwrap_or_else(|_| body.to_string())
}
