//! Opsgenie wire types

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paging cursors returned by list endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    /// URL of the next page; absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Standard Opsgenie response envelope
///
/// `data` carries the resource payload; action endpoints instead return
/// acknowledgement metadata (`result`, `requestId`, `took`), which the
/// flattened `extra` map preserves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub took: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Envelope {
    /// True when another page follows this one
    pub fn has_next_page(&self) -> bool {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .is_some()
    }
}

/// Outcome of an async alert request, polled by request ID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub is_success: bool,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub processed_at: String,
    #[serde(default)]
    pub integration_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Alert and incident priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    P5,
}

impl Priority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
            Self::P5 => "P5",
        }
    }
}

/// How an identifier path segment should be interpreted by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    /// Primary ID (the API default; sends no query hint)
    #[default]
    Id,
    /// Alias (alert dedup key)
    Alias,
    /// Resource name
    Name,
    /// Abbreviated "tiny" ID
    Tiny,
}

impl IdentifierType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Alias => "alias",
            Self::Name => "name",
            Self::Tiny => "tiny",
        }
    }
}

impl std::fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of entity notified about an alert or incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponderType {
    User,
    Team,
    Escalation,
    Schedule,
}

impl ResponderType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Team => "team",
            Self::Escalation => "escalation",
            Self::Schedule => "schedule",
        }
    }
}

/// Responder reference as supplied in input (any identifier may be set)
#[derive(Debug, Clone, Deserialize)]
pub struct ResponderInput {
    #[serde(rename = "type")]
    pub kind: ResponderType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Responder reference in wire form (at most one identifier set)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
    #[serde(rename = "type")]
    pub kind: ResponderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// One key/value entry of an alert details map
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Alert summary, as much of it as list rendering needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    pub id: String,
    pub tiny_id: String,
    pub alias: String,
    pub message: String,
    pub status: String,
    pub acknowledged: bool,
    pub snoozed: bool,
    pub count: u64,
    pub owner: String,
    pub priority: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// Incident summary for list rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Incident {
    pub id: String,
    pub tiny_id: String,
    pub message: String,
    pub status: String,
    pub priority: String,
    pub tags: Vec<String>,
    pub owner_team: String,
    pub created_at: String,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
}
