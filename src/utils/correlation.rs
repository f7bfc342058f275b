//! Request correlation identifiers
//!
//! Each inbound request gets a [`CorrelationId`] (taken from `x-request-id`
//! when the upstream proxy already assigned one) that is attached to the
//! request span so capture, incident and alert log lines can be joined.

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Unique correlation identifier for request tracing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse an upstream id, falling back to a fresh one when it is blank
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id) if !id.is_empty() && id.len() <= 128 => Self(id.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Span extension for recording correlation ids
pub trait CorrelationSpanExt {
    fn with_correlation(self, id: &CorrelationId) -> Self;
}

impl CorrelationSpanExt for Span {
    fn with_correlation(self, id: &CorrelationId) -> Self {
        self.record("request_id", id.as_str());
        self
    }
}
