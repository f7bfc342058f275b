//! Alert payloads passed from evaluators to the dispatcher and channels

use crate::monitoring::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An alert candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub details: Value,
    pub triggered_at: DateTime<Utc>,
    /// Cooldowns are tracked per key: a fingerprint, `burn-rate:<flow>:<window>`
    /// or `cron-health:<name>`
    pub deduplication_key: String,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        severity: Severity,
        summary: impl Into<String>,
        deduplication_key: impl Into<String>,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            severity,
            summary: summary.into(),
            details: Value::Null,
            triggered_at,
            deduplication_key: deduplication_key.into(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Dedup key for a flow/window burn-rate alert
pub fn burn_rate_key(flow: &str, window: &str) -> String {
    format!("burn-rate:{}:{}", flow, window)
}

/// Dedup key for a scheduled job health alert
pub fn cron_health_key(cron_name: &str) -> String {
    format!("cron-health:{}", cron_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keys() {
        assert_eq!(burn_rate_key("login", "1h"), "burn-rate:login:1h");
        assert_eq!(cron_health_key("weekly_digest"), "cron-health:weekly_digest");
    }

    #[test]
    fn test_alert_serializes_camel_case() {
        let alert = Alert::new("t", Severity::Error, "s", "fp_1", Utc::now());
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["deduplicationKey"], "fp_1");
        assert_eq!(value["severity"], "error");
    }
}
