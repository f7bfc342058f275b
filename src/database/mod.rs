//! Persistence adapter for the monitoring core
//!
//! The core never owns a schema. It talks to whatever relational store the
//! host application provides through [`PersistenceAdapter`], which deals in
//! JSON rows keyed by table name. A table that has not been migrated yet is
//! reported as [`Error::TableMissing`](crate::error::Error::TableMissing) so
//! callers can degrade instead of failing.
//!
//! Backends:
//! - [`MemoryBackend`] for tests and single-process deployments
//! - `SqliteBackend` (feature `sqlite`) for a durable local store

pub mod memory_backend;
#[cfg(feature = "sqlite")]
pub mod sqlite_backend;

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

pub use memory_backend::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite_backend::SqliteBackend;

/// Table names used by the core
pub mod tables {
    pub const FLOW_METRIC_SAMPLES: &str = "flow_metric_samples";
    pub const CRON_EXECUTIONS: &str = "cron_executions";
    pub const BURN_RATE_SNAPSHOTS: &str = "slo_burn_rate_snapshots";
    pub const ADMIN_AUDIT_LOGS: &str = "admin_audit_logs";

    pub const ALL: [&str; 4] = [
        FLOW_METRIC_SAMPLES,
        CRON_EXECUTIONS,
        BURN_RATE_SNAPSHOTS,
        ADMIN_AUDIT_LOGS,
    ];
}

/// A stored row
pub type Row = serde_json::Map<String, Value>;

/// Row selection: equality conditions, an optional lower time bound and ordering
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub equals: Vec<(String, Value)>,
    /// Rows whose RFC 3339 timestamp column is at or after the bound
    pub since: Option<(String, DateTime<Utc>)>,
    /// Sort column; descending when the flag is set
    pub order_by: Option<(String, bool)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.equals.push((column.to_string(), value.into()));
        self
    }

    pub fn since(mut self, column: &str, at: DateTime<Utc>) -> Self {
        self.since = Some((column.to_string(), at));
        self
    }

    pub fn newest_first(mut self, column: &str) -> Self {
        self.order_by = Some((column.to_string(), true));
        self
    }

    /// Evaluate the filter against a row
    pub fn matches(&self, row: &Row) -> bool {
        let equal = self
            .equals
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected));
        if !equal {
            return false;
        }

        match &self.since {
            Some((column, bound)) => row
                .get(column)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| ts.with_timezone(&Utc) >= *bound)
                .unwrap_or(false),
            None => true,
        }
    }

    /// Sort rows in place according to `order_by`. Rows arrive in insertion
    /// order; ties keep it ascending and reverse it descending.
    pub fn sort(&self, rows: &mut [Row]) {
        if let Some((column, descending)) = &self.order_by {
            if *descending {
                rows.reverse();
            }
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Storage collaborator used for audit logs, snapshots, cron runs and flow metrics
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()>;

    async fn select(&self, table: &str, filter: &Filter, limit: usize) -> Result<Vec<Row>>;
}

/// Serialize a record into a row
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "expected an object row, got {}",
            other
        ))),
    }
}

/// Deserialize a row into a record
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
