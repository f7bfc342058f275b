//! In-process persistence backend
//!
//! Tables must be migrated before use, mirroring a relational store where the
//! schema is applied out of band. Writes to an unmigrated table fail with
//! `TableMissing`, which is exactly what the core has to tolerate in
//! production before migrations land.

use super::{Filter, PersistenceAdapter, Row};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// DashMap-backed tables of JSON rows
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: DashMap<String, Vec<Row>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with every core table already migrated
    pub fn migrated() -> Self {
        let backend = Self::new();
        backend.migrate_all();
        backend
    }

    /// Create a table if it does not exist yet
    pub fn migrate(&self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn migrate_all(&self) {
        for table in super::tables::ALL {
            self.migrate(table);
        }
    }

    /// Drop a table and its rows
    pub fn drop_table(&self, table: &str) {
        self.tables.remove(table);
    }

    /// Simulate the store being unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Rows currently stored in a table (0 when missing)
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Acquire) {
            return Err(Error::Database("memory backend is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryBackend {
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        self.check_online()?;
        let mut stored = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::TableMissing(table.to_string()))?;
        stored.extend(rows);
        Ok(())
    }

    async fn select(&self, table: &str, filter: &Filter, limit: usize) -> Result<Vec<Row>> {
        self.check_online()?;
        let mut rows: Vec<Row> = {
            let stored = self
                .tables
                .get(table)
                .ok_or_else(|| Error::TableMissing(table.to_string()))?;
            stored.iter().filter(|row| filter.matches(row)).cloned().collect()
        };

        filter.sort(&mut rows);
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tables;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_unmigrated_table_reports_missing() {
        let backend = MemoryBackend::new();
        let err = backend
            .insert(tables::CRON_EXECUTIONS, vec![row(json!({"cron_name": "digest"}))])
            .await
            .unwrap_err();
        assert!(err.is_table_missing());

        let err = backend
            .select(tables::CRON_EXECUTIONS, &Filter::new(), 10)
            .await
            .unwrap_err();
        assert!(err.is_table_missing());
    }

    #[tokio::test]
    async fn test_insert_select_with_limit() {
        let backend = MemoryBackend::migrated();
        let rows = (0..5)
            .map(|i| row(json!({"cron_name": "digest", "seq": i})))
            .collect();
        backend.insert(tables::CRON_EXECUTIONS, rows).await.unwrap();

        let filter = Filter::new().eq("cron_name", "digest");
        let selected = backend
            .select(tables::CRON_EXECUTIONS, &filter, 3)
            .await
            .unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(backend.row_count(tables::CRON_EXECUTIONS), 5);
    }

    #[tokio::test]
    async fn test_offline_backend_errors() {
        let backend = MemoryBackend::migrated();
        backend.set_offline(true);
        let err = backend
            .select(tables::ADMIN_AUDIT_LOGS, &Filter::new(), 1)
            .await
            .unwrap_err();
        assert!(!err.is_table_missing());
    }
}
