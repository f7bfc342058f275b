//! Persistence calls behind the table probe and the best-effort sink
//!
//! Every write or read first consults the [`TableProbe`]; an unavailable
//! table turns the call into a no-op. A `TableMissing` error from the
//! adapter trips the probe for that table so the next calls skip it too.

use super::{BestEffortSink, TableProbe};
use crate::database::{Filter, PersistenceAdapter, Row};
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct GuardedStore {
    adapter: Arc<dyn PersistenceAdapter>,
    probe: Arc<TableProbe>,
    sink: BestEffortSink,
}

impl GuardedStore {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, probe: Arc<TableProbe>, sink: BestEffortSink) -> Self {
        Self {
            adapter,
            probe,
            sink,
        }
    }

    pub fn probe(&self) -> &TableProbe {
        &self.probe
    }

    pub fn sink(&self) -> &BestEffortSink {
        &self.sink
    }

    /// Insert rows if the table is available. Returns whether they were stored.
    pub async fn write(&self, table: &str, rows: Vec<Row>) -> bool {
        if rows.is_empty() {
            return true;
        }
        if !self.probe.is_available(table).await {
            debug!(table, rows = rows.len(), "table unavailable, skipping write");
            return false;
        }

        let insert = async {
            let result = self.adapter.insert(table, rows).await;
            self.trip_on_missing(table, result)
        };
        self.sink.run(&format!("insert:{}", table), insert).await.is_some()
    }

    /// Select rows; `None` when the table is unavailable or the read failed
    pub async fn read(&self, table: &str, filter: &Filter, limit: usize) -> Option<Vec<Row>> {
        if !self.probe.is_available(table).await {
            debug!(table, "table unavailable, skipping read");
            return None;
        }

        let select = async {
            let result = self.adapter.select(table, filter, limit).await;
            self.trip_on_missing(table, result)
        };
        self.sink.run(&format!("select:{}", table), select).await
    }

    fn trip_on_missing<T>(&self, table: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_table_missing() {
                self.probe.mark_unavailable(table);
            }
        }
        result
    }
}
