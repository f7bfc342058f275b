//! SQLite persistence backend
//!
//! Features:
//! - WAL mode for concurrent readers while the evaluator writes snapshots
//! - One JSON document per row, so the core's record types can evolve
//!   without schema churn
//! - Filters, ordering and limits run inside SQLite over `json_extract`,
//!   with expression indexes on the columns the core selects by
//! - Unmigrated tables surface as `TableMissing` (SQLite's "no such table")

use super::{tables, Filter, PersistenceAdapter, Row};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use std::path::Path;
use tokio_rusqlite::Connection as AsyncConnection;

/// Document fields indexed per table
fn indexed_fields(table: &str) -> &'static [&'static str] {
    match table {
        tables::FLOW_METRIC_SAMPLES => &["flow"],
        tables::CRON_EXECUTIONS => &["cron_name"],
        _ => &[],
    }
}

/// SQLite-backed [`PersistenceAdapter`]
pub struct SqliteBackend {
    conn: AsyncConnection,
}

impl SqliteBackend {
    /// Open (or create) a database file
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = AsyncConnection::open(path).await?;
        let backend = Self { conn };
        backend.configure().await?;
        Ok(backend)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = AsyncConnection::open_in_memory().await?;
        Ok(Self { conn })
    }

    async fn configure(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Create one core table
    pub async fn migrate(&self, table: &str) -> Result<()> {
        let table = checked_table(table)?;
        self.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        doc TEXT NOT NULL
                    );"
                ))?;
                for field in indexed_fields(table) {
                    conn.execute_batch(&format!(
                        "CREATE INDEX IF NOT EXISTS idx_{table}_{field}
                            ON {table} (json_extract(doc, '$.{field}'), id);"
                    ))?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Create every core table
    pub async fn migrate_all(&self) -> Result<()> {
        for table in tables::ALL {
            self.migrate(table).await?;
        }
        tracing::info!(tables = tables::ALL.len(), "sqlite schema migrated");
        Ok(())
    }
}

/// Only the core's own tables may be interpolated into SQL
fn checked_table(table: &str) -> Result<&'static str> {
    tables::ALL
        .iter()
        .copied()
        .find(|known| *known == table)
        .ok_or_else(|| Error::TableMissing(table.to_string()))
}

#[async_trait]
impl PersistenceAdapter for SqliteBackend {
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        let table = checked_table(table)?;
        let docs = rows
            .into_iter()
            .map(|row| serde_json::to_string(&row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(&format!("INSERT INTO {table} (doc) VALUES (?1)"))?;
                    for doc in &docs {
                        stmt.execute([doc])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn select(&self, table: &str, filter: &Filter, limit: usize) -> Result<Vec<Row>> {
        let table = checked_table(table)?;
        let (sql, params) = select_sql(table, filter, limit)?;
        let docs: Vec<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let docs = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                        row.get::<_, String>(0)
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(docs)
            })
            .await?;

        docs.iter()
            .map(|doc| serde_json::from_str::<Row>(doc).map_err(Error::from))
            .collect()
    }
}

/// Document field reference; only plain identifiers are accepted
fn field(column: &str) -> Result<String> {
    let plain = !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !plain {
        return Err(Error::InvalidInput(format!("unsupported filter column '{}'", column)));
    }
    Ok(format!("json_extract(doc, '$.{}')", column))
}

fn bind(value: &Value) -> Result<Option<SqlValue>> {
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => Some(SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => {
            return Err(Error::InvalidInput(
                "filters compare scalar values only".to_string(),
            ))
        }
    })
}

/// Translate a [`Filter`] into one statement. Timestamps are compared with
/// `julianday` so mixed RFC 3339 precisions order correctly.
fn select_sql(table: &str, filter: &Filter, limit: usize) -> Result<(String, Vec<SqlValue>)> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for (column, expected) in &filter.equals {
        let field = field(column)?;
        match bind(expected)? {
            Some(value) => {
                params.push(value);
                conditions.push(format!("{} = ?{}", field, params.len()));
            }
            None => conditions.push(format!("{} IS NULL", field)),
        }
    }

    if let Some((column, bound)) = &filter.since {
        params.push(SqlValue::Text(bound.to_rfc3339()));
        conditions.push(format!(
            "julianday({}) >= julianday(?{})",
            field(column)?,
            params.len()
        ));
    }

    let mut sql = format!("SELECT doc FROM {table}");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    match &filter.order_by {
        Some((column, descending)) => {
            let field = field(column)?;
            let direction = if *descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(
                " ORDER BY COALESCE(julianday({field}), {field}) {direction}, id {direction}"
            ));
        }
        None => sql.push_str(" ORDER BY id"),
    }

    params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    sql.push_str(&format!(" LIMIT ?{}", params.len()));

    Ok((sql, params))
}
