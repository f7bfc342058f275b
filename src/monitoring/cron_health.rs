//! Scheduled job health
//!
//! Every run of a scheduled job is appended to `cron_executions`. A job is
//! unhealthy when its newest `failure_threshold` runs all failed; that raises
//! a critical alert keyed `cron-health:<name>`. A run that timed out counts as
//! a failed run. When the table is not migrated, recording and checking
//! quietly degrade (no rows, job reported healthy).

use super::alerting::{cron_health_key, Alert, AlertDispatcher};
use super::types::Severity;
use crate::database::{from_row, tables, to_row, Filter};
use crate::resilience::GuardedStore;
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CronStatus {
    Success,
    Failure,
    Timeout,
}

impl CronStatus {
    pub fn is_failing(&self) -> bool {
        matches!(self, CronStatus::Failure | CronStatus::Timeout)
    }
}

/// One run of a scheduled job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronExecutionRecord {
    pub cron_name: String,
    pub status: CronStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronHealth {
    pub cron_name: String,
    pub healthy: bool,
    pub consecutive_failures: usize,
    pub alert_fired: bool,
}

/// Leading failing runs in a newest-first history
pub fn consecutive_failures(history: &[CronExecutionRecord]) -> usize {
    history
        .iter()
        .take_while(|run| run.status.is_failing())
        .count()
}

pub struct CronHealthTracker {
    store: GuardedStore,
    dispatcher: Arc<AlertDispatcher>,
    clock: SharedClock,
    failure_threshold: usize,
}

impl CronHealthTracker {
    pub fn new(
        store: GuardedStore,
        dispatcher: Arc<AlertDispatcher>,
        clock: SharedClock,
        failure_threshold: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Persist a run. Returns whether it was stored.
    pub async fn record_cron_execution(&self, record: CronExecutionRecord) -> bool {
        debug!(cron = %record.cron_name, status = ?record.status, duration_ms = record.duration_ms, "recording cron execution");
        match to_row(&record) {
            Ok(row) => self.store.write(tables::CRON_EXECUTIONS, vec![row]).await,
            Err(e) => {
                warn!(cron = %record.cron_name, error = %e, "failed to encode cron execution");
                false
            }
        }
    }

    /// Check with the configured threshold
    pub async fn check_cron_health(&self, cron_name: &str) -> CronHealth {
        self.check_cron_health_with(cron_name, self.failure_threshold).await
    }

    pub async fn check_cron_health_with(&self, cron_name: &str, failure_threshold: usize) -> CronHealth {
        let threshold = failure_threshold.max(1);
        let filter = Filter::new()
            .eq("cron_name", cron_name)
            .newest_first("started_at");

        let history: Vec<CronExecutionRecord> = self
            .store
            .read(tables::CRON_EXECUTIONS, &filter, threshold)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| from_row(row).ok())
            .collect();

        let failures = consecutive_failures(&history);
        let healthy = failures < threshold;
        let mut alert_fired = false;

        if !healthy {
            let latest_error = history
                .first()
                .and_then(|run| run.error_message.clone())
                .unwrap_or_else(|| "no error message recorded".to_string());
            let alert = Alert::new(
                format!("Scheduled job {} is failing", cron_name),
                Severity::Critical,
                format!("{} consecutive failed runs; latest: {}", failures, latest_error),
                cron_health_key(cron_name),
                self.clock.now(),
            )
            .with_details(json!({
                "cronName": cron_name,
                "consecutiveFailures": failures,
                "threshold": threshold,
            }));
            alert_fired = self.dispatcher.dispatch(alert).await;
        }

        CronHealth {
            cron_name: cron_name.to_string(),
            healthy,
            consecutive_failures: failures,
            alert_fired,
        }
    }

    /// Run a job body and record its outcome. A failure is recorded, the job's
    /// health is re-checked and the original error is returned unchanged.
    pub async fn with_cron_tracking<F, Fut, T, E>(&self, cron_name: &str, handler: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        let started_at = self.clock.now();
        let timer = Instant::now();
        let outcome = handler().await;
        let duration_ms = timer.elapsed().as_millis() as u64;
        let completed_at = self.clock.now();

        match &outcome {
            Ok(value) => {
                let result = serde_json::to_value(value).unwrap_or(Value::Null);
                info!(cron = cron_name, duration_ms, "cron job succeeded");
                self.record_cron_execution(CronExecutionRecord {
                    cron_name: cron_name.to_string(),
                    status: CronStatus::Success,
                    duration_ms,
                    result,
                    error_message: None,
                    started_at,
                    completed_at,
                })
                .await;
            }
            Err(e) => {
                error!(cron = cron_name, duration_ms, error = %e, "cron job failed");
                self.record_cron_execution(CronExecutionRecord {
                    cron_name: cron_name.to_string(),
                    status: CronStatus::Failure,
                    duration_ms,
                    result: Value::Null,
                    error_message: Some(e.to_string()),
                    started_at,
                    completed_at,
                })
                .await;
                self.check_cron_health(cron_name).await;
            }
        }

        outcome
    }
}
