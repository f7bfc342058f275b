//! Flow timing samples
//!
//! Business flows (login, loading the today view, task mutations) report one
//! sample per completion. Samples are rate-limited per flow and user, then
//! written best-effort to `flow_metric_samples`, which the burn-rate
//! evaluator reads back.

use super::ingress::IngressGuard;
use super::types::Context;
use crate::database::{from_row, tables, to_row, Filter};
use crate::resilience::GuardedStore;
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_FLOW_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Success,
    Failure,
}

/// A sample as reported by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetricInput {
    pub flow: String,
    pub status: FlowStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub context: Option<Context>,
}

impl FlowMetricInput {
    pub fn new(flow: impl Into<String>, status: FlowStatus, duration_ms: u64) -> Self {
        Self {
            flow: flow.into(),
            status,
            duration_ms,
            user_id: None,
            route: None,
            request_id: None,
            error_code: None,
            context: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A stored sample; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetricSample {
    pub flow: String,
    pub status: FlowStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub context: Context,
    pub timestamp: DateTime<Utc>,
}

impl FlowMetricSample {
    pub fn is_success(&self) -> bool {
        self.status == FlowStatus::Success
    }
}

pub struct FlowMetricsRecorder {
    store: GuardedStore,
    ingress: Arc<IngressGuard>,
    clock: SharedClock,
    max_context_bytes: usize,
}

impl FlowMetricsRecorder {
    pub fn new(
        store: GuardedStore,
        ingress: Arc<IngressGuard>,
        clock: SharedClock,
        max_context_bytes: usize,
    ) -> Self {
        Self {
            store,
            ingress,
            clock,
            max_context_bytes,
        }
    }

    /// Record a sample. Returns whether it was accepted and stored.
    pub async fn record_flow_metric(&self, input: FlowMetricInput) -> bool {
        let flow = input.flow.trim();
        if flow.is_empty() || flow.len() > MAX_FLOW_NAME_LEN {
            debug!(flow = %input.flow, "rejecting flow metric with invalid flow name");
            return false;
        }

        let key = format!(
            "flow-metric:{}:{}",
            flow,
            input.user_id.as_deref().unwrap_or("anon")
        );
        if !self.ingress.is_allowed(&key) {
            return false;
        }

        let context = input
            .context
            .filter(|c| context_size(c) <= self.max_context_bytes)
            .unwrap_or_default();

        let sample = FlowMetricSample {
            flow: flow.to_string(),
            status: input.status,
            duration_ms: input.duration_ms,
            user_id: input.user_id,
            route: input.route,
            request_id: input.request_id,
            error_code: input.error_code,
            context,
            timestamp: self.clock.now(),
        };

        match to_row(&sample) {
            Ok(row) => self.store.write(tables::FLOW_METRIC_SAMPLES, vec![row]).await,
            Err(e) => {
                warn!(error = %e, "failed to encode flow metric sample");
                false
            }
        }
    }
}

fn context_size(context: &Context) -> usize {
    serde_json::to_string(context).map(|s| s.len()).unwrap_or(usize::MAX)
}

/// Newest samples for one flow at or after `since`, at most `limit` of them;
/// `None` when the table is unavailable
pub async fn load_samples(
    store: &GuardedStore,
    flow: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Option<Vec<FlowMetricSample>> {
    let filter = Filter::new()
        .eq("flow", flow)
        .since("timestamp", since)
        .newest_first("timestamp");
    let rows = store.read(tables::FLOW_METRIC_SAMPLES, &filter, limit).await?;

    let mut samples = Vec::with_capacity(rows.len());
    for row in rows {
        match from_row::<FlowMetricSample>(row) {
            Ok(sample) => samples.push(sample),
            Err(e) => debug!(flow, error = %e, "skipping malformed flow sample"),
        }
    }
    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngressConfig;
    use crate::database::MemoryBackend;
    use crate::resilience::{BestEffortSink, TableProbe};
    use crate::utils::{Clock, ManualClock};
    use serde_json::json;
    use std::time::Duration;

    fn recorder(backend: Arc<MemoryBackend>, max_requests: u32) -> (FlowMetricsRecorder, GuardedStore, Arc<ManualClock>) {
        let clock = ManualClock::starting_now();
        let probe = Arc::new(TableProbe::new(
            backend.clone(),
            clock.clone(),
            Duration::from_secs(30),
            Duration::from_secs(1),
        ));
        let store = GuardedStore::new(backend, probe, BestEffortSink::new(Duration::from_secs(1)));
        let ingress = Arc::new(IngressGuard::new(
            &IngressConfig {
                max_requests,
                ..Default::default()
            },
            clock.clone(),
        ));
        (
            FlowMetricsRecorder::new(store.clone(), ingress, clock.clone(), 64),
            store,
            clock,
        )
    }

    #[tokio::test]
    async fn test_record_and_load_samples() {
        let backend = Arc::new(MemoryBackend::migrated());
        let (recorder, store, clock) = recorder(backend, 100);

        assert!(recorder.record_flow_metric(FlowMetricInput::new("login", FlowStatus::Success, 120)).await);
        assert!(recorder.record_flow_metric(FlowMetricInput::new("login", FlowStatus::Failure, 900)).await);
        assert!(recorder.record_flow_metric(FlowMetricInput::new("today_load", FlowStatus::Success, 80)).await);

        let since = clock.now() - chrono::Duration::hours(1);
        let samples = load_samples(&store, "login", since, 100).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples.iter().filter(|s| s.is_success()).count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_blank_flow_and_rate_limits() {
        let backend = Arc::new(MemoryBackend::migrated());
        let (recorder, _, _) = recorder(backend, 2);

        assert!(!recorder.record_flow_metric(FlowMetricInput::new("  ", FlowStatus::Success, 1)).await);

        let input = FlowMetricInput::new("login", FlowStatus::Success, 10).for_user("u-1");
        assert!(recorder.record_flow_metric(input.clone()).await);
        assert!(recorder.record_flow_metric(input.clone()).await);
        assert!(!recorder.record_flow_metric(input).await);
        // Another user has its own budget
        assert!(recorder.record_flow_metric(FlowMetricInput::new("login", FlowStatus::Success, 10).for_user("u-2")).await);
    }

    #[tokio::test]
    async fn test_oversized_context_is_dropped() {
        let backend = Arc::new(MemoryBackend::migrated());
        let (recorder, store, clock) = recorder(backend, 100);

        let mut input = FlowMetricInput::new("login", FlowStatus::Success, 10);
        input.context = json!({"blob": "x".repeat(500)}).as_object().cloned();
        assert!(recorder.record_flow_metric(input).await);

        let samples = load_samples(&store, "login", clock.now() - chrono::Duration::minutes(1), 10)
            .await
            .unwrap();
        assert!(samples[0].context.is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_degrades_to_false() {
        let backend = Arc::new(MemoryBackend::new());
        let (recorder, store, clock) = recorder(backend, 100);
        assert!(!recorder.record_flow_metric(FlowMetricInput::new("login", FlowStatus::Success, 10)).await);
        assert!(load_samples(&store, "login", clock.now(), 10).await.is_none());
    }
}
