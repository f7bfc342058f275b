//! SLO burn-rate evaluation
//!
//! For every tracked flow and rolling window:
//!
//! ```text
//! availability = successes / total * 100        (100 when total == 0)
//! burn_rate    = (100 - availability) / (100 - target)
//! remaining    = clamp((1 - burn_rate) * 100, 0, 100)
//! ```
//!
//! A burn rate of 1.0 consumes the error budget exactly as fast as the
//! objective allows. Each window carries its own warning and critical
//! thresholds; short windows need a much faster burn to alert. Windows with
//! fewer than `min_samples` samples carry no signal and never alert.

use super::alerting::{burn_rate_key, Alert, AlertDispatcher};
use super::flow_metrics::{load_samples, FlowMetricSample};
use super::types::Severity;
use crate::config::{BurnRateWindow, SloConfig};
use crate::database::{tables, to_row};
use crate::resilience::GuardedStore;
use crate::utils::SharedClock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One flow over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRateEvaluation {
    pub flow: String,
    pub window_label: String,
    pub window_hours: u32,
    pub target_pct: f64,
    pub burn_rate: f64,
    pub availability_pct: f64,
    pub p95_ms: Option<u64>,
    pub total_samples: usize,
    pub failed_samples: usize,
    pub budget_remaining_pct: f64,
    /// `None` when the window is within budget or has no signal
    pub severity: Option<Severity>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRateReport {
    pub evaluations: Vec<BurnRateEvaluation>,
    pub alerts_fired: usize,
    pub alerts_suppressed: usize,
    pub snapshots_persisted: bool,
}

/// Nearest-rank 95th percentile
pub fn p95(durations: &mut [u64]) -> Option<u64> {
    if durations.is_empty() {
        return None;
    }
    durations.sort_unstable();
    let rank = ((durations.len() as f64) * 0.95).ceil() as usize;
    durations.get(rank.clamp(1, durations.len()) - 1).copied()
}

/// Compute the evaluation for one flow and window from its samples
pub fn evaluate_window(
    flow: &str,
    window: &BurnRateWindow,
    target_pct: f64,
    min_samples: usize,
    samples: &[&FlowMetricSample],
    now: DateTime<Utc>,
) -> BurnRateEvaluation {
    let total = samples.len();
    let mut success_durations: Vec<u64> = samples
        .iter()
        .filter(|s| s.is_success())
        .map(|s| s.duration_ms)
        .collect();
    let successes = success_durations.len();

    let availability_pct = if total == 0 {
        100.0
    } else {
        successes as f64 / total as f64 * 100.0
    };

    let allowed_error_pct = (100.0 - target_pct).max(f64::EPSILON);
    let burn_rate = ((100.0 - availability_pct) / allowed_error_pct).max(0.0);
    let budget_remaining_pct = ((1.0 - burn_rate) * 100.0).clamp(0.0, 100.0);

    let severity = if total == 0 || total < min_samples {
        None
    } else if burn_rate >= window.critical_burn_rate {
        Some(Severity::Critical)
    } else if burn_rate >= window.warning_burn_rate {
        Some(Severity::Warning)
    } else {
        None
    };

    BurnRateEvaluation {
        flow: flow.to_string(),
        window_label: window.label.clone(),
        window_hours: window.hours,
        target_pct,
        burn_rate,
        availability_pct,
        p95_ms: p95(&mut success_durations),
        total_samples: total,
        failed_samples: total - successes,
        budget_remaining_pct,
        severity,
        evaluated_at: now,
    }
}

pub struct BurnRateEvaluator {
    config: SloConfig,
    store: GuardedStore,
    dispatcher: Arc<AlertDispatcher>,
    clock: SharedClock,
}

impl BurnRateEvaluator {
    pub fn new(
        config: SloConfig,
        store: GuardedStore,
        dispatcher: Arc<AlertDispatcher>,
        clock: SharedClock,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            clock,
        }
    }

    /// Evaluate every tracked flow over every window and alert on breaches
    pub async fn evaluate_burn_rates(&self) -> BurnRateReport {
        let now = self.clock.now();
        let mut report = BurnRateReport::default();

        for flow in &self.config.flows {
            let target = self.config.target_for(&flow.name);
            for window in &self.config.windows {
                let window_start = now - Duration::hours(i64::from(window.hours));
                // An unavailable sample table means no signal, not a breach
                let samples = load_samples(
                    &self.store,
                    &flow.name,
                    window_start,
                    self.config.max_samples_per_window,
                )
                .await
                .unwrap_or_default();
                let in_window: Vec<&FlowMetricSample> =
                    samples.iter().filter(|s| s.timestamp >= window_start).collect();

                let evaluation = evaluate_window(
                    &flow.name,
                    window,
                    target,
                    self.config.min_samples,
                    &in_window,
                    now,
                );

                if let Some(severity) = evaluation.severity {
                    if self.dispatcher.dispatch(self.alert_for(&evaluation, severity)).await {
                        report.alerts_fired += 1;
                    } else {
                        report.alerts_suppressed += 1;
                    }
                } else {
                    debug!(
                        flow = %evaluation.flow,
                        window = %evaluation.window_label,
                        burn_rate = evaluation.burn_rate,
                        samples = evaluation.total_samples,
                        "burn rate within budget"
                    );
                }

                report.evaluations.push(evaluation);
            }
        }

        if self.config.persist_snapshots {
            report.snapshots_persisted = self.persist(&report.evaluations).await;
        }

        info!(
            evaluations = report.evaluations.len(),
            fired = report.alerts_fired,
            suppressed = report.alerts_suppressed,
            "burn-rate evaluation complete"
        );
        report
    }

    fn alert_for(&self, evaluation: &BurnRateEvaluation, severity: Severity) -> Alert {
        Alert::new(
            format!(
                "SLO burn rate {} for {} ({})",
                severity, evaluation.flow, evaluation.window_label
            ),
            severity,
            format!(
                "burn rate {:.2}x, availability {:.2}% against a {:.2}% target, {:.0}% budget left",
                evaluation.burn_rate,
                evaluation.availability_pct,
                evaluation.target_pct,
                evaluation.budget_remaining_pct
            ),
            burn_rate_key(&evaluation.flow, &evaluation.window_label),
            evaluation.evaluated_at,
        )
        .with_details(json!({
            "flow": evaluation.flow,
            "window": evaluation.window_label,
            "totalSamples": evaluation.total_samples,
            "failedSamples": evaluation.failed_samples,
            "p95Ms": evaluation.p95_ms,
        }))
    }

    async fn persist(&self, evaluations: &[BurnRateEvaluation]) -> bool {
        let rows = match evaluations.iter().map(to_row).collect::<crate::error::Result<Vec<_>>>() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "failed to encode burn-rate snapshots");
                return false;
            }
        };
        self.store.write(tables::BURN_RATE_SNAPSHOTS, rows).await
    }

    /// Re-evaluate on the configured interval until the task is aborted
    pub fn spawn_periodic(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.evaluation_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.evaluate_burn_rates().await;
            }
        })
    }
}
