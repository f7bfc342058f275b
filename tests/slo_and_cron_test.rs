//! Burn-rate evaluation and cron health over the in-memory backend

mod common;

use chrono::Duration;
use common::{harness, harness_with, test_config};
use std::sync::Arc;
use studyhub_sentinel::MemoryBackend;
use studyhub_sentinel::monitoring::{
    CronExecutionRecord, CronStatus, FlowMetricInput, FlowStatus,
};
use studyhub_sentinel::utils::Clock;
use studyhub_sentinel::Severity;

#[tokio::test]
async fn test_no_samples_means_no_alerts() {
    let h = harness();
    let report = h.core.burn_rates.evaluate_burn_rates().await;

    // four default flows times three windows
    assert_eq!(report.evaluations.len(), 12);
    for evaluation in &report.evaluations {
        assert_eq!(evaluation.total_samples, 0);
        assert_eq!(evaluation.burn_rate, 0.0);
        assert_eq!(evaluation.availability_pct, 100.0);
        assert!(evaluation.severity.is_none());
        assert!(evaluation.p95_ms.is_none());
    }
    assert_eq!(report.alerts_fired, 0);
    assert_eq!(h.channel.count(), 0);
    assert!(report.snapshots_persisted);
}

#[tokio::test]
async fn test_failing_flow_alerts_once_per_window() {
    let h = harness();
    for i in 0..10u64 {
        let status = if i % 2 == 0 { FlowStatus::Success } else { FlowStatus::Failure };
        let accepted = h
            .core
            .flow_metrics
            .record_flow_metric(FlowMetricInput::new("login", status, 100 + i * 10).for_user(format!("u-{}", i)))
            .await;
        assert!(accepted);
    }

    let report = h.core.burn_rates.evaluate_burn_rates().await;
    let login: Vec<_> = report.evaluations.iter().filter(|e| e.flow == "login").collect();
    assert_eq!(login.len(), 3);
    for evaluation in &login {
        assert_eq!(evaluation.total_samples, 10);
        assert_eq!(evaluation.failed_samples, 5);
        assert_eq!(evaluation.severity, Some(Severity::Critical));
        assert_eq!(evaluation.budget_remaining_pct, 0.0);
        assert!(evaluation.p95_ms.is_some());
    }
    assert_eq!(report.alerts_fired, 3);

    let again = h.core.burn_rates.evaluate_burn_rates().await;
    assert_eq!(again.alerts_fired, 0);
    assert_eq!(again.alerts_suppressed, 3);
    assert_eq!(h.channel.count(), 3);
}

#[tokio::test]
async fn test_samples_age_out_of_short_windows() {
    let h = harness();
    for i in 0..6 {
        h.core
            .flow_metrics
            .record_flow_metric(FlowMetricInput::new("today_load", FlowStatus::Failure, 900).for_user(format!("u-{}", i)))
            .await;
    }

    h.clock.advance(Duration::hours(2));
    let report = h.core.burn_rates.evaluate_burn_rates().await;
    let by_window = |label: &str| {
        report
            .evaluations
            .iter()
            .find(|e| e.flow == "today_load" && e.window_label == label)
            .cloned()
            .unwrap()
    };

    assert_eq!(by_window("1h").total_samples, 0);
    assert!(by_window("1h").severity.is_none());
    assert_eq!(by_window("6h").total_samples, 6);
    assert_eq!(by_window("6h").severity, Some(Severity::Critical));
}

#[tokio::test]
async fn test_outage_visible_when_history_exceeds_sample_cap() {
    let mut config = test_config();
    config.slo.max_samples_per_window = 20;
    let h = harness_with(config, Arc::new(MemoryBackend::migrated()));

    let record = |status: FlowStatus, i: usize| {
        FlowMetricInput::new("login", status, 150).for_user(format!("u-{:?}-{}", status, i))
    };
    for i in 0..20 {
        assert!(h.core.flow_metrics.record_flow_metric(record(FlowStatus::Success, i)).await);
    }
    h.clock.advance(Duration::hours(10));
    for i in 0..20 {
        assert!(h.core.flow_metrics.record_flow_metric(record(FlowStatus::Failure, i)).await);
    }

    let report = h.core.burn_rates.evaluate_burn_rates().await;
    for label in ["1h", "6h", "24h"] {
        let evaluation = report
            .evaluations
            .iter()
            .find(|e| e.flow == "login" && e.window_label == label)
            .unwrap();
        assert_eq!(evaluation.total_samples, 20, "window {}", label);
        assert_eq!(evaluation.failed_samples, 20, "window {}", label);
        assert_eq!(evaluation.severity, Some(Severity::Critical), "window {}", label);
    }
    assert_eq!(report.alerts_fired, 3);
}

fn run(name: &str, status: CronStatus, at: chrono::DateTime<chrono::Utc>) -> CronExecutionRecord {
    CronExecutionRecord {
        cron_name: name.to_string(),
        status,
        duration_ms: 250,
        result: serde_json::Value::Null,
        error_message: status.is_failing().then(|| "upstream 502".to_string()),
        started_at: at,
        completed_at: at,
    }
}

#[tokio::test]
async fn test_cron_threshold_and_recovery() {
    let h = harness();
    let cron = &h.core.cron;

    for _ in 0..2 {
        h.clock.advance(Duration::minutes(5));
        assert!(cron.record_cron_execution(run("nightly-digest", CronStatus::Failure, h.clock.now())).await);
    }
    let health = cron.check_cron_health_with("nightly-digest", 3).await;
    assert!(health.healthy);
    assert_eq!(health.consecutive_failures, 2);

    h.clock.advance(Duration::minutes(5));
    cron.record_cron_execution(run("nightly-digest", CronStatus::Timeout, h.clock.now())).await;
    let health = cron.check_cron_health_with("nightly-digest", 3).await;
    assert!(!health.healthy);
    assert_eq!(health.consecutive_failures, 3);
    assert!(health.alert_fired);
    assert_eq!(h.channel.keys(), vec!["cron-health:nightly-digest".to_string()]);

    h.clock.advance(Duration::minutes(5));
    cron.record_cron_execution(run("nightly-digest", CronStatus::Success, h.clock.now())).await;
    let health = cron.check_cron_health_with("nightly-digest", 3).await;
    assert!(health.healthy);
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test]
async fn test_cron_runs_sharing_a_timestamp_use_the_latest() {
    let h = harness();
    let cron = &h.core.cron;
    let at = h.clock.now();

    for _ in 0..3 {
        cron.record_cron_execution(run("weekly-report", CronStatus::Failure, at)).await;
    }
    cron.record_cron_execution(run("weekly-report", CronStatus::Success, at)).await;

    let health = cron.check_cron_health_with("weekly-report", 3).await;
    assert!(health.healthy);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(h.channel.count(), 0);
}

#[tokio::test]
async fn test_cron_tracking_records_and_reraises() {
    let h = harness();
    let cron = &h.core.cron;

    let ok: Result<u32, String> = cron.with_cron_tracking("streak-rollup", || async { Ok(42) }).await;
    assert_eq!(ok, Ok(42));

    for _ in 0..3 {
        h.clock.advance(Duration::minutes(1));
        let err: Result<u32, String> = cron
            .with_cron_tracking("streak-rollup", || async { Err("redis unavailable".to_string()) })
            .await;
        assert_eq!(err, Err("redis unavailable".to_string()));
    }

    let health = cron.check_cron_health("streak-rollup").await;
    assert!(!health.healthy);
    assert_eq!(health.consecutive_failures, 3);
    // the third failure already alerted from inside the wrapper
    assert_eq!(h.channel.count(), 1);
    assert!(!health.alert_fired);
}
