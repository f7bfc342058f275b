//! The core keeps working when storage is missing, failing or hanging

mod common;

use common::{harness_with, test_config, FailingAdapter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use studyhub_sentinel::database::tables;
use studyhub_sentinel::monitoring::{CaptureMeta, CapturePayload, FlowMetricInput, FlowStatus};
use studyhub_sentinel::{Actor, IncidentAction, MemoryBackend, Severity};

#[tokio::test]
async fn test_capture_and_admin_survive_a_failing_store() {
    let h = harness_with(test_config(), Arc::new(FailingAdapter::erroring()));

    let outcome = h
        .core
        .capture
        .capture_error(CapturePayload::new("fatal crash while saving notes"), CaptureMeta::default())
        .await;
    let fingerprint = outcome.fingerprint().unwrap().to_string();
    assert_eq!(h.channel.count(), 1);

    let stored = h
        .core
        .flow_metrics
        .record_flow_metric(FlowMetricInput::new("task_mutation", FlowStatus::Success, 40))
        .await;
    assert!(!stored);

    let result = h
        .core
        .admin
        .perform(IncidentAction::Resolve, Some(&fingerprint), &Actor::admin("ops-2"))
        .await
        .unwrap();
    assert_eq!(result.affected, 1);

    let report = h.core.health.health_report().await;
    assert!(!report.audit_log_migration_applied);
    assert!(report.recent_admin_audit_logs.is_empty());
    assert_eq!(report.totals.incidents, 1);
    assert_eq!(report.totals.by_severity.critical, 1);
}

#[tokio::test]
async fn test_hanging_store_is_bounded() {
    let h = harness_with(test_config(), Arc::new(FailingAdapter::hanging(Duration::from_secs(30))));

    let started = Instant::now();
    let report = h.core.burn_rates.evaluate_burn_rates().await;
    let cron = h.core.cron.check_cron_health("nightly-digest").await;
    assert!(started.elapsed() < Duration::from_secs(10));

    assert!(report.evaluations.iter().all(|e| e.severity.is_none()));
    assert!(!report.snapshots_persisted);
    assert!(cron.healthy);
    assert_eq!(h.channel.count(), 0);
}

#[tokio::test]
async fn test_unmigrated_audit_table_is_reported() {
    let backend = Arc::new(MemoryBackend::new());
    backend.migrate(tables::FLOW_METRIC_SAMPLES);
    let h = harness_with(test_config(), backend.clone());

    assert!(
        h.core
            .flow_metrics
            .record_flow_metric(FlowMetricInput::new("login", FlowStatus::Success, 80))
            .await
    );

    h.core
        .admin
        .perform(IncidentAction::ClearAll, None, &Actor::admin("ops-3"))
        .await
        .unwrap();
    let report = h.core.health.health_report().await;
    assert!(!report.audit_log_migration_applied);
    assert_eq!(backend.row_count(tables::ADMIN_AUDIT_LOGS), 0);

    // once the migration lands and the probe cache expires, audits flow again
    backend.migrate(tables::ADMIN_AUDIT_LOGS);
    h.core.store.probe().invalidate(tables::ADMIN_AUDIT_LOGS);
    h.core
        .admin
        .perform(IncidentAction::ClearAll, None, &Actor::admin("ops-3"))
        .await
        .unwrap();
    let report = h.core.health.health_report().await;
    assert!(report.audit_log_migration_applied);
    assert_eq!(report.recent_admin_audit_logs.len(), 1);
    assert_eq!(report.recent_admin_audit_logs[0].actor_id, "ops-3");
}

#[tokio::test]
async fn test_offline_store_recovers_after_probe_ttl() {
    let backend = Arc::new(MemoryBackend::migrated());
    let h = harness_with(test_config(), backend.clone());

    backend.set_offline(true);
    let sample = FlowMetricInput::new("focus_session_save", FlowStatus::Failure, 1200);
    assert!(!h.core.flow_metrics.record_flow_metric(sample.clone()).await);

    // the failed probe is trusted until its TTL runs out
    backend.set_offline(false);
    assert!(!h.core.flow_metrics.record_flow_metric(sample.clone()).await);
    h.clock.advance(chrono::Duration::seconds(31));
    assert!(h.core.flow_metrics.record_flow_metric(sample).await);
    assert_eq!(backend.row_count(tables::FLOW_METRIC_SAMPLES), 1);

    let capture = h
        .core
        .capture
        .capture_error(
            CapturePayload::new("autosave slow").with_severity(Severity::Info),
            CaptureMeta::default(),
        )
        .await;
    assert!(capture.fingerprint().is_some());
}
