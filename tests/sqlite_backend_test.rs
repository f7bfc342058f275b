//! Full core over a SQLite file
#![cfg(feature = "sqlite")]

mod common;

use common::{harness_with, test_config};
use std::sync::Arc;
use studyhub_sentinel::database::{tables, SqliteBackend};
use studyhub_sentinel::monitoring::{FlowMetricInput, FlowStatus};
use studyhub_sentinel::{Actor, IncidentAction};

#[tokio::test]
async fn test_core_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::open(&dir.path().join("sentinel.db")).await.unwrap();
    backend.migrate_all().await.unwrap();
    let h = harness_with(test_config(), Arc::new(backend));

    for i in 0..8 {
        let status = if i < 6 { FlowStatus::Success } else { FlowStatus::Failure };
        assert!(
            h.core
                .flow_metrics
                .record_flow_metric(FlowMetricInput::new("login", status, 200).for_user(format!("u-{}", i)))
                .await
        );
    }

    let report = h.core.burn_rates.evaluate_burn_rates().await;
    let hourly = report
        .evaluations
        .iter()
        .find(|e| e.flow == "login" && e.window_label == "1h")
        .unwrap();
    assert_eq!(hourly.total_samples, 8);
    assert_eq!(hourly.failed_samples, 2);
    assert!(report.snapshots_persisted);

    h.core
        .admin
        .perform(IncidentAction::ClearAll, None, &Actor::admin("ops-9"))
        .await
        .unwrap();
    let health = h.core.health.health_report().await;
    assert!(health.audit_log_migration_applied);
    assert_eq!(health.recent_admin_audit_logs.len(), 1);
}

#[tokio::test]
async fn test_unmigrated_sqlite_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::open(&dir.path().join("fresh.db")).await.unwrap();
    let h = harness_with(test_config(), Arc::new(backend));

    assert!(!h.core.store.probe().is_available(tables::ADMIN_AUDIT_LOGS).await);
    let health = h.core.health.health_report().await;
    assert!(!health.audit_log_migration_applied);
}
