use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::admin::{AdminAuditEntry, IncidentAdmin};
use super::incident_store::{Incident, IncidentStore, SnapshotTotals};
use crate::database::tables;
use crate::resilience::GuardedStore;

/// Operator health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub totals: SnapshotTotals,
    pub top_incidents: Vec<Incident>,
    pub audit_log_migration_applied: bool,
    pub recent_admin_audit_logs: Vec<AdminAuditEntry>,
    pub uptime_seconds: u64,
    pub version: String,
}

pub struct HealthService {
    start_time: Instant,
    incidents: Arc<IncidentStore>,
    admin: Arc<IncidentAdmin>,
    store: GuardedStore,
    recent_audit_logs: usize,
}

impl HealthService {
    pub fn new(
        incidents: Arc<IncidentStore>,
        admin: Arc<IncidentAdmin>,
        store: GuardedStore,
        recent_audit_logs: usize,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            incidents,
            admin,
            store,
            recent_audit_logs,
        }
    }

    pub async fn health_report(&self) -> HealthReport {
        let snapshot = self.incidents.snapshot();
        let audit_log_migration_applied = self.store.probe().is_available(tables::ADMIN_AUDIT_LOGS).await;
        let recent_admin_audit_logs = if audit_log_migration_applied {
            self.admin.recent_audit_logs(self.recent_audit_logs).await
        } else {
            Vec::new()
        };

        HealthReport {
            generated_at: snapshot.generated_at,
            totals: snapshot.totals,
            top_incidents: snapshot.top_incidents,
            audit_log_migration_applied,
            recent_admin_audit_logs,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
