//! Administrative incident actions and their audit trail
//!
//! Callers arrive with an identity that was already authenticated upstream;
//! this module only checks the admin flag. Every performed action appends a
//! row to `admin_audit_logs` best-effort.

use super::incident_store::{IncidentStatus, IncidentStore};
use crate::database::{from_row, tables, to_row, Filter};
use crate::error::{Error, Result};
use crate::resilience::GuardedStore;
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentAction {
    Acknowledge,
    Resolve,
    Dismiss,
    ClearAll,
}

impl IncidentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentAction::Acknowledge => "acknowledge",
            IncidentAction::Resolve => "resolve",
            IncidentAction::Dismiss => "dismiss",
            IncidentAction::ClearAll => "clear_all",
        }
    }
}

impl fmt::Display for IncidentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-validated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    pub affected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAuditEntry {
    pub action: IncidentAction,
    #[serde(default)]
    pub fingerprint: Option<String>,
    pub actor_id: String,
    pub affected: usize,
    pub created_at: DateTime<Utc>,
}

pub struct IncidentAdmin {
    incidents: Arc<IncidentStore>,
    store: GuardedStore,
    clock: SharedClock,
}

impl IncidentAdmin {
    pub fn new(incidents: Arc<IncidentStore>, store: GuardedStore, clock: SharedClock) -> Self {
        Self {
            incidents,
            store,
            clock,
        }
    }

    /// Apply an action. Unknown fingerprints are `NotFound`; an incident
    /// already in the target state succeeds with `affected: 0`.
    pub async fn perform(
        &self,
        action: IncidentAction,
        fingerprint: Option<&str>,
        actor: &Actor,
    ) -> Result<ActionResult> {
        if !actor.is_admin {
            return Err(Error::Forbidden(format!(
                "{} may not {} incidents",
                actor.id, action
            )));
        }

        let fingerprint = fingerprint.map(str::trim).filter(|f| !f.is_empty());

        let affected = match action {
            IncidentAction::ClearAll => self.incidents.clear_all(),
            _ => {
                let fingerprint =
                    fingerprint.ok_or_else(|| Error::MissingKey("fingerprint".to_string()))?;
                let target = match action {
                    IncidentAction::Acknowledge => IncidentStatus::Acknowledged,
                    IncidentAction::Resolve => IncidentStatus::Resolved,
                    _ => IncidentStatus::Dismissed,
                };
                let changed = self
                    .incidents
                    .move_to(fingerprint, target, Some(actor.id.as_str()))
                    .ok_or_else(|| Error::NotFound(format!("incident {}", fingerprint)))?;
                usize::from(changed)
            }
        };

        info!(action = %action, fingerprint = ?fingerprint, actor = %actor.id, affected, "incident action performed");

        let entry = AdminAuditEntry {
            action,
            fingerprint: fingerprint.map(str::to_string),
            actor_id: actor.id.clone(),
            affected,
            created_at: self.clock.now(),
        };
        self.audit(&entry).await;

        Ok(ActionResult { ok: true, affected })
    }

    async fn audit(&self, entry: &AdminAuditEntry) -> bool {
        match to_row(entry) {
            Ok(row) => self.store.write(tables::ADMIN_AUDIT_LOGS, vec![row]).await,
            Err(e) => {
                warn!(error = %e, "failed to encode audit entry");
                false
            }
        }
    }

    /// Newest audit entries; empty when the audit table is unavailable
    pub async fn recent_audit_logs(&self, limit: usize) -> Vec<AdminAuditEntry> {
        let filter = Filter::new().newest_first("created_at");
        self.store
            .read(tables::ADMIN_AUDIT_LOGS, &filter, limit)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| from_row(row).ok())
            .collect()
    }
}
