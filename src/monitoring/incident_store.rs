//! Incident store
//!
//! One [`Incident`] per fingerprint, held in a sharded concurrent map so that
//! every mutation of a fingerprint is a single-key read-modify-write. Each
//! incident keeps a bounded window of its most recent events.
//!
//! Lifecycle:
//! - created `open` on the first event
//! - `open` -> `acknowledged` / `resolved` / `dismissed` by admin action
//! - a new event on a `resolved` or `dismissed` incident reopens it to `open`
//! - `acknowledged` incidents stay acknowledged when new events arrive

use super::types::{Context, EventSource, Severity};
use crate::utils::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl IncidentStatus {
    /// Open and acknowledged incidents still need attention
    pub fn is_active(&self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::Acknowledged)
    }
}

/// A single reported occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub message: String,
    pub error_name: String,
    pub source: EventSource,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
    pub timestamp: DateTime<Utc>,
}

/// Data for one upsert; the timestamp is assigned by the store
#[derive(Debug, Clone)]
pub struct EventInput {
    pub message: String,
    pub error_name: String,
    pub source: EventSource,
    pub severity: Severity,
    pub context: Context,
}

impl EventInput {
    pub fn new(message: impl Into<String>, source: EventSource, severity: Severity) -> Self {
        Self {
            message: message.into(),
            error_name: "Error".to_string(),
            source,
            severity,
            context: Context::new(),
        }
    }

    pub fn with_error_name(mut self, name: impl Into<String>) -> Self {
        self.error_name = name.into();
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// Aggregate of all events sharing a fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub fingerprint: String,
    pub status: IncidentStatus,
    /// Severity of the latest event
    pub severity: Severity,
    pub message: String,
    pub error_name: String,
    pub source: EventSource,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub occurrence_count: u64,
    /// Newest last
    pub recent_events: VecDeque<Event>,
    pub acknowledged_by: Option<String>,
    pub resolved_by: Option<String>,
}

impl Incident {
    fn open(fingerprint: &str, event: Event) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            status: IncidentStatus::Open,
            severity: event.severity,
            message: event.message.clone(),
            error_name: event.error_name.clone(),
            source: event.source,
            first_seen_at: event.timestamp,
            last_seen_at: event.timestamp,
            occurrence_count: 1,
            recent_events: VecDeque::from([event]),
            acknowledged_by: None,
            resolved_by: None,
        }
    }

    fn record(&mut self, event: Event, max_recent_events: usize) {
        self.occurrence_count += 1;
        self.last_seen_at = event.timestamp;
        self.severity = event.severity;
        self.message = event.message.clone();

        if matches!(self.status, IncidentStatus::Resolved | IncidentStatus::Dismissed) {
            self.status = IncidentStatus::Open;
            self.resolved_by = None;
        }

        self.recent_events.push_back(event);
        while self.recent_events.len() > max_recent_events {
            self.recent_events.pop_front();
        }
    }
}

/// Result of an upsert
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub incident: Incident,
    pub is_new: bool,
    /// The incident was resolved or dismissed and this event reopened it
    pub reopened: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub critical: u64,
}

impl SeverityCounts {
    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Error => self.error += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTotals {
    pub incidents: u64,
    /// Sum of occurrence counts
    pub events: u64,
    pub by_severity: SeverityCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSnapshot {
    pub generated_at: DateTime<Utc>,
    pub totals: SnapshotTotals,
    pub top_incidents: Vec<Incident>,
}

/// Process-wide registry of incidents keyed by fingerprint
pub struct IncidentStore {
    incidents: DashMap<String, Incident>,
    clock: SharedClock,
    max_recent_events: usize,
    top_n: usize,
}

impl IncidentStore {
    pub fn new(clock: SharedClock, max_recent_events: usize, top_n: usize) -> Self {
        Self {
            incidents: DashMap::new(),
            clock,
            max_recent_events: max_recent_events.max(1),
            top_n,
        }
    }

    /// Create the incident or append the event to it
    pub fn upsert(&self, fingerprint: &str, input: EventInput) -> UpsertOutcome {
        let event = Event {
            message: input.message,
            error_name: input.error_name,
            source: input.source,
            severity: input.severity,
            context: input.context,
            timestamp: self.clock.now(),
        };

        match self.incidents.entry(fingerprint.to_string()) {
            Entry::Occupied(mut occupied) => {
                let incident = occupied.get_mut();
                let reopened = !incident.status.is_active();
                incident.record(event, self.max_recent_events);
                if reopened {
                    info!(fingerprint, severity = %incident.severity, "incident reopened");
                } else {
                    debug!(
                        fingerprint,
                        occurrences = incident.occurrence_count,
                        "incident occurrence recorded"
                    );
                }
                UpsertOutcome {
                    incident: incident.clone(),
                    is_new: false,
                    reopened,
                }
            }
            Entry::Vacant(vacant) => {
                let incident = Incident::open(fingerprint, event);
                info!(fingerprint, severity = %incident.severity, source = %incident.source, "incident opened");
                let incident = vacant.insert(incident).value().clone();
                UpsertOutcome {
                    incident,
                    is_new: true,
                    reopened: false,
                }
            }
        }
    }

    /// `open` -> `acknowledged`; already acknowledged is a no-op success.
    /// Unknown, resolved and dismissed incidents return false.
    pub fn acknowledge(&self, fingerprint: &str, actor: Option<&str>) -> bool {
        self.move_to(fingerprint, IncidentStatus::Acknowledged, actor)
            .unwrap_or(false)
    }

    pub fn resolve(&self, fingerprint: &str, actor: Option<&str>) -> bool {
        self.move_to(fingerprint, IncidentStatus::Resolved, actor)
            .unwrap_or(false)
    }

    pub fn dismiss(&self, fingerprint: &str, actor: Option<&str>) -> bool {
        self.move_to(fingerprint, IncidentStatus::Dismissed, actor)
            .unwrap_or(false)
    }

    /// Move an incident to `target` under its map entry. `None` when the
    /// fingerprint is unknown, otherwise whether the action took effect.
    /// Acknowledging is idempotent and only applies to active incidents.
    pub fn move_to(&self, fingerprint: &str, target: IncidentStatus, actor: Option<&str>) -> Option<bool> {
        let mut incident = self.incidents.get_mut(fingerprint)?;
        let changed = match (incident.status, target) {
            (IncidentStatus::Acknowledged, IncidentStatus::Acknowledged) => true,
            (IncidentStatus::Open, IncidentStatus::Acknowledged) => {
                incident.status = IncidentStatus::Acknowledged;
                incident.acknowledged_by = actor.map(str::to_string);
                true
            }
            (_, IncidentStatus::Acknowledged) | (_, IncidentStatus::Open) => false,
            (current, target) if current == target => false,
            (_, target) => {
                incident.status = target;
                incident.resolved_by = actor.map(str::to_string);
                true
            }
        };
        Some(changed)
    }

    /// Remove every incident, returning how many were removed
    pub fn clear_all(&self) -> usize {
        let keys: Vec<String> = self.incidents.iter().map(|e| e.key().clone()).collect();
        let removed = keys
            .iter()
            .filter(|key| self.incidents.remove(key.as_str()).is_some())
            .count();
        info!(removed, "incident store cleared");
        removed
    }

    pub fn get(&self, fingerprint: &str) -> Option<Incident> {
        self.incidents.get(fingerprint).map(|i| i.clone())
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// Totals plus the top incidents: active first, then most severe, then most recent
    pub fn snapshot(&self) -> IncidentSnapshot {
        let mut totals = SnapshotTotals::default();
        let mut incidents: Vec<Incident> = Vec::with_capacity(self.incidents.len());

        for entry in self.incidents.iter() {
            let incident = entry.value();
            totals.incidents += 1;
            totals.events += incident.occurrence_count;
            totals.by_severity.bump(incident.severity);
            incidents.push(incident.clone());
        }

        incidents.sort_by(|a, b| {
            b.status
                .is_active()
                .cmp(&a.status.is_active())
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| b.last_seen_at.cmp(&a.last_seen_at))
        });
        incidents.truncate(self.top_n);

        IncidentSnapshot {
            generated_at: self.clock.now(),
            totals,
            top_incidents: incidents,
        }
    }
}
