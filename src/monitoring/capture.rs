//! Capture facade
//!
//! The single entrypoint for reporting an error or event:
//! guard -> classify -> fingerprint -> upsert -> dispatch (warning and above).
//! Capturing never fails; the returned [`CaptureOutcome`] says what happened.

use super::alerting::{Alert, AlertDispatcher};
use super::fingerprint::fingerprint;
use super::incident_store::{EventInput, IncidentStore};
use super::ingress::IngressGuard;
use super::severity::{classify, ClassifyInput};
use super::types::{Context, EventSource, Severity};
use crate::config::IncidentConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// A reported error or event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    pub message: String,
    #[serde(default)]
    pub error_name: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub context: Option<Context>,
}

impl CapturePayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn from_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_error_name(mut self, name: impl Into<String>) -> Self {
        self.error_name = Some(name.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

/// Request metadata supplied by the caller's transport
#[derive(Debug, Clone, Default)]
pub struct CaptureMeta {
    pub client_ip: Option<String>,
    pub route: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    EmptyMessage,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Dropped {
        reason: DropReason,
    },
    #[serde(rename_all = "camelCase")]
    Recorded {
        fingerprint: String,
        severity: Severity,
        is_new: bool,
        alert_fired: bool,
    },
}

impl CaptureOutcome {
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            CaptureOutcome::Recorded { fingerprint, .. } => Some(fingerprint),
            CaptureOutcome::Dropped { .. } => None,
        }
    }
}

pub struct CaptureFacade {
    ingress: Arc<IngressGuard>,
    incidents: Arc<IncidentStore>,
    dispatcher: Arc<AlertDispatcher>,
    limits: IncidentConfig,
}

impl CaptureFacade {
    pub fn new(
        ingress: Arc<IngressGuard>,
        incidents: Arc<IncidentStore>,
        dispatcher: Arc<AlertDispatcher>,
        limits: IncidentConfig,
    ) -> Self {
        Self {
            ingress,
            incidents,
            dispatcher,
            limits,
        }
    }

    /// Capture a server or API error. The source defaults to `server`.
    pub async fn capture_error(&self, payload: CapturePayload, meta: CaptureMeta) -> CaptureOutcome {
        let source = payload.source.unwrap_or(EventSource::Server);
        let context = payload.context.clone().unwrap_or_default();
        self.capture(payload, source, context, meta).await
    }

    /// Capture an error reported by a browser. The source is forced to
    /// `client` and oversized context is replaced by a marker.
    pub async fn capture_client_error(&self, payload: CapturePayload, meta: CaptureMeta) -> CaptureOutcome {
        let context = match payload.context.clone() {
            Some(context) if context_size(&context) > self.limits.max_client_context_bytes => {
                let mut marker = Context::new();
                marker.insert("contextTruncated".to_string(), Value::Bool(true));
                marker
            }
            other => other.unwrap_or_default(),
        };
        self.capture(payload, EventSource::Client, context, meta).await
    }

    async fn capture(
        &self,
        payload: CapturePayload,
        source: EventSource,
        mut context: Context,
        meta: CaptureMeta,
    ) -> CaptureOutcome {
        let message = truncate_chars(payload.message.trim(), self.limits.max_message_len);
        if message.is_empty() {
            return CaptureOutcome::Dropped {
                reason: DropReason::EmptyMessage,
            };
        }

        let guard_key = format!(
            "capture:{}:{}",
            source,
            meta.client_ip.as_deref().unwrap_or("internal")
        );
        if !self.ingress.is_allowed(&guard_key) {
            return CaptureOutcome::Dropped {
                reason: DropReason::RateLimited,
            };
        }

        let error_name = payload
            .error_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Error".to_string());

        let severity = classify(
            &ClassifyInput::new(&message, source)
                .with_context(Some(&context))
                .with_hint(payload.severity),
        );
        let fingerprint = fingerprint(source, &error_name, &message);

        for (key, value) in [
            ("route", meta.route),
            ("requestId", meta.request_id),
            ("userId", meta.user_id),
        ] {
            if let Some(value) = value {
                context.entry(key.to_string()).or_insert(Value::String(value));
            }
        }

        let outcome = self.incidents.upsert(
            &fingerprint,
            EventInput::new(message.clone(), source, severity)
                .with_error_name(error_name.clone())
                .with_context(context),
        );

        let alert_fired = if severity.is_alertable() {
            let incident = &outcome.incident;
            let alert = Alert::new(
                format!("[{}] {}: {}", source, error_name, truncate_chars(&message, 120)),
                severity,
                message.clone(),
                fingerprint.clone(),
                incident.last_seen_at,
            )
            .with_details(json!({
                "fingerprint": fingerprint,
                "status": incident.status,
                "occurrenceCount": incident.occurrence_count,
                "isNew": outcome.is_new,
                "reopened": outcome.reopened,
            }));
            self.dispatcher.dispatch(alert).await
        } else {
            false
        };

        debug!(
            fingerprint = %fingerprint,
            severity = %severity,
            is_new = outcome.is_new,
            alert_fired,
            "event captured"
        );

        CaptureOutcome::Recorded {
            fingerprint,
            severity,
            is_new: outcome.is_new,
            alert_fired,
        }
    }
}

fn context_size(context: &Context) -> usize {
    serde_json::to_string(context).map(|s| s.len()).unwrap_or(usize::MAX)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
