//! StudyHub Sentinel - incident management and SLO monitoring core
//!
//! Module map:
//! - monitoring: the domain (classification, incidents, alerts, SLOs, crons)
//! - resilience: best-effort wrappers around storage and notification calls
//! - database: the persistence adapter seam and its backends
//! - services: the HTTP API
//! - sentinel: wires every component into one shared [`SentinelCore`]

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod resilience;
pub mod sentinel;
pub mod services;
pub mod utils;

pub use crate::config::Config;
pub use crate::sentinel::{build_channel, SentinelCore};
pub use crate::database::{Filter, MemoryBackend, PersistenceAdapter, Row};
pub use crate::error::{Error, ErrorCategory, Result};
pub use crate::monitoring::{
    Actor, Alert, CaptureMeta, CaptureOutcome, CapturePayload, EventSource, IncidentAction,
    IncidentStatus, NotificationChannel, Severity,
};
pub use crate::utils::{Clock, ManualClock, SharedClock, SystemClock};
