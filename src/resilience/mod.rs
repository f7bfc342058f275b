//! Fault tolerance around the core's external collaborators
//!
//! - [`TableProbe`]: cached "is this table migrated and reachable" checks,
//!   a circuit breaker keyed by table name
//! - [`BestEffortSink`]: bounded, log-only execution of side effects
//! - [`GuardedStore`]: persistence calls routed through both, so callers get
//!   degraded defaults instead of errors

pub mod best_effort;
pub mod guarded_store;
pub mod table_probe;

pub use best_effort::{BestEffortSink, SinkStatsSnapshot};
pub use guarded_store::GuardedStore;
pub use table_probe::{Availability, TableProbe};
