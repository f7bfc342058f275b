//! Utility modules shared across the monitoring core

pub mod clock;
pub mod correlation;
pub mod timeout;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use correlation::{CorrelationId, CorrelationSpanExt};
pub use timeout::{bounded, TimeoutError, TimeoutExt};
