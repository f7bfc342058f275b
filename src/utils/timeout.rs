//! Timeout utilities for calls that leave the process
//!
//! Storage and notification calls are bounded so that a hung collaborator
//! can never stall the capture or alerting path.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Timeout};

#[derive(Debug, Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation failed: {0}")]
    OperationError(String),
}

/// Extension trait for adding a timeout to futures
pub trait TimeoutExt: Future {
    fn with_timeout(self, duration: Duration) -> Timeout<Self>
    where
        Self: Sized,
    {
        timeout(duration, self)
    }
}

impl<T: Future> TimeoutExt for T {}

/// Bound a fallible future, flattening both failure modes into [`TimeoutError`]
pub async fn bounded<F, T, E>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::OperationError(e.to_string())),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, String>(())
        };
        let result = bounded(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(TimeoutError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_bounded_flattens_errors() {
        let failing = async { Err::<(), _>("channel down") };
        match bounded(Duration::from_secs(1), failing).await {
            Err(TimeoutError::OperationError(msg)) => assert_eq!(msg, "channel down"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
