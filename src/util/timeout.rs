//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::KrutrimError;

/// Run a fallible future, failing with [`KrutrimError::Timeout`] once `duration` elapses.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, KrutrimError>>,
) -> Result<T, KrutrimError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(KrutrimError::Timeout(duration.as_millis() as u64)),
    }
}
