//! Exponential-backoff retry wrapper used for every outbound CBR call
//! (spec §5 "Cancellation & timeouts"). A retry is skipped whenever the
//! underlying error carries a non-retryable HTTP status.

use {
    crate::error::{CbrError, is_retryable},
    backoff::{ExponentialBackoff, future::retry},
    std::time::Duration,
};

pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}

/// Retries `op` under an exponential backoff policy, short-circuiting on any
/// non-retryable status (spec §5, §7).
pub async fn with_retry<T, F, Fut>(op: F) -> Result<T, CbrError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, CbrError>>,
{
    retry(default_backoff(), || async {
        match op().await {
            Ok(value) => Ok(value),
            Err(err) if is_retryable(err.status) => Err(backoff::Error::transient(err)),
            Err(err) => Err(backoff::Error::permanent(err)),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(|| async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                Err(CbrError::new(503, "unavailable"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_status() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), CbrError> = with_retry(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(CbrError::new(409, "conflict"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
