//! Retry with exponential backoff and a per-call timeout.
//!
//! Every backend call of a publish run goes through [`with_retry`] or, for
//! streamed uploads, [`with_retry_transfer`]. Transient errors
//! ([`StorageError::is_transient`]) are retried; anything else is returned at
//! once. Cancellation is observed before each attempt and while backing off.
//! An attempt already in flight is allowed to settle.
//!
//! The whole-call deadline only applies to single requests. An upload's
//! duration grows with its size, so transfers are bounded per request by the
//! backend instead.

use std::future::Future;
use std::time::Duration;

use quire_core::{DestinationKey, PublishTuning};

use crate::cancel::CancelSignal;
use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Upper bound for a single request.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&PublishTuning::default())
    }
}

impl From<&PublishTuning> for RetryPolicy {
    fn from(tuning: &PublishTuning) -> Self {
        Self {
            max_attempts: tuning.max_attempts.max(1),
            initial_backoff: tuning.initial_backoff(),
            max_backoff: tuning.max_backoff(),
            multiplier: 2.0,
            call_timeout: tuning.call_timeout(),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the failed attempt number `attempt` (0-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(ms as u64).min(self.max_backoff)
    }
}

/// Run a single-request `call` under `policy`, each attempt bounded by
/// `policy.call_timeout`.
///
/// `op` and `key` only label log lines.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    op: &str,
    key: &DestinationKey,
    call: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    retry_loop(policy, cancel, op, key, Some(policy.call_timeout), call).await
}

/// Run an upload under `policy` with no deadline on the attempt as a whole.
///
/// The backend bounds each request it makes (one `PUT`, or one part of a
/// multipart upload), so a slow but progressing transfer is never cut off.
pub async fn with_retry_transfer<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    op: &str,
    key: &DestinationKey,
    call: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    retry_loop(policy, cancel, op, key, None, call).await
}

async fn retry_loop<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    op: &str,
    key: &DestinationKey,
    deadline: Option<Duration>,
    mut call: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        let result = match deadline {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Timeout(limit)),
            },
            None => call().await,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if !err.is_transient() || attempt >= policy.max_attempts {
            return Err(err);
        }

        let backoff = policy.backoff_for_attempt(attempt - 1);
        tracing::warn!(
            op,
            key = %key,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "transient backend error; retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(StorageError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::cancel::cancel_pair;

    fn key() -> DestinationKey {
        DestinationKey::parse("posts/a").unwrap()
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            call_timeout: Duration::from_secs(1),
        }
    }

    fn transient() -> StorageError {
        StorageError::Remote {
            message: "503 slow down".into(),
            transient: true,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = fast();
        assert_eq!(p.backoff_for_attempt(0), Duration::from_millis(10));
        assert_eq!(p.backoff_for_attempt(1), Duration::from_millis(20));
        assert_eq!(p.backoff_for_attempt(5), Duration::from_millis(50));
    }

    #[test]
    fn policy_from_tuning() {
        let p = RetryPolicy::from(&PublishTuning::default());
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_backoff, Duration::from_millis(200));
        assert_eq!(p.call_timeout, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let out = with_retry(&fast(), &CancelSignal::never(), "put", &key(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transient())
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast(), &CancelSignal::never(), "put", &key(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::Remote { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast(), &CancelSignal::never(), "put", &key(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StorageError::InvalidKey("x".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_then_retries() {
        let calls = AtomicU32::new(0);
        let out = with_retry(&fast(), &CancelSignal::never(), "head", &key(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok::<_, StorageError>(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_is_not_cut_off_by_call_timeout() {
        let calls = AtomicU32::new(0);
        let out = with_retry_transfer(&fast(), &CancelSignal::never(), "put_file", &key(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                for _ in 0..10 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, StorageError>("done")
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_still_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let out = with_retry_transfer(&fast(), &CancelSignal::never(), "put_file", &key(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StorageError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast(), &signal, "put", &key(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StorageError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
