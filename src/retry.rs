//! Retry engine for wire attempts.
//!
//! At most `1 + max_retries` attempts. Rate limits, upstream 5xx, and
//! transport failures retry; other client errors return immediately.
//! A server-supplied `retry_after` overrides the exponential backoff.

use crate::envelope::ApiReply;
use crate::http::TransportError;
use crate::metrics::Metrics;
use crate::sleeper::Sleeper;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// First backoff step.
pub const BASE_DELAY_MILLIS: u64 = 1_000;
/// Backoff ceiling.
pub const MAX_DELAY_MILLIS: u64 = 30_000;

#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Why an attempt is being retried; used as the metrics label.
fn retry_reason(outcome: &Result<ApiReply, TransportError>) -> Option<&'static str> {
    match outcome {
        Ok(reply) if reply.ok => None,
        Ok(reply) => match reply.error_code {
            Some(429) => Some("rate_limit"),
            Some(code) if code >= 500 => Some("server_error"),
            _ => None,
        },
        Err(e) if e.is_timeout() => Some("timeout"),
        Err(_) => Some("network"),
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, sleeper: Arc<dyn Sleeper>, metrics: Arc<Metrics>) -> Self {
        Self { max_retries, sleeper, metrics }
    }

    /// Drive `attempt` until it succeeds, fails non-retriably, or the
    /// budget runs out. The final outcome is returned either way.
    pub async fn execute<Op, Fut>(&self, mut attempt: Op) -> Result<ApiReply, TransportError>
    where
        Op: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<ApiReply, TransportError>> + Send,
    {
        for retry_index in 0..=self.max_retries {
            let outcome = attempt().await;

            let Some(reason) = retry_reason(&outcome) else {
                return outcome;
            };
            if retry_index == self.max_retries {
                return outcome;
            }

            self.metrics.record_retry(reason);
            let delay = match outcome.as_ref().ok().and_then(|reply| reply.retry_after()) {
                Some(seconds) => Duration::from_secs(seconds),
                None => backoff_delay(retry_index),
            };
            tracing::debug!(reason, delay_ms = delay.as_millis() as u64, "retrying attempt");
            self.sleeper.sleep(delay).await;
        }
        unreachable!("retry loop returns from its final iteration")
    }
}

/// Exponential: 1s, 2s, 4s, … capped at 30s.
fn backoff_delay(retry_index: u32) -> Duration {
    let millis = BASE_DELAY_MILLIS.saturating_mul(2u64.saturating_pow(retry_index));
    Duration::from_millis(millis.min(MAX_DELAY_MILLIS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportError;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(max_retries: u32, sleeper: Arc<dyn Sleeper>) -> (RetryPolicy, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new().expect("registry"));
        (RetryPolicy::new(max_retries, sleeper, metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn success_returns_without_retry() {
        let (policy, _metrics) = policy(3, Arc::new(InstantSleeper));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let reply = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ApiReply::success(json!({"id": 1})))
                }
            })
            .await
            .unwrap();

        assert!(reply.ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let (policy, _metrics) = policy(3, Arc::new(InstantSleeper));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let reply = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ApiReply::failure(400, "Bad Request"))
                }
            })
            .await
            .unwrap();

        assert_eq!(reply.error_code, Some(400));
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "4xx other than 429 never retries");
    }

    #[tokio::test]
    async fn server_errors_retry_with_exponential_backoff() {
        let sleeper = TrackingSleeper::new();
        let (policy, _metrics) = policy(3, Arc::new(sleeper.clone()));

        let reply = policy
            .execute(|| async { Ok(ApiReply::failure(502, "Bad Gateway")) })
            .await
            .unwrap();

        assert_eq!(reply.error_code, Some(502), "final failure propagates");
        assert_eq!(
            sleeper.calls(),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test]
    async fn backoff_is_capped() {
        let sleeper = TrackingSleeper::new();
        let (policy, _metrics) = policy(8, Arc::new(sleeper.clone()));

        let _ = policy
            .execute(|| async {
                Err::<ApiReply, _>(TransportError::Network("reset".to_string()))
            })
            .await;

        let calls = sleeper.calls();
        assert_eq!(calls.len(), 8);
        assert_eq!(calls[5], Duration::from_millis(30_000));
        assert_eq!(calls[7], Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn server_supplied_delay_wins_over_backoff() {
        let sleeper = TrackingSleeper::new();
        let (policy, _metrics) = policy(1, Arc::new(sleeper.clone()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let reply = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(ApiReply::rate_limited("Too Many Requests", 2))
                    } else {
                        Ok(ApiReply::success(json!({})))
                    }
                }
            })
            .await
            .unwrap();

        assert!(reply.ok);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn retry_metrics_carry_the_reason() {
        let (policy, metrics) = policy(2, Arc::new(InstantSleeper));
        let _ = policy
            .execute(|| async {
                Err::<ApiReply, _>(TransportError::Timeout(Duration::from_secs(30)))
            })
            .await;

        let text = metrics.render();
        assert!(text.contains("reason=\"timeout\""));
        assert!(text.contains("botgate_retries_total{reason=\"timeout\"} 2"));
    }

    #[tokio::test]
    async fn zero_max_retries_means_single_attempt() {
        let (policy, _metrics) = policy(0, Arc::new(InstantSleeper));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let outcome = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<ApiReply, _>(TransportError::Network("down".to_string()))
                }
            })
            .await;

        assert!(outcome.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
