// src/agent/retry.rs — Retry with exponential backoff for agent service calls
//
// Wraps any AgentService with automatic retry on transport-level failures.
// Retries: rate limits (429), server errors (5xx), timeouts, connection resets.
// Does NOT retry: bad request (400), auth errors (401, 403), unparseable bodies.
// Run status itself is never retried here; a failed run is a result, not an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{AgentService, AssistantInfo, Run};
use crate::core::Turn;
use crate::infra::errors::ParleyError;

const MAX_RETRIES: u32 = 4;
const INITIAL_DELAY_MS: u64 = 500;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

/// An agent service wrapper that adds retry with exponential backoff.
pub struct RetryService {
    inner: Arc<dyn AgentService>,
    config: RetryConfig,
}

impl RetryService {
    pub fn new(inner: Arc<dyn AgentService>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn AgentService>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry `attempt` (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // Server-provided wait wins, plus a small buffer.
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);

        Duration::from_millis((capped_ms * jitter) as u64)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ParleyError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ParleyError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retriable() || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.delay_for_attempt(attempt, rate_limit_delay(&e));
                    tracing::warn!(
                        service = self.inner.id(),
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn rate_limit_delay(error: &ParleyError) -> Option<Duration> {
    match error {
        ParleyError::RateLimited { retry_after_ms } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], reproducible per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl AgentService for RetryService {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ParleyError> {
        self.with_retry("retrieve_assistant", || {
            self.inner.retrieve_assistant(assistant_id)
        })
        .await
    }

    async fn create_thread(&self) -> Result<String, ParleyError> {
        self.with_retry("create_thread", || self.inner.create_thread())
            .await
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), ParleyError> {
        self.with_retry("add_message", || self.inner.add_message(thread_id, content))
            .await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ParleyError> {
        self.with_retry("create_run", || {
            self.inner.create_run(thread_id, assistant_id)
        })
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError> {
        self.with_retry("get_run", || self.inner.get_run(thread_id, run_id))
            .await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError> {
        self.with_retry("cancel_run", || self.inner.cancel_run(thread_id, run_id))
            .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Turn>, ParleyError> {
        self.with_retry("list_messages", || self.inner.list_messages(thread_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RunStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(1),
            jitter_fraction: 0.0,
        }
    }

    /// Fails `get_run` with the given error a fixed number of times.
    struct FlakyService {
        failures: u32,
        retriable: bool,
        calls: AtomicU32,
    }

    impl FlakyService {
        fn new(failures: u32, retriable: bool) -> Self {
            Self {
                failures,
                retriable,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AgentService for FlakyService {
        fn id(&self) -> &str {
            "flaky"
        }
        async fn retrieve_assistant(&self, id: &str) -> Result<AssistantInfo, ParleyError> {
            Ok(AssistantInfo {
                id: id.into(),
                name: None,
            })
        }
        async fn create_thread(&self) -> Result<String, ParleyError> {
            Ok("thread_1".into())
        }
        async fn add_message(&self, _t: &str, _c: &str) -> Result<(), ParleyError> {
            Ok(())
        }
        async fn create_run(&self, _t: &str, _a: &str) -> Result<Run, ParleyError> {
            Ok(Run::new("run_1", RunStatus::Queued))
        }
        async fn get_run(&self, _t: &str, run_id: &str) -> Result<Run, ParleyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ParleyError::Submission {
                    operation: "get_run".into(),
                    message: "HTTP 502".into(),
                    retriable: self.retriable,
                });
            }
            Ok(Run::new(run_id, RunStatus::Completed))
        }
        async fn cancel_run(&self, _t: &str, run_id: &str) -> Result<Run, ParleyError> {
            Ok(Run::new(run_id, RunStatus::Cancelled))
        }
        async fn list_messages(&self, _t: &str) -> Result<Vec<Turn>, ParleyError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = Arc::new(FlakyService::new(2, true));
        let svc = RetryService::with_config(inner.clone(), fast_config(4));
        let run = svc.get_run("thread_1", "run_1").await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyService::new(10, true));
        let svc = RetryService::with_config(inner.clone(), fast_config(2));
        let err = svc.get_run("thread_1", "run_1").await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_failures() {
        let inner = Arc::new(FlakyService::new(1, false));
        let svc = RetryService::with_config(inner.clone(), fast_config(4));
        assert!(svc.get_run("thread_1", "run_1").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rate_limit_delay_extraction() {
        let err = ParleyError::RateLimited {
            retry_after_ms: 3000,
        };
        assert_eq!(rate_limit_delay(&err), Some(Duration::from_millis(3000)));
        assert!(rate_limit_delay(&ParleyError::RateLimited { retry_after_ms: 0 }).is_none());
        assert!(rate_limit_delay(&ParleyError::EmptyTurn).is_none());
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let svc = RetryService::new(Arc::new(FlakyService::new(0, true)));
        let d0 = svc.delay_for_attempt(0, None);
        let d1 = svc.delay_for_attempt(1, None);
        let d2 = svc.delay_for_attempt(2, None);

        // ≈500ms, ≈1000ms, ≈2000ms within ±20% jitter
        assert!(d0.as_millis() >= 400 && d0.as_millis() <= 600);
        assert!(d1.as_millis() >= 800 && d1.as_millis() <= 1200);
        assert!(d2.as_millis() >= 1600 && d2.as_millis() <= 2400);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let svc = RetryService::new(Arc::new(FlakyService::new(0, true)));
        let d = svc.delay_for_attempt(10, None);
        assert!(d.as_millis() <= 9_600);
    }

    #[test]
    fn test_delay_uses_rate_limit_hint() {
        let svc = RetryService::new(Arc::new(FlakyService::new(0, true)));
        let d = svc.delay_for_attempt(0, Some(Duration::from_millis(10_000)));
        assert_eq!(d.as_millis(), 10_100);
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} out of range for attempt {attempt}");
        }
        assert_eq!(deterministic_jitter(5, 0.2), deterministic_jitter(5, 0.2));
    }
}
