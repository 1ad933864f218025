//! Exponential backoff for transient provider failures.
//!
//! The delay before retry `n` (1-based) is
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=250ms)
//! ```
//!
//! Only errors for which [`Error::is_transient`] holds are retried. A
//! malformed response or an unsupported operation fails on the first
//! attempt.

use super::{ChatPrompt, LlmProvider};
use crate::error::{Error, Result};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

const MAX_DELAY: Duration = Duration::from_secs(30);
const MAX_JITTER_MS: u64 = 250;

/// Wraps any [`LlmProvider`] with retries.
pub struct Retry<P> {
    inner: P,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<P> Retry<P> {
    pub fn new(inner: P, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Backoff before retry `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        self.base_delay.saturating_mul(1 << shift).min(self.max_delay)
    }

    async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let e = match call().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            attempt += 1;

            if !e.is_transient() {
                return Err(e);
            }
            if attempt > self.max_retries {
                error!(
                    op,
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Exhausted retries"
                );
                return Err(e);
            }

            let jitter_ms = rand::rng().random_range(0..=MAX_JITTER_MS);
            let delay = self.backoff(attempt) + Duration::from_millis(jitter_ms);
            warn!(
                op,
                attempt,
                max = self.max_retries,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %e,
                "Attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

impl<P> fmt::Debug for Retry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<P: LlmProvider> LlmProvider for Retry<P> {
    async fn chat_completion(&self, prompt: ChatPrompt<'_>) -> Result<String> {
        self.run("chat_completion", || self.inner.chat_completion(prompt))
            .await
    }

    async fn create_embeddings(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.run("create_embeddings", || self.inner.create_embeddings(model, texts))
            .await
    }

    fn total_cost(&self) -> f64 {
        self.inner.total_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;

    fn unavailable() -> Error {
        Error::Api {
            provider: "OpenAI",
            status: 503,
            body: "overloaded".into(),
        }
    }

    fn prompt() -> ChatPrompt<'static> {
        ChatPrompt {
            model: "m",
            system: "",
            user: "u",
            temperature: 0.0,
            max_tokens: 10,
            require_json: false,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = Retry::new(MockProvider::default(), 10, Duration::from_secs(1));
        assert_eq!(retry.backoff(1), Duration::from_secs(1));
        assert_eq!(retry.backoff(2), Duration::from_secs(2));
        assert_eq!(retry.backoff(3), Duration::from_secs(4));
        assert_eq!(retry.backoff(6), Duration::from_secs(30));
        assert_eq!(retry.backoff(100), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_is_retried() {
        let provider = MockProvider::with_chat(vec![Err(unavailable()), Ok("done".into())]);
        let retry = Retry::new(provider, 2, Duration::from_secs(1));

        let out = retry.chat_completion(prompt()).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(retry.inner().chat_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let provider = MockProvider::with_chat(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok("too late".into()),
        ]);
        let retry = Retry::new(provider, 2, Duration::from_secs(1));

        let err = retry.chat_completion(prompt()).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 503, .. }));
        assert_eq!(retry.inner().chat_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let provider = MockProvider::with_chat(vec![
            Err(Error::Provider("malformed".into())),
            Ok("unused".into()),
        ]);
        let retry = Retry::new(provider, 5, Duration::from_secs(1));

        assert!(retry.chat_completion(prompt()).await.is_err());
        assert_eq!(retry.inner().chat_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_implemented_embeddings_fail_fast() {
        let retry = Retry::new(MockProvider::default(), 5, Duration::from_secs(1));
        let err = retry
            .create_embeddings("m", &["unknown".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(retry.inner().embedding_calls.lock().unwrap().len(), 1);
    }
}
