use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Wraps a single provider with exponential-backoff retry. There is one
/// configured provider, not a priority list — grounded on the retry loop of
/// a multi-provider router, trimmed to a single slot.
pub struct RetryingProvider<P: LlmProvider> {
    inner: P,
    max_retries: u32,
    backoff_base: Duration,
}

impl<P: LlmProvider> RetryingProvider<P> {
    pub fn new(inner: P, max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff_base,
        }
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for RetryingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..=self.max_retries {
            match self.inner.send(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        err = %e,
                        "llm send failed"
                    );
                    let retriable = !matches!(e, ProviderError::RateLimited { .. });
                    last_err = Some(e);
                    if attempt < self.max_retries && retriable {
                        let backoff = self.backoff_base * 2u32.pow(attempt);
                        tokio::time::sleep(backoff).await;
                    } else if !retriable {
                        break;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable(self.inner.name().to_string())))
    }
}
