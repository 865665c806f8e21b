//! Generation backend facade
//!
//! Wraps whichever [`ModelClient`] was configured with the retry policy:
//! a failed call is retried after `base_delay * 2^attempt`, and no sleep
//! follows the final attempt. Exhaustion yields `None`, never an error.

use super::factory::ProviderFactory;
use super::traits::ModelClient;
use super::types::ModelRequest;
use crate::config::{ProviderSettings, RetrySettings};
use crate::types::{ChatMessage, GenerationParams};
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct GenerationBackend {
    client: Box<dyn ModelClient>,
    retry: RetrySettings,
}

impl GenerationBackend {
    pub fn new(provider: &ProviderSettings, retry: RetrySettings) -> Self {
        Self::with_client(ProviderFactory::create(provider), retry)
    }

    pub fn with_client(client: Box<dyn ModelClient>, retry: RetrySettings) -> Self {
        Self { client, retry }
    }

    pub fn provider(&self) -> &str {
        self.client.id()
    }

    /// Produce a reply for `history`, or `None` once every attempt failed.
    pub async fn generate(
        &self,
        history: &[ChatMessage],
        params: &GenerationParams,
    ) -> Option<String> {
        let attempts = self.retry.max_retries.max(1);
        for attempt in 0..attempts {
            let request = ModelRequest {
                model: self.client.model().to_string(),
                messages: history.to_vec(),
                params: *params,
            };
            match self.client.chat(request).await {
                Ok(text) => {
                    debug!(
                        provider = self.client.id(),
                        attempt = attempt + 1,
                        chars = text.len(),
                        "Generation succeeded"
                    );
                    return Some(text);
                }
                Err(err) => {
                    warn!(
                        provider = self.client.id(),
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        %err,
                        "Generation attempt failed"
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(backoff(self.retry.base_delay, attempt)).await;
                    }
                }
            }
        }
        error!(
            provider = self.client.id(),
            attempts, "Max retries reached for generation"
        );
        None
    }
}

/// `base * 2^attempt`, saturating at `Duration::MAX`.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt)).unwrap_or(Duration::MAX)
}
