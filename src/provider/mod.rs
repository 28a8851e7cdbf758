//! Model-provider capability.
//!
//! The engine never owns credentials or a concrete client; Actor and Critic
//! each receive a `ModelProvider` and nothing more. Two implementations:
//! - `OpenAiProvider`: OpenAI-compatible chat completions over HTTP
//!   (behind the `openai` feature)
//! - `ScriptedProvider`: preconfigured responses (testing)

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "openai")]
mod openai;
#[cfg(feature = "openai")]
pub use openai::OpenAiProvider;

/// Errors from the model-provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Rate limits, timeouts, and transport blips are worth retrying;
    /// auth failures and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Transport(_)
        )
    }
}

/// Knobs for a single completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// System framing prepended to the conversation.
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The callable completion capability: `complete(prompt, options) → text`.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;
}

/// Complete with a per-call timeout and bounded exponential backoff.
///
/// `timeout` bounds each individual call; `retries` bounds how many times a
/// retryable error is retried. Non-retryable errors surface immediately.
pub async fn complete_with_retry(
    provider: &dyn ModelProvider,
    prompt: &str,
    options: &CompletionOptions,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
) -> Result<String, ProviderError> {
    let mut wait = backoff;
    let mut attempt = 0;
    loop {
        let outcome = tokio::time::timeout(timeout, provider.complete(prompt, options)).await;
        let err = match outcome {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout(timeout),
        };
        if !err.is_retryable() || attempt >= retries {
            return Err(err);
        }
        tracing::debug!(attempt, error = %err, "provider call failed, backing off");
        tokio::time::sleep(wait).await;
        wait = wait.saturating_mul(2);
        attempt += 1;
    }
}

/// Scripted provider for testing — pops queued responses in order.
///
/// An exhausted script surfaces as a transport error so tests that
/// under-provision responses fail loudly instead of hanging.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, error: ProviderError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// How many scripted responses remain unconsumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".to_string())))
    }
}
