//! Actor — drafts hypothesis slates from assembled prompts.
//!
//! The actor owns nothing but its model capability and retry knobs. Output
//! is parse-or-fail: malformed structured output gets a bounded number of
//! reformat attempts (the parse error is appended to the prompt, and the
//! model asked to fix it) before surfacing `GenerationFailure`.

use crate::model::Hypothesis;
use crate::prompt::SYSTEM_PROMPT;
use crate::provider::{complete_with_retry, CompletionOptions, ModelProvider, ProviderError};
use crate::structured;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from the generation step.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Structured output stayed malformed through the reformat budget.
    #[error("generation failed: {0}")]
    GenerationFailure(String),
}

/// Tuning for external calls, shared by actor and critic.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub provider_retries: u32,
    pub backoff: Duration,
    /// How many times malformed structured output is sent back for reformatting.
    pub reformat_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            provider_retries: 2,
            backoff: Duration::from_millis(250),
            reformat_retries: 1,
        }
    }
}

/// Drafts hypotheses via the injected model capability.
pub struct Actor {
    provider: Arc<dyn ModelProvider>,
    policy: CallPolicy,
}

impl Actor {
    pub fn new(provider: Arc<dyn ModelProvider>, policy: CallPolicy) -> Self {
        Self { provider, policy }
    }

    /// Generate a slate of hypotheses from a prompt.
    ///
    /// Every hypothesis field must be present in the model output; a
    /// missing field is a parse failure, not a default.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<Hypothesis>, ActorError> {
        let options = CompletionOptions {
            system: Some(SYSTEM_PROMPT.to_string()),
            ..CompletionOptions::default()
        };

        let mut current_prompt = prompt.to_string();
        let mut last_error = None;
        for attempt in 0..=self.policy.reformat_retries {
            let text = complete_with_retry(
                self.provider.as_ref(),
                &current_prompt,
                &options,
                self.policy.timeout,
                self.policy.provider_retries,
                self.policy.backoff,
            )
            .await?;

            match structured::parse_slate(&text) {
                Ok(slate) => {
                    tracing::debug!(slate = slate.len(), attempt, "actor produced slate");
                    return Ok(slate);
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "slate parse failed");
                    current_prompt = format!(
                        "{}\n\nYour previous reply could not be parsed: {}.\n\
                         Respond again with ONLY the JSON described above, \
                         fixing all validation errors.",
                        prompt, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ActorError::GenerationFailure(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no parse attempt recorded".to_string()),
        ))
    }
}
