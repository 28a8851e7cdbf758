//! OpenAI-compatible chat-completion provider (behind the `openai` feature).
//!
//! Works against any endpoint speaking the `/v1/chat/completions` shape.
//! The engine hands it prompts; credentials stay inside this client.

use super::{CompletionOptions, ModelProvider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Point at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(Duration::from_secs(0))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(body));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Auth(format!("status {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("response carried no choices".to_string()))
    }
}
