use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, CompletionOptions};
use crate::config::{CompletionEndpointConfig, RequestConfig};
use crate::error::{CompletionError, CompletionResult};
use crate::prompts::AGENT_SYSTEM_PROMPT;

/// Text-completion service interface.
///
/// The only thing the reasoning core asks of the model backend: turn a
/// prompt into generated text, or fail with a [`CompletionError`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a prompt and return the generated text
    async fn complete(&self, prompt: &str, options: &CompletionOptions)
        -> CompletionResult<String>;
}

/// Client for any OpenAI-compatible chat completion endpoint
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

impl HttpCompletionClient {
    /// Create a new client from endpoint and request configuration
    pub fn new(
        config: &CompletionEndpointConfig,
        request_config: &RequestConfig,
    ) -> CompletionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(CompletionError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> CompletionResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(AGENT_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            "Calling completion endpoint"
        );

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else if e.is_connect() {
                    CompletionError::Unreachable {
                        message: e.to_string(),
                    }
                } else {
                    CompletionError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| CompletionError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let text = completion
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| CompletionError::InvalidResponse {
                message: "Response contained no completion choices".to_string(),
            })?
            .trim()
            .to_string();

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis() as u64,
            completion_chars = text.len(),
            "Completion succeeded"
        );

        Ok(text)
    }
}
