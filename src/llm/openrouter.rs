use std::time::Duration;

use async_trait::async_trait;
use backoff::{Error as BackoffError, ExponentialBackoff, future::retry};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use super::{ChatMessage, ChatRequest, LlmClient, LlmError, LlmSettings, Result};

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Client of the OpenRouter chat completions API.
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    api_key: String,
    default_model: String,
    max_retries: u32,
    initial_retry_interval: Duration,
}

impl OpenRouterClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let api_key = settings.api_key.filter(|k| !k.is_empty()).ok_or(LlmError::MissingApiKey)?;
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        tracing::debug!("OpenRouter client built with model {}", settings.default_model);

        Ok(Self {
            client,
            endpoint: ENDPOINT.to_string(),
            api_key,
            default_model: settings.default_model,
            max_retries: settings.max_retries,
            initial_retry_interval: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    pub(super) fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self.initial_retry_interval = Duration::from_millis(10);
        self
    }

    fn backoff_config(&self) -> ExponentialBackoff {
        // The number of attempts is bounded by `max_retries`, not by time.
        ExponentialBackoff {
            initial_interval: self.initial_retry_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    pub(super) fn build_payload(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system_message.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(request.messages.iter().cloned());

        let mut payload = json!({
            "model": request.model.as_deref().unwrap_or(&self.default_model),
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            payload["tools"] = json!(request.tools);
        }
        payload
    }

    async fn post_with_retries(&self, payload: &Value) -> Result<Value> {
        let mut attempt = 0;
        let operation = move || {
            attempt += 1;
            self.send_once(payload, attempt > self.max_retries)
        };

        retry(self.backoff_config(), operation).await
    }

    /// Sends the payload once. Rate limits and network failures are transient
    /// unless this is the last attempt.
    async fn send_once(
        &self,
        payload: &Value,
        last_attempt: bool,
    ) -> std::result::Result<Value, BackoffError<LlmError>> {
        let retry_or_fail = |err: LlmError| {
            if last_attempt { BackoffError::permanent(err) } else { BackoffError::transient(err) }
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("OpenRouter request failed: {e}");
                retry_or_fail(LlmError::Timeout)
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("OpenRouter rate limit exceeded");
            return Err(retry_or_fail(LlmError::RateLimited));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("OpenRouter returned HTTP {status}: {body}");
            return Err(BackoffError::permanent(LlmError::Provider {
                status: Some(status.as_u16()),
                body,
            }));
        }

        resp.json::<Value>().await.map_err(|e| {
            BackoffError::permanent(LlmError::Provider {
                status: None,
                body: format!("Failed to decode OpenRouter response: {e}"),
            })
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(&self, request: ChatRequest) -> Result<Value> {
        let payload = self.build_payload(&request);
        self.post_with_retries(&payload).await
    }

    fn supports_tools(&self) -> bool {
        true
    }
}
