mod openrouter;

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
pub use openrouter::OpenRouterClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider rate limit exceeded")]
    RateLimited,
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM provider request failed: {body}")]
    Provider { status: Option<u16>, body: String },
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    #[error("An API key is required for the LLM provider")]
    MissingApiKey,
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
}

/// A provider-independent chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Sent as the first message when set.
    pub system_message: Option<String>,
    /// Overrides the client's default model.
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Tool definitions in the OpenAI function-calling format.
    pub tools: Vec<Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            system_message: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            tools: Vec::new(),
        }
    }
}

/// Provider settings shared by the client adapters.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub default_model: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl From<&Config> for LlmSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.openrouter_api_key.clone(),
            default_model: config.llm_default_model.clone(),
            request_timeout: config.llm_request_timeout,
            max_retries: config.llm_max_retries,
        }
    }
}

/// A chat completion client of some LLM provider.
#[automock]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends a chat completion request and returns the raw provider response.
    async fn chat_completion(&self, request: ChatRequest) -> Result<Value>;

    /// Whether the provider accepts tool definitions.
    fn supports_tools(&self) -> bool {
        false
    }
}

/// Builds the client of the named provider.
pub fn create_client(provider: &str, settings: LlmSettings) -> Result<Box<dyn LlmClient>> {
    match provider {
        "openrouter" => Ok(Box::new(OpenRouterClient::new(settings)?)),
        other => Err(LlmError::UnsupportedProvider(other.to_string())),
    }
}
