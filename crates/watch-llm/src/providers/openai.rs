//! OpenAI-compatible chat-completions provider
//!
//! Works against the hosted OpenAI API as well as any server exposing the
//! same `/chat/completions` contract (local llama.cpp / vLLM deployments,
//! LM Studio, Gemini's OpenAI endpoint, ...).
//!
//! ```no_run
//! use watch_llm::{CompletionRequest, LLMProvider, Message};
//! use watch_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn run() -> watch_llm::Result<()> {
//! let config = OpenAIConfig::new("not-needed").with_api_base("http://localhost:1234/v1");
//! let provider = OpenAIProvider::with_config(config)?;
//!
//! let request = CompletionRequest::builder("local-model")
//!     .add_message(Message::user("Summarise today's AAPL news"))
//!     .build();
//! let response = provider.complete(request).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL of the chat-completions API
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let api_base =
            std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());

        Ok(Self {
            api_key,
            api_base,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Set a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from `OPENAI_API_KEY` / `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending chat completion request");

        let body = ChatRequest {
            model: request.model.clone(),
            messages: build_chat_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

        into_completion(chat, self.name())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// System prompt goes first in the messages array
fn build_chat_messages(system: Option<String>, messages: Vec<Message>) -> Vec<Message> {
    system
        .map(Message::system)
        .into_iter()
        .chain(messages)
        .collect()
}

fn into_completion(chat: ChatResponse, provider: &str) -> Result<CompletionResponse> {
    let choice = chat
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(LLMError::EmptyCompletion(provider.to_string()));
    }

    let stop_reason = match choice.finish_reason.as_deref() {
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ => StopReason::EndTurn,
    };

    let usage = chat.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    debug!(
        "Received completion - stop_reason: {:?}, tokens: {}/{}",
        stop_reason, usage.input_tokens, usage.output_tokens
    );

    Ok(CompletionResponse {
        message: Message {
            role: Role::Assistant,
            content,
        },
        stop_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = OpenAIConfig::new("key").with_api_base("http://localhost:1234/v1/");
        assert_eq!(config.api_base, "http://localhost:1234/v1");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::with_config(OpenAIConfig::new("test-key")).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config().api_base, DEFAULT_OPENAI_API_BASE);
    }

    #[test]
    fn test_system_prompt_goes_first() {
        let messages = build_chat_messages(Some("rules".to_string()), vec![Message::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].text(), "hi");
    }

    #[test]
    fn test_parse_completion() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "Bullish bias."}, "finish_reason": "length"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            }"#,
        )
        .unwrap();

        let response = into_completion(chat, "openai").unwrap();
        assert_eq!(response.text(), "Bullish bias.");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn test_empty_completion_is_error() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "   "}}]}"#,
        )
        .unwrap();

        let err = into_completion(chat, "openai").unwrap_err();
        assert!(matches!(err, LLMError::EmptyCompletion(_)));
    }

    #[test]
    fn test_no_choices_is_error() {
        let chat: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(into_completion(chat, "openai").is_err());
    }
}
