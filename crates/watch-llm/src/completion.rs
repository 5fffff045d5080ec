//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// Request for a text completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (provider-specific)
    pub model: String,

    /// Conversation so far
    pub messages: Vec<Message>,

    /// Optional system prompt, sent ahead of `messages`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    /// Sampling temperature (0.0-1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from a completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated assistant message
    pub message: Message,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Token usage statistics
    pub usage: TokenUsage,
}

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion
    EndTurn,

    /// Hit max tokens limit
    MaxTokens,

    /// Output withheld by a content filter
    ContentFilter,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: usize,

    /// Number of output tokens
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

impl CompletionRequest {
    /// Create a builder for completion requests
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(model)
    }
}

impl CompletionResponse {
    /// Generated text, trimmed
    pub fn text(&self) -> &str {
        self.message.text().trim()
    }
}

/// Builder for [`CompletionRequest`]
pub struct CompletionRequestBuilder {
    model: String,
    messages: Vec<Message>,
    system: Option<String>,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl CompletionRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Add a single message
    pub fn add_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the completion request
    pub fn build(self) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            messages: self.messages,
            system: self.system,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_builder() {
        let request = CompletionRequest::builder("gpt-4o-mini")
            .add_message(Message::user("Summarise AAPL"))
            .system("You are an equity analyst")
            .max_tokens(2048)
            .temperature(0.3)
            .build();

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.system.as_deref(), Some("You are an equity analyst"));
    }

    #[test]
    fn test_response_text_is_trimmed() {
        let response = CompletionResponse {
            message: Message {
                role: Role::Assistant,
                content: "\n  Outlook: neutral.  \n".to_string(),
            },
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        };
        assert_eq!(response.text(), "Outlook: neutral.");
    }

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }
}
