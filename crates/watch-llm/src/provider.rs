//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for completion providers
///
/// Implementations give access to a hosted or local model. Providers must be
/// shareable across tasks because background refresh jobs and the request
/// path call them concurrently.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name (e.g. "openai")
    fn name(&self) -> &str;
}
