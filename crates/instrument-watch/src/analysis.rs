//! Narrative analysis generation

use crate::config::WatchConfig;
use crate::error::Result;
use crate::prompts;
use crate::record::InstrumentRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use watch_llm::{CompletionRequest, LLMError, LLMProvider, Message};

const SYSTEM_PROMPT: &str = "You are a careful financial analyst. Base every statement on the \
data provided and say plainly when a section is unavailable.";

/// Produces the analysis text for a record
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisGenerator: Send + Sync {
    /// Generate a non-empty narrative for `record`
    async fn generate(&self, record: &InstrumentRecord) -> Result<String>;
}

/// Renders the kind-specific prompt and asks an [`LLMProvider`] for the report
pub struct LlmAnalysisGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl LlmAnalysisGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    /// Use the model and sampling settings from `config`
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &WatchConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_analysis_tokens,
            temperature: config.analysis_temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnalysisGenerator for LlmAnalysisGenerator {
    async fn generate(&self, record: &InstrumentRecord) -> Result<String> {
        let prompt = prompts::analysis_prompt(record)?;
        debug!(
            ticker = %record.ticker,
            kind = %record.kind,
            prompt_chars = prompt.len(),
            "Requesting analysis"
        );

        let request = CompletionRequest::builder(&self.model)
            .system(SYSTEM_PROMPT)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = self.provider.complete(request).await?;
        let text = response.text();
        if text.is_empty() {
            return Err(LLMError::EmptyCompletion(self.provider.name().to_string()).into());
        }

        info!(
            ticker = %record.ticker,
            provider = self.provider.name(),
            output_tokens = response.usage.output_tokens,
            "Analysis generated"
        );
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::record::Section;
    use crate::testing::{FakeLlm, sample_record};
    use crate::ticker::InstrumentKind;

    #[tokio::test]
    async fn test_generate_returns_trimmed_text() {
        let llm = Arc::new(FakeLlm::replying("  Solid quarter. HOLD.  "));
        let generator = LlmAnalysisGenerator::new(llm.clone(), "test-model");

        let text = generator
            .generate(&sample_record("AAPL", InstrumentKind::Stock))
            .await
            .unwrap();

        assert_eq!(text, "Solid quarter. HOLD.");
        let request = llm.last_request().unwrap();
        assert_eq!(request.model, "test-model");
        assert!(request.system.is_some());
        assert!(request.messages[0].text().contains("**AAPL**"));
    }

    #[tokio::test]
    async fn test_etf_uses_etf_prompt() {
        let llm = Arc::new(FakeLlm::replying("Broad fund."));
        let generator = LlmAnalysisGenerator::new(llm.clone(), "m");

        let mut record = sample_record("SPY", InstrumentKind::Etf);
        record.holdings = Section::unavailable("holdings timed out");
        generator.generate(&record).await.unwrap();

        let prompt = llm.last_request().unwrap().messages[0].text().to_string();
        assert!(prompt.contains("the ETF **SPY**"));
        assert!(prompt.contains("unavailable: holdings timed out"));
    }

    #[tokio::test]
    async fn test_blank_completion_is_error() {
        let generator = LlmAnalysisGenerator::new(Arc::new(FakeLlm::replying("   ")), "m");
        let result = generator
            .generate(&sample_record("AAPL", InstrumentKind::Stock))
            .await;
        assert!(matches!(
            result,
            Err(WatchError::LlmError(LLMError::EmptyCompletion(_)))
        ));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let generator = LlmAnalysisGenerator::new(Arc::new(FakeLlm::failing()), "m");
        let err = generator
            .generate(&sample_record("AAPL", InstrumentKind::Stock))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("LLM error"));
    }

    #[test]
    fn test_from_config() {
        let config = WatchConfig::builder()
            .model("gpt-4o")
            .max_analysis_tokens(512)
            .build()
            .unwrap();
        let generator = LlmAnalysisGenerator::from_config(Arc::new(FakeLlm::replying("x")), &config);
        assert_eq!(generator.model(), "gpt-4o");
        assert_eq!(generator.max_tokens, 512);
    }
}
