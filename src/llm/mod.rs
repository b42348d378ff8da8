pub mod providers;
pub mod quiz_generation;
pub mod response;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use self::quiz_generation::GenerationMode;

/// Generative-language configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Base URL of the generative-language REST API
    pub endpoint: String,
    /// API key, passed explicitly into the provider
    pub api_key: Option<String>,
    pub model: String,
    /// Prompt/schema variant in effect for this deployment
    pub generation_mode: GenerationMode,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            generation_mode: GenerationMode::default(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    /// Send a single prompt and return the raw text answer
    async fn generate(&self, prompt: &str) -> Result<LLMResponse>;
    fn name(&self) -> &str;
}

/// Create the configured LLM provider
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    Ok(Box::new(providers::GeminiProvider::new(config.clone())?))
}
