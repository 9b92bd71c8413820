//! Language model clients.

pub mod claude;
pub mod google;
pub mod openai;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{AppError, Result};

pub use claude::ClaudeClient;
pub use google::GeminiClient;
pub use openai::OpenAiClient;

/// A single-turn text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Client for the configured provider.
pub fn build_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let api_key = config.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
        AppError::Config(format!(
            "{} environment variable is required",
            config.provider.api_key_env()
        ))
    })?;
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let settings = Sampling {
        model: config.model_name().to_string(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    tracing::info!(provider = ?config.provider, model = %settings.model, "Using language model");

    let model: Arc<dyn LanguageModel> = match config.provider {
        LlmProvider::Anthropic => Arc::new(ClaudeClient::new(http, api_key, settings)),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(http, api_key, settings)),
        LlmProvider::Google => Arc::new(GeminiClient::new(http, api_key, settings)),
    };
    Ok(model)
}

/// Model and sampling parameters shared by every provider.
#[derive(Debug, Clone)]
pub struct Sampling {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Turn a non-success response into the matching error.
async fn ensure_success(response: Response, provider: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::LlmRateLimited(format!("{provider}: {body}")));
    }
    Err(AppError::Llm(format!("{provider} API returned {status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_api_key() {
        let config = LlmConfig::default();
        match build_language_model(&config) {
            Err(AppError::Config(msg)) => assert!(msg.contains("ANTHROPIC_API_KEY")),
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_build_each_provider() {
        for provider in [LlmProvider::Anthropic, LlmProvider::OpenAi, LlmProvider::Google] {
            let config = LlmConfig {
                provider,
                api_key: Some("key".into()),
                ..Default::default()
            };
            assert!(build_language_model(&config).is_ok());
        }
    }
}
