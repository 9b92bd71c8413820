use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::{ensure_success, LanguageModel, Sampling};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    sampling: Sampling,
}

impl OpenAiClient {
    pub fn new(client: Client, api_key: &str, sampling: Sampling) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            sampling,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.sampling.model,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = ensure_success(response, "OpenAI").await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("OpenAI returned no message content".to_string()))
    }
}
