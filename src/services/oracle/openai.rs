use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Oracle, Prompt};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Trimmed text of the first choice
    fn into_text(self) -> AppResult<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::Oracle("No response from OpenAI".to_string()))
    }
}

/// Chat-completions client answering every prompt as a single user message
pub struct OpenAiOracle {
    http_client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait::async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, prompt: &Prompt) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.api_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.text,
            }],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        tracing::debug!(model = %self.model, max_tokens = prompt.max_tokens, "OpenAI chat request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Oracle(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Oracle(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Oracle(format!("Unreadable OpenAI response: {}", e)))?;

        chat_response.into_text()
    }
}
