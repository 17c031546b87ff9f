//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use tickler_core::ParseResult;

use crate::error::ExtractError;
use crate::provider::{parse_structured_reply, user_prompt, DueDateProvider, ExtractionRequest, SYSTEM_PROMPT};

/// Configuration for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL for the API (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
}

impl OpenAiConfig {
    /// Create a new OpenAI config.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extraction provider backed by `/v1/chat/completions`.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider.
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl DueDateProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<ParseResult, ExtractError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
        });

        debug!(model = %self.config.model, "requesting OpenAI extraction");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractError::Malformed("completion has no message content".into()))?;

        parse_structured_reply(&content, request.raw_input)
    }
}
