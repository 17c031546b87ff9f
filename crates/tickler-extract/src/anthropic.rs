//! Anthropic Messages API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use tickler_core::ParseResult;

use crate::error::ExtractError;
use crate::provider::{parse_structured_reply, user_prompt, DueDateProvider, ExtractionRequest, SYSTEM_PROMPT};

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Anthropic API key.
    pub api_key: String,
    /// Base URL for the API (defaults to `https://api.anthropic.com`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API version header value.
    pub api_version: String,
    /// Max tokens for the reply. The structured reply is tiny.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create a new Anthropic config.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 256,
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Extraction provider backed by `/v1/messages`.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new provider.
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DueDateProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<ParseResult, ExtractError> {
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [
                {"role": "user", "content": user_prompt(request)},
            ],
        });

        debug!(model = %self.config.model, "requesting Anthropic extraction");

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
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

        let message: MessagesResponse = response.json().await?;
        let text = message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| ExtractError::Malformed("message has no text block".into()))?;

        parse_structured_reply(&text, request.raw_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(raw: &str) -> ExtractionRequest<'_> {
        ExtractionRequest {
            raw_input: raw,
            reference: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            zone: chrono_tz::UTC,
        }
    }

    #[tokio::test]
    async fn test_extracts_from_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "text",
                    "text": "{\"title\": \"Dentist\", \"dueDate\": \"2024-01-16T14:00:00Z\"}"
                }],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(
            AnthropicConfig::new("test-key", "claude-haiku").with_base_url(server.uri()),
        );
        let result = provider.extract(&request("Dentist tomorrow at 2pm")).await.unwrap();

        assert_eq!(result.title, "Dentist");
        assert_eq!(
            result.due_instant,
            Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new(AnthropicConfig::new("k", "m").with_base_url(server.uri()));
        let err = provider.extract(&request("x")).await.unwrap_err();
        assert!(matches!(err, ExtractError::Status { status: 529, .. }));
    }

    #[tokio::test]
    async fn test_unstructured_text_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "I think it's due tomorrow."}]
            })))
            .mount(&server)
            .await;

        let provider =
            AnthropicProvider::new(AnthropicConfig::new("k", "m").with_base_url(server.uri()));
        assert!(provider.extract(&request("x")).await.is_err());
    }
}
