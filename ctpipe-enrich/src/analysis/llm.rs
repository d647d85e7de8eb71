//! Anthropic Messages API client
//!
//! The classification engine only sees the `LlmClient` trait; tests
//! substitute scripted mock clients and count calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::connectors::{ConnectorError, RateLimiter};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = "ctpipe/0.1.0 (clinical trial enrichment pipeline)";
/// LLM calls get a longer budget than data connectors
const REQUEST_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_MS: u64 = 1000;
/// Response budget per pass
const MAX_TOKENS: u32 = 1000;

/// One model completion with token accounting
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Model completion capability
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, ConnectorError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Anthropic API client
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    rate_limiter: RateLimiter,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, ConnectorError> {
        self.rate_limiter.wait().await;

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(ANTHROPIC_BASE_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(ConnectorError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api(status.as_u16(), error_text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Parse(e.to_string()))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        tracing::debug!(
            model = %parsed.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Model completion received"
        );

        Ok(LlmResponse {
            text,
            model: parsed.model,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AnthropicClient::new("key".to_string(), "claude-3-5-sonnet".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_response_parse() {
        let json = r#"{
            "model": "claude-3-5-sonnet",
            "content": [{"type": "text", "text": "Category: FAILURE_EFFICACY"}],
            "usage": {"input_tokens": 420, "output_tokens": 35}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.content[0].text, "Category: FAILURE_EFFICACY");
        assert_eq!(parsed.usage.input_tokens, 420);
    }
}
