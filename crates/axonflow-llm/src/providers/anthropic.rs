//! Anthropic messages adapter.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::CLOUD_TIMEOUT;
use crate::request::{CanonicalRequest, CanonicalResponse};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const API_VERSION: &str = "2023-06-01";

/// Blended USD cost per 1K tokens.
const COST_PER_1K_TOKENS: f64 = 0.015;

/// Adapter for the Anthropic `/v1/messages` API.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    http: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicAdapter {
    /// Create an adapter against the public Anthropic endpoint.
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials(
                "anthropic api_key".into(),
            ));
        }
        let http = Client::builder()
            .timeout(CLOUD_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> &[&'static str] {
        &["chat", "reasoning", "code", "hipaa_compliant"]
    }

    async fn check_health(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * COST_PER_1K_TOKENS
    }

    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system_prompt.as_deref(),
        };

        tracing::debug!(model, "dispatching Anthropic messages request");
        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, CLOUD_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), detail));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::DecodeFailure(e.to_string()))?;
        let latency = started.elapsed();

        let content = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| {
                ProviderError::DecodeFailure("response contained no content blocks".into())
            })?;

        let mut out = CanonicalResponse {
            content,
            model: if parsed.model.is_empty() {
                model.to_string()
            } else {
                parsed.model
            },
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
            total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            latency,
            stop_reason: parsed.stop_reason,
            metadata: serde_json::Value::Null,
        };
        out.normalize_tokens();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_maps_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-3-haiku-20240307",
                "messages": [{"role": "user", "content": "hello"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-3-haiku-20240307",
                "content": [{"type": "text", "text": "hi there"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 9, "output_tokens": 5},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let response = adapter.complete(&request).await.unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(response.prompt_tokens, 9);
        assert_eq!(response.completion_tokens, 5);
        // Anthropic reports no total; it is the sum of input and output.
        assert_eq!(response.total_tokens, 14);
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn test_system_prompt_is_top_level_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"system": "be terse"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "ok"}],
                "usage": {"input_tokens": 1, "output_tokens": 1},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello")
            .system_prompt("be terse")
            .build();
        adapter.complete(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let adapter = AnthropicAdapter::with_base_url("bad-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let err = adapter.complete(&request).await.unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
    }
}
