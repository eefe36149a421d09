//! OpenAI chat-completions adapter.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::CLOUD_TIMEOUT;
use crate::request::{CanonicalRequest, CanonicalResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Blended USD cost per 1K tokens.
const COST_PER_1K_TOKENS: f64 = 0.03;

/// Adapter for the OpenAI `/v1/chat/completions` API.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    /// Create an adapter against the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create an adapter against a custom endpoint (compatible gateways,
    /// tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("openai api_key".into()));
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
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> &[&'static str] {
        &["chat", "reasoning", "code"]
    }

    async fn check_health(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * COST_PER_1K_TOKENS
    }

    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatCompletionRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(model, "dispatching OpenAI chat completion");
        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, CLOUD_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), detail));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::DecodeFailure(e.to_string()))?;
        let latency = started.elapsed();

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::DecodeFailure("response contained no choices".into()))?;

        let mut out = CanonicalResponse {
            content: choice.message.content,
            model: if parsed.model.is_empty() {
                model.to_string()
            } else {
                parsed.model
            },
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
            total_tokens: parsed.usage.total_tokens,
            latency,
            stop_reason: choice.finish_reason,
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
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "hello"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-3.5-turbo-0125",
                "choices": [{
                    "message": {"role": "assistant", "content": "hi there"},
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 4, "completion_tokens": 3, "total_tokens": 7},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let response = adapter.complete(&request).await.unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(response.model, "gpt-3.5-turbo-0125");
        assert_eq!(response.total_tokens, 7);
        assert_eq!(response.stop_reason.as_deref(), Some("stop"));
        assert!(response.latency.as_nanos() > 0);
    }

    #[tokio::test]
    async fn test_system_prompt_becomes_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "hello"},
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello")
            .system_prompt("be terse")
            .build();
        adapter.complete(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let err = adapter.complete(&request).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[tokio::test]
    async fn test_rate_limit_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::with_base_url("test-key", server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let err = adapter.complete(&request).await.unwrap_err();
        assert_eq!(err.kind(), "rate_limited");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(OpenAiAdapter::new("").is_err());
    }

    #[test]
    fn test_cost_estimate_is_deterministic() {
        let adapter = OpenAiAdapter::new("k").unwrap();
        assert!((adapter.estimate_cost(1000) - 0.03).abs() < f64::EPSILON);
        assert_eq!(adapter.estimate_cost(0), 0.0);
    }
}
