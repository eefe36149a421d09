//! Google Gemini generateContent adapter.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::CLOUD_TIMEOUT;
use crate::request::{CanonicalRequest, CanonicalResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Blended USD cost per 1K tokens.
const COST_PER_1K_TOKENS: f64 = 0.0008;

/// Adapter for the Gemini `models/{model}:generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    http: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GeminiAdapter {
    /// Create an adapter against the public Gemini endpoint.
    ///
    /// `default_model` falls back to a standard identifier when the
    /// configuration leaves it blank.
    pub fn new(
        api_key: impl Into<String>,
        default_model: Option<String>,
    ) -> ProviderResult<Self> {
        Self::with_base_url(api_key, default_model, DEFAULT_BASE_URL)
    }

    /// Create an adapter against a custom endpoint (tests, proxies).
    pub fn with_base_url(
        api_key: impl Into<String>,
        default_model: Option<String>,
        base_url: impl Into<String>,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("gemini api_key".into()));
        }
        let http = Client::builder()
            .timeout(CLOUD_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Ok(Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> &[&'static str] {
        &["chat", "reasoning"]
    }

    async fn check_health(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * COST_PER_1K_TOKENS
    }

    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);

        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system_prompt.as_deref().map(|system| RequestContent {
                parts: vec![RequestPart { text: system }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        tracing::debug!(model, "dispatching Gemini generateContent request");
        let started = Instant::now();
        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, CLOUD_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), detail));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::DecodeFailure(e.to_string()))?;
        let latency = started.elapsed();

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::DecodeFailure("response contained no candidates".into())
        })?;
        let content = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        let mut out = CanonicalResponse {
            content,
            model: parsed.model_version.unwrap_or_else(|| model.to_string()),
            prompt_tokens: parsed.usage_metadata.prompt_token_count,
            completion_tokens: parsed.usage_metadata.candidates_token_count,
            total_tokens: parsed.usage_metadata.total_token_count,
            latency,
            stop_reason: candidate.finish_reason,
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
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_maps_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "hello"}]}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "hi there"}]},
                    "finishReason": "STOP",
                }],
                "usageMetadata": {
                    "promptTokenCount": 2,
                    "candidatesTokenCount": 3,
                    "totalTokenCount": 5,
                },
                "modelVersion": "gemini-1.5-flash-002",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GeminiAdapter::with_base_url("test-key", None, server.uri()).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let response = adapter.complete(&request).await.unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(response.model, "gemini-1.5-flash-002");
        assert_eq!(response.total_tokens, 5);
        assert_eq!(response.stop_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn test_configured_model_is_used() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = GeminiAdapter::with_base_url(
            "test-key",
            Some("gemini-1.5-pro".into()),
            server.uri(),
        )
        .unwrap();
        let request = CanonicalRequest::builder("hello").build();
        adapter.complete(&request).await.unwrap();
    }
}
