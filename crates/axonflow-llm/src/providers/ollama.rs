//! Self-hosted Ollama adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::LOCAL_TIMEOUT;
use crate::request::{CanonicalRequest, CanonicalResponse};

/// Health probes ping the local daemon; keep them snappy.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Adapter for an Ollama daemon's `/api/generate` endpoint. No auth.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    http: Client,
    endpoint: String,
    default_model: String,
}

impl OllamaAdapter {
    /// Create an adapter against a daemon endpoint
    /// (e.g., `http://localhost:11434`).
    ///
    /// An empty `default_model` is legal: the daemon serves its own
    /// default. A missing endpoint is not.
    pub fn new(
        endpoint: impl Into<String>,
        default_model: Option<String>,
    ) -> ProviderResult<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("ollama endpoint".into()));
        }
        if let Err(err) = Url::parse(&endpoint) {
            return Err(ProviderError::MissingCredentials(format!(
                "ollama endpoint is not a valid URL: {err}"
            )));
        }
        let http = Client::builder()
            .timeout(LOCAL_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    done_reason: Option<String>,
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    fn capabilities(&self) -> &[&'static str] {
        &["chat", "self_hosted"]
    }

    async fn check_health(&self) -> bool {
        let probe = self
            .http
            .get(format!("{}/api/tags", self.endpoint))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        matches!(probe, Ok(response) if response.status().is_success())
    }

    fn estimate_cost(&self, _tokens: u32) -> f64 {
        // Self-hosted inference carries no metered cost.
        0.0
    }

    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);

        let body = GenerateRequest {
            model,
            prompt: &request.prompt,
            system: request.system_prompt.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        tracing::debug!(model, endpoint = %self.endpoint, "dispatching Ollama generate request");
        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, LOCAL_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), detail));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::DecodeFailure(e.to_string()))?;
        let latency = started.elapsed();

        // Ollama does not reliably report usage; fall back to the rough
        // four-characters-per-token estimate.
        let estimated_prompt = (request.prompt.len() / 4) as u32;
        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(estimated_prompt);
        let completion_tokens = parsed.eval_count.unwrap_or(0);

        let mut out = CanonicalResponse {
            content: parsed.response,
            model: if parsed.model.is_empty() {
                model.to_string()
            } else {
                parsed.model
            },
            prompt_tokens,
            completion_tokens,
            total_tokens: 0,
            latency,
            stop_reason: parsed.done_reason,
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_maps_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "prompt": "hello",
                "stream": false,
                "options": {"num_predict": 1024},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "response": "hi there",
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(server.uri(), Some("llama3".into())).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let response = adapter.complete(&request).await.unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(response.model, "llama3");
        // "hello" is 5 bytes: estimated as one prompt token.
        assert_eq!(response.prompt_tokens, 1);
        assert_eq!(response.total_tokens, 1);
    }

    #[tokio::test]
    async fn test_empty_model_is_sent_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": ""})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "daemon-default",
                "response": "ok",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(server.uri(), None).unwrap();
        let request = CanonicalRequest::builder("hello").build();
        let response = adapter.complete(&request).await.unwrap();
        assert_eq!(response.model, "daemon-default");
    }

    #[tokio::test]
    async fn test_health_probe_pings_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(server.uri(), None).unwrap();
        assert!(adapter.check_health().await);
    }

    #[tokio::test]
    async fn test_health_probe_fails_when_daemon_down() {
        let adapter = OllamaAdapter::new("http://127.0.0.1:1", None).unwrap();
        assert!(!adapter.check_health().await);
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        assert!(OllamaAdapter::new("", Some("llama3".into())).is_err());
    }
}
