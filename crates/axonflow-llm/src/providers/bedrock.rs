//! AWS Bedrock InvokeModel adapter.
//!
//! SigV4 authentication is handled by the AWS SDK credential chain. The
//! request body shape and response parser are chosen by *model family*,
//! resolved from the model-id's dotted prefix after stripping one optional
//! regional inference-profile prefix.

use std::time::Instant;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::ProviderAdapter;
use crate::error::{ProviderError, ProviderResult};
use crate::providers::CLOUD_TIMEOUT;
use crate::request::{CanonicalRequest, CanonicalResponse};

/// Blended USD cost per 1K tokens.
const COST_PER_1K_TOKENS: f64 = 0.008;

/// Regional inference-profile prefixes. At most one is stripped from the
/// front of a model id before family resolution.
const REGIONAL_PREFIXES: [&str; 4] = ["eu", "us", "apac", "global"];

/// Model families with distinct request templates and response parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Anthropic,
    Amazon,
    Meta,
    Mistral,
}

impl ModelFamily {
    /// Resolve the family from a model id such as
    /// `eu.anthropic.claude-3-5-sonnet-20240620-v1:0` or
    /// `amazon.titan-text-express-v1`.
    pub fn resolve(model_id: &str) -> ProviderResult<Self> {
        let mut segments = model_id.split('.');
        let first = segments.next().unwrap_or_default();
        let family = if REGIONAL_PREFIXES.contains(&first) {
            segments.next().unwrap_or_default()
        } else {
            first
        };
        match family {
            "anthropic" => Ok(ModelFamily::Anthropic),
            "amazon" => Ok(ModelFamily::Amazon),
            "meta" => Ok(ModelFamily::Meta),
            "mistral" => Ok(ModelFamily::Mistral),
            _ => Err(ProviderError::UnsupportedModel(model_id.to_string())),
        }
    }

    /// Build the family-specific request body.
    fn build_body(&self, request: &CanonicalRequest) -> serde_json::Value {
        match self {
            ModelFamily::Anthropic => {
                let mut body = json!({
                    "anthropic_version": "bedrock-2023-05-31",
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                    "messages": [{"role": "user", "content": request.prompt}],
                });
                if let Some(system) = &request.system_prompt {
                    body["system"] = json!(system);
                }
                body
            }
            ModelFamily::Amazon => json!({
                "inputText": flatten_prompt(request),
                "textGenerationConfig": {
                    "maxTokenCount": request.max_tokens,
                    "temperature": request.temperature,
                    "topP": 0.9,
                },
            }),
            ModelFamily::Meta => json!({
                "prompt": flatten_prompt(request),
                "max_gen_len": request.max_tokens,
                "temperature": request.temperature,
                "top_p": 0.9,
            }),
            ModelFamily::Mistral => json!({
                "prompt": flatten_prompt(request),
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "top_p": 0.9,
            }),
        }
    }

    /// Parse the family-specific response payload.
    fn parse_response(&self, payload: &[u8]) -> ProviderResult<ParsedCompletion> {
        match self {
            ModelFamily::Anthropic => {
                let body: AnthropicBody = decode(payload)?;
                let content = body
                    .content
                    .into_iter()
                    .next()
                    .map(|block| block.text)
                    .unwrap_or_default();
                Ok(ParsedCompletion {
                    content,
                    prompt_tokens: body.usage.input_tokens,
                    completion_tokens: body.usage.output_tokens,
                    stop_reason: body.stop_reason,
                })
            }
            ModelFamily::Amazon => {
                let body: AmazonBody = decode(payload)?;
                let result = body.results.into_iter().next().unwrap_or_default();
                Ok(ParsedCompletion {
                    content: result.output_text,
                    prompt_tokens: body.input_text_token_count,
                    completion_tokens: result.token_count,
                    stop_reason: result.completion_reason,
                })
            }
            ModelFamily::Meta => {
                let body: MetaBody = decode(payload)?;
                Ok(ParsedCompletion {
                    content: body.generation,
                    prompt_tokens: body.prompt_token_count,
                    completion_tokens: body.generation_token_count,
                    stop_reason: body.stop_reason,
                })
            }
            ModelFamily::Mistral => {
                let body: MistralBody = decode(payload)?;
                let output = body.outputs.into_iter().next().unwrap_or_default();
                // Mistral reports no token counts.
                Ok(ParsedCompletion {
                    content: output.text,
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    stop_reason: output.stop_reason,
                })
            }
        }
    }
}

/// Titan/Llama/Mistral templates take a single flat prompt; fold the
/// system prompt in when present.
fn flatten_prompt(request: &CanonicalRequest) -> String {
    match &request.system_prompt {
        Some(system) => format!("{system}\n\n{}", request.prompt),
        None => request.prompt.clone(),
    }
}

fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> ProviderResult<T> {
    serde_json::from_slice(payload).map_err(|e| ProviderError::DecodeFailure(e.to_string()))
}

#[derive(Debug)]
struct ParsedCompletion {
    content: String,
    prompt_tokens: u32,
    completion_tokens: u32,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBody {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AmazonBody {
    #[serde(default)]
    results: Vec<AmazonResult>,
    #[serde(default, rename = "inputTextTokenCount")]
    input_text_token_count: u32,
}

#[derive(Debug, Default, Deserialize)]
struct AmazonResult {
    #[serde(default, rename = "outputText")]
    output_text: String,
    #[serde(default, rename = "tokenCount")]
    token_count: u32,
    #[serde(default, rename = "completionReason")]
    completion_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaBody {
    #[serde(default)]
    generation: String,
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    generation_token_count: u32,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MistralBody {
    #[serde(default)]
    outputs: Vec<MistralOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct MistralOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Adapter for AWS Bedrock runtime `InvokeModel`.
#[derive(Debug, Clone)]
pub struct BedrockAdapter {
    client: Client,
    region: String,
    default_model: String,
}

impl BedrockAdapter {
    /// Create an adapter for a region and default model id. Credentials
    /// come from the SDK's standard chain (env, profile, IMDS).
    pub async fn new(
        region: impl Into<String>,
        default_model: impl Into<String>,
    ) -> ProviderResult<Self> {
        let region = region.into();
        let default_model = default_model.into();
        if region.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("bedrock region".into()));
        }
        if default_model.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("bedrock model".into()));
        }
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        Ok(Self {
            client: Client::new(&config),
            region,
            default_model,
        })
    }

    /// The configured AWS region.
    pub fn region(&self) -> &str {
        &self.region
    }
}

fn map_sdk_error<R>(err: SdkError<InvokeModelError, R>) -> ProviderError {
    match err {
        SdkError::ServiceError(ctx) => {
            let service = ctx.err();
            let message = service
                .meta()
                .message()
                .unwrap_or("bedrock invocation failed")
                .to_string();
            if service.is_throttling_exception() {
                ProviderError::RateLimited(message)
            } else if service.is_access_denied_exception() {
                ProviderError::Unauthorized(message)
            } else if service.is_validation_exception()
                || service.is_resource_not_found_exception()
            {
                ProviderError::BadRequest(message)
            } else if service.is_model_timeout_exception() {
                ProviderError::Timeout(CLOUD_TIMEOUT)
            } else {
                ProviderError::UpstreamUnavailable(message)
            }
        }
        SdkError::TimeoutError(_) => ProviderError::Timeout(CLOUD_TIMEOUT),
        other => ProviderError::UpstreamUnavailable(other.to_string()),
    }
}

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn capabilities(&self) -> &[&'static str] {
        &["chat", "reasoning", "hipaa_compliant"]
    }

    async fn check_health(&self) -> bool {
        !self.region.trim().is_empty() && !self.default_model.trim().is_empty()
    }

    fn estimate_cost(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * COST_PER_1K_TOKENS
    }

    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let family = ModelFamily::resolve(model)?;
        let body = family.build_body(request);
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ProviderError::BadRequest(format!("failed to encode body: {e}")))?;

        tracing::debug!(model, family = ?family, region = %self.region, "dispatching Bedrock InvokeModel");
        let started = Instant::now();
        let call = self
            .client
            .invoke_model()
            .model_id(model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send();
        let output = tokio::time::timeout(CLOUD_TIMEOUT, call)
            .await
            .map_err(|_| ProviderError::Timeout(CLOUD_TIMEOUT))?
            .map_err(map_sdk_error)?;
        let latency = started.elapsed();

        let parsed = family.parse_response(output.body.as_ref())?;
        let mut out = CanonicalResponse {
            content: parsed.content,
            model: model.to_string(),
            prompt_tokens: parsed.prompt_tokens,
            completion_tokens: parsed.completion_tokens,
            total_tokens: 0,
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
    use pretty_assertions::assert_eq;

    #[test]
    fn test_family_resolution_plain() {
        assert_eq!(
            ModelFamily::resolve("anthropic.claude-3-5-sonnet-20240620-v1:0").unwrap(),
            ModelFamily::Anthropic
        );
        assert_eq!(
            ModelFamily::resolve("amazon.titan-text-express-v1").unwrap(),
            ModelFamily::Amazon
        );
        assert_eq!(
            ModelFamily::resolve("meta.llama3-70b-instruct-v1:0").unwrap(),
            ModelFamily::Meta
        );
        assert_eq!(
            ModelFamily::resolve("mistral.mistral-large-2402-v1:0").unwrap(),
            ModelFamily::Mistral
        );
    }

    #[test]
    fn test_family_resolution_strips_regional_prefix() {
        assert_eq!(
            ModelFamily::resolve("eu.anthropic.claude-3-5-sonnet-20240620-v1:0").unwrap(),
            ModelFamily::Anthropic
        );
        assert_eq!(
            ModelFamily::resolve("us.meta.llama3-70b-instruct-v1:0").unwrap(),
            ModelFamily::Meta
        );
        assert_eq!(
            ModelFamily::resolve("apac.amazon.titan-text-lite-v1").unwrap(),
            ModelFamily::Amazon
        );
        assert_eq!(
            ModelFamily::resolve("global.mistral.mistral-small-2402-v1:0").unwrap(),
            ModelFamily::Mistral
        );
    }

    #[test]
    fn test_unknown_prefix_is_not_stripped() {
        // "xx" is not a regional prefix, so the family segment is "xx"
        // and resolution fails.
        let err = ModelFamily::resolve("xx.anthropic.claude-3-5-sonnet-20240620-v1:0")
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported_model");
    }

    #[test]
    fn test_unknown_family_is_rejected() {
        let err = ModelFamily::resolve("cohere.command-r-v1:0").unwrap_err();
        assert_eq!(err.kind(), "unsupported_model");
    }

    #[test]
    fn test_anthropic_body_shape() {
        let request = CanonicalRequest::builder("hello")
            .system_prompt("be terse")
            .max_tokens(256)
            .temperature(0.2)
            .build();
        let body = ModelFamily::Anthropic.build_body(&request);
        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["system"], "be terse");
    }

    #[test]
    fn test_amazon_body_shape() {
        let request = CanonicalRequest::builder("hello").max_tokens(128).build();
        let body = ModelFamily::Amazon.build_body(&request);
        assert_eq!(body["inputText"], "hello");
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], 128);
        assert_eq!(body["textGenerationConfig"]["topP"], 0.9);
    }

    #[test]
    fn test_meta_and_mistral_body_shapes() {
        let request = CanonicalRequest::builder("hello").max_tokens(64).build();
        let meta = ModelFamily::Meta.build_body(&request);
        assert_eq!(meta["prompt"], "hello");
        assert_eq!(meta["max_gen_len"], 64);
        assert_eq!(meta["top_p"], 0.9);

        let mistral = ModelFamily::Mistral.build_body(&request);
        assert_eq!(mistral["prompt"], "hello");
        assert_eq!(mistral["max_tokens"], 64);
    }

    #[test]
    fn test_anthropic_response_parsing() {
        let payload = serde_json::json!({
            "content": [{"type": "text", "text": "bonjour"}],
            "usage": {"input_tokens": 12, "output_tokens": 4},
            "stop_reason": "end_turn",
        });
        let parsed = ModelFamily::Anthropic
            .parse_response(&serde_json::to_vec(&payload).unwrap())
            .unwrap();
        assert_eq!(parsed.content, "bonjour");
        assert_eq!(parsed.prompt_tokens, 12);
        assert_eq!(parsed.completion_tokens, 4);
    }

    #[test]
    fn test_amazon_response_parsing() {
        let payload = serde_json::json!({
            "inputTextTokenCount": 7,
            "results": [{"outputText": "hi", "tokenCount": 2, "completionReason": "FINISH"}],
        });
        let parsed = ModelFamily::Amazon
            .parse_response(&serde_json::to_vec(&payload).unwrap())
            .unwrap();
        assert_eq!(parsed.content, "hi");
        assert_eq!(parsed.prompt_tokens, 7);
        assert_eq!(parsed.completion_tokens, 2);
    }

    #[test]
    fn test_mistral_response_has_no_token_counts() {
        let payload = serde_json::json!({
            "outputs": [{"text": "salut", "stop_reason": "stop"}],
        });
        let parsed = ModelFamily::Mistral
            .parse_response(&serde_json::to_vec(&payload).unwrap())
            .unwrap();
        assert_eq!(parsed.content, "salut");
        assert_eq!(parsed.prompt_tokens, 0);
        assert_eq!(parsed.completion_tokens, 0);
    }

    #[test]
    fn test_malformed_payload_is_decode_failure() {
        let err = ModelFamily::Meta.parse_response(b"not json").unwrap_err();
        assert_eq!(err.kind(), "decode_failure");
    }

    #[test]
    fn test_system_prompt_flattened_for_flat_templates() {
        let request = CanonicalRequest::builder("question")
            .system_prompt("context")
            .build();
        let body = ModelFamily::Meta.build_body(&request);
        assert_eq!(body["prompt"], "context\n\nquestion");
    }
}
