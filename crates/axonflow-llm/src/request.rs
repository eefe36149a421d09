//! Canonical request and response shapes.
//!
//! These are the provider-neutral message types used inside the routing
//! engine. Adapters translate them to each upstream protocol and back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coarse request classifier steering provider and model selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Short factual lookups; eligible for local serving.
    SimpleQuery,
    /// Long-form analysis; routed to reasoning-strong providers.
    ComplexAnalysis,
    /// Code synthesis or transformation.
    CodeGeneration,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::SimpleQuery => write!(f, "simple_query"),
            RequestKind::ComplexAnalysis => write!(f, "complex_analysis"),
            RequestKind::CodeGeneration => write!(f, "code_generation"),
            RequestKind::Other => write!(f, "other"),
        }
    }
}

/// Identity and authorization context of the caller.
///
/// The role and permission names feed the response post-processor's
/// permission table; they are never forwarded upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Caller role (e.g., "user", "service", "admin").
    #[serde(default = "default_role")]
    pub role: String,

    /// Named permissions held by the caller.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Owning organization, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

fn default_role() -> String {
    "user".into()
}

impl Default for CallerIdentity {
    fn default() -> Self {
        Self {
            role: default_role(),
            permissions: Vec::new(),
            org: None,
        }
    }
}

impl CallerIdentity {
    /// Whether the caller holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    /// Whether the caller holds a named permission.
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p == name)
    }
}

/// A provider-neutral completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    /// The user prompt.
    pub prompt: String,

    /// Optional system prompt / instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Maximum tokens to generate (>= 1).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature in [0, 2].
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Explicit model override. When set, it wins over the router's
    /// per-provider model resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Preferred provider name; honored when that provider is healthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,

    /// Request classifier.
    #[serde(default)]
    pub request_kind: RequestKind,

    /// Caller hint: simple queries may be served by a self-hosted provider.
    #[serde(default)]
    pub allow_local: bool,

    /// Caller identity and authorization context.
    #[serde(default)]
    pub caller: CallerIdentity,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

impl CanonicalRequest {
    /// Start building a request from a prompt.
    pub fn builder(prompt: impl Into<String>) -> CanonicalRequestBuilder {
        CanonicalRequestBuilder::new(prompt)
    }

    /// Caller-visible input validation.
    ///
    /// Returns a human-readable reason on failure; the router surfaces it
    /// as an `invalid_request` error and never dispatches.
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        if self.max_tokens < 1 {
            return Err("max_tokens must be at least 1".into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} out of range [0, 2]",
                self.temperature
            ));
        }
        Ok(())
    }
}

/// Builder for canonical requests with a fluent API.
#[derive(Debug)]
pub struct CanonicalRequestBuilder {
    prompt: String,
    system_prompt: Option<String>,
    max_tokens: u32,
    temperature: f32,
    model: Option<String>,
    preferred_provider: Option<String>,
    request_kind: RequestKind,
    allow_local: bool,
    caller: CallerIdentity,
}

impl CanonicalRequestBuilder {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            model: None,
            preferred_provider: None,
            request_kind: RequestKind::default(),
            allow_local: false,
            caller: CallerIdentity::default(),
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn request_kind(mut self, kind: RequestKind) -> Self {
        self.request_kind = kind;
        self
    }

    pub fn allow_local(mut self, allow: bool) -> Self {
        self.allow_local = allow;
        self
    }

    pub fn caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = caller;
        self
    }

    pub fn build(self) -> CanonicalRequest {
        CanonicalRequest {
            prompt: self.prompt,
            system_prompt: self.system_prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            model: self.model,
            preferred_provider: self.preferred_provider,
            request_kind: self.request_kind,
            allow_local: self.allow_local,
            caller: self.caller,
        }
    }
}

/// A provider-neutral completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResponse {
    /// Generated content.
    pub content: String,

    /// The exact upstream model that served the request.
    pub model: String,

    /// Prompt token count (0 when the provider does not report it).
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Completion token count (0 when the provider does not report it).
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total token count; computed as prompt + completion when absent.
    #[serde(default)]
    pub total_tokens: u32,

    /// Wall-clock latency of the upstream call.
    pub latency: Duration,

    /// Upstream stop/finish reason, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Free-form provenance attached by the router.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl CanonicalResponse {
    /// Enforce the token arithmetic invariant: when the upstream does not
    /// report a total, it is the sum; a reported total is never below the
    /// sum of its parts.
    pub fn normalize_tokens(&mut self) {
        let sum = self.prompt_tokens + self.completion_tokens;
        if self.total_tokens < sum {
            self.total_tokens = sum;
        }
    }
}
