//! The uniform provider adapter contract.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::request::{CanonicalRequest, CanonicalResponse};

/// Contract implemented by every upstream provider adapter.
///
/// Each adapter owns its HTTP/AWS client and credentials independently;
/// there is no shared base implementation. Adapters enforce their own
/// per-call timeout (30s for cloud providers, 120s for Ollama).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name ("openai", "anthropic", "bedrock", "ollama",
    /// "gemini").
    fn name(&self) -> &str;

    /// Descriptive capability tags (e.g., "chat", "reasoning", "code",
    /// "self_hosted", "hipaa_compliant").
    fn capabilities(&self) -> &[&'static str];

    /// Cheap health probe: credentials present for cloud adapters, an
    /// endpoint ping for self-hosted ones. Called by the health monitor;
    /// never on the request path.
    async fn check_health(&self) -> bool;

    /// Deterministic cost estimate in USD for a token count.
    fn estimate_cost(&self, tokens: u32) -> f64;

    /// Translate the request to the upstream protocol, dispatch it, and
    /// parse the response back. `request.model` overrides the adapter's
    /// configured default model.
    async fn complete(&self, request: &CanonicalRequest) -> ProviderResult<CanonicalResponse>;
}
