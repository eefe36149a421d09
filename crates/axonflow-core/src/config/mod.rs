//! Three-tier configuration resolution.
//!
//! Priority descending: database-backed store, YAML config file, process
//! environment. The first tier yielding a non-empty provider list wins;
//! lower tiers only supply optional model identifiers the winning tier
//! left blank.

mod file;
mod store;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use axonflow_llm::{
    AnthropicAdapter, BedrockAdapter, GeminiAdapter, OllamaAdapter, OpenAiAdapter,
};

use crate::router::ProviderEntry;

pub use file::config_file_path;
pub use store::{ConfigStore, NoopConfigStore};

/// Resolved provider configuration for one router build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmRouterConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub bedrock_region: Option<String>,
    pub bedrock_model: Option<String>,
    pub ollama_endpoint: Option<String>,
    pub ollama_model: Option<String>,
}

impl LlmRouterConfig {
    /// Whether this tier configures at least one provider candidate.
    pub fn has_providers(&self) -> bool {
        self.openai_api_key.is_some()
            || self.anthropic_api_key.is_some()
            || self.gemini_api_key.is_some()
            || self.bedrock_region.is_some()
            || self.bedrock_model.is_some()
            || self.ollama_endpoint.is_some()
            || self.ollama_model.is_some()
    }

    /// Merge tiers listed in priority order. The first tier with any
    /// provider wins; only the optional model identifiers fall through
    /// per-field to lower tiers.
    pub fn merge_tiers(tiers: Vec<LlmRouterConfig>) -> LlmRouterConfig {
        let Some(base_index) = tiers.iter().position(LlmRouterConfig::has_providers) else {
            tracing::warn!("no configuration tier yielded any provider");
            return LlmRouterConfig::default();
        };
        let mut resolved = tiers[base_index].clone();
        for lower in &tiers[base_index + 1..] {
            if resolved.gemini_model.is_none() {
                resolved.gemini_model = lower.gemini_model.clone();
            }
            if resolved.ollama_model.is_none() {
                resolved.ollama_model = lower.ollama_model.clone();
            }
        }
        resolved
    }

    /// Build provider entries from the resolved configuration, applying
    /// the enablement rules. Partial configurations disable the provider
    /// with a warning; they are never silently defaulted.
    pub async fn build_entries(&self) -> Vec<ProviderEntry> {
        let mut entries: Vec<ProviderEntry> = Vec::new();

        if let Some(key) = &self.openai_api_key {
            match OpenAiAdapter::new(key) {
                Ok(adapter) => entries.push(ProviderEntry::new("openai", Arc::new(adapter))),
                Err(err) => tracing::warn!(error = %err, "openai disabled"),
            }
        }
        if let Some(key) = &self.anthropic_api_key {
            match AnthropicAdapter::new(key) {
                Ok(adapter) => entries.push(ProviderEntry::new("anthropic", Arc::new(adapter))),
                Err(err) => tracing::warn!(error = %err, "anthropic disabled"),
            }
        }
        if let Some(key) = &self.gemini_api_key {
            match GeminiAdapter::new(key, self.gemini_model.clone()) {
                Ok(adapter) => entries.push(ProviderEntry::new("gemini", Arc::new(adapter))),
                Err(err) => tracing::warn!(error = %err, "gemini disabled"),
            }
        }

        match (&self.bedrock_region, &self.bedrock_model) {
            (Some(region), Some(model)) => match BedrockAdapter::new(region, model).await {
                Ok(adapter) => entries.push(ProviderEntry::new("bedrock", Arc::new(adapter))),
                Err(err) => tracing::warn!(error = %err, "bedrock disabled"),
            },
            (Some(_), None) => {
                tracing::warn!("bedrock region set without model, provider disabled");
            }
            (None, Some(_)) => {
                tracing::warn!("bedrock model set without region, provider disabled");
            }
            (None, None) => {}
        }

        match (&self.ollama_endpoint, &self.ollama_model) {
            (Some(endpoint), model) => {
                if model.is_none() {
                    tracing::warn!("ollama model not set, the daemon default will serve");
                }
                match OllamaAdapter::new(endpoint, model.clone()) {
                    Ok(adapter) => entries.push(ProviderEntry::new("ollama", Arc::new(adapter))),
                    Err(err) => tracing::warn!(error = %err, "ollama disabled"),
                }
            }
            (None, Some(_)) => {
                tracing::warn!("ollama model set without endpoint, provider disabled");
            }
            (None, None) => {}
        }

        if entries.is_empty() {
            tracing::warn!("no providers configured; completions will return no_providers");
        }
        entries
    }

    /// Copy with every credential masked, for status output and logs.
    pub fn masked(&self) -> LlmRouterConfig {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "********".to_string());
        LlmRouterConfig {
            openai_api_key: mask(&self.openai_api_key),
            anthropic_api_key: mask(&self.anthropic_api_key),
            gemini_api_key: mask(&self.gemini_api_key),
            gemini_model: self.gemini_model.clone(),
            bedrock_region: self.bedrock_region.clone(),
            bedrock_model: self.bedrock_model.clone(),
            ollama_endpoint: self.ollama_endpoint.clone(),
            ollama_model: self.ollama_model.clone(),
        }
    }
}

/// Environment variable tier with an injectable lookup.
pub(crate) fn env_tier_with(lookup: &dyn Fn(&str) -> Option<String>) -> LlmRouterConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    LlmRouterConfig {
        openai_api_key: get("OPENAI_API_KEY"),
        anthropic_api_key: get("ANTHROPIC_API_KEY"),
        gemini_api_key: get("GEMINI_API_KEY"),
        gemini_model: None,
        bedrock_region: get("BEDROCK_REGION"),
        bedrock_model: get("BEDROCK_MODEL"),
        ollama_endpoint: get("OLLAMA_ENDPOINT"),
        ollama_model: get("OLLAMA_MODEL"),
    }
}

/// The process-environment tier (lowest priority).
pub fn env_tier() -> LlmRouterConfig {
    env_tier_with(&|name| std::env::var(name).ok())
}

/// Caches resolved configurations per tenant and merges the three tiers
/// on demand.
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    cache: HashMap<String, LlmRouterConfig>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    /// Drop every cached resolution; the next resolve re-reads all tiers.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        tracing::debug!("configuration cache invalidated");
    }

    /// Resolve the configuration for a tenant. Store failures degrade to
    /// the file and environment tiers with a warning.
    pub async fn resolve(&mut self, tenant_id: &str) -> LlmRouterConfig {
        if let Some(cached) = self.cache.get(tenant_id) {
            return cached.clone();
        }

        let store_tier = match self.store.load(tenant_id).await {
            Ok(Some(config)) => config,
            Ok(None) => LlmRouterConfig::default(),
            Err(err) => {
                tracing::warn!(
                    tenant = tenant_id,
                    error = %err,
                    "config store read failed, falling back to lower tiers"
                );
                LlmRouterConfig::default()
            }
        };
        let file_tier = file::load_file_tier();
        let environment_tier = env_tier();

        let resolved =
            LlmRouterConfig::merge_tiers(vec![store_tier, file_tier, environment_tier]);
        self.cache.insert(tenant_id.to_string(), resolved.clone());
        resolved
    }
}
