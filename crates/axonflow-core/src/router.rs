//! The LLM router.
//!
//! Orchestrates provider selection, dispatch, one-shot failover, metrics,
//! and provenance assembly. Selection runs under a short read lock that is
//! released before any outbound call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use axonflow_llm::{CanonicalRequest, CanonicalResponse, ProviderAdapter, RequestKind};

use crate::accounting::{UsageRecord, UsageSink};
use crate::balancer::WeightedBalancer;
use crate::error::{RouterError, RouterResult};
use crate::health::HealthState;
use crate::metrics::{MetricsTracker, ProviderMetrics};

const OPENAI_CODE_MODEL: &str = "gpt-4";
const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const ANTHROPIC_PREMIUM_MODEL: &str = "claude-3-5-sonnet-20241022";
const ANTHROPIC_STANDARD_MODEL: &str = "claude-3-haiku-20240307";

/// Acceptable floating-point slack on the enabled weight sum.
const WEIGHT_SUM_MIN: f64 = 0.99;
const WEIGHT_SUM_MAX: f64 = 1.01;

/// One registered provider: adapter, weight, and enablement.
#[derive(Clone)]
pub struct ProviderEntry {
    pub name: String,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub weight: f64,
    pub enabled: bool,
}

impl ProviderEntry {
    pub fn new(name: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            name: name.into(),
            adapter,
            weight: 0.0,
            enabled: true,
        }
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Point-in-time view of one provider for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub weight: f64,
    pub healthy: bool,
    pub capabilities: Vec<String>,
    pub metrics: ProviderMetrics,
}

/// Router over a set of provider adapters.
pub struct LlmRouter {
    table: RwLock<Vec<ProviderEntry>>,
    health: RwLock<HashMap<String, HealthState>>,
    metrics: MetricsTracker,
    balancer: WeightedBalancer,
    accounting: Arc<dyn UsageSink>,
}

impl LlmRouter {
    /// Build a router over the given entries. Weights are normalized so
    /// the enabled set sums to 1.0; entries start healthy (enablement
    /// already implies their credentials were present).
    pub fn new(mut entries: Vec<ProviderEntry>, accounting: Arc<dyn UsageSink>) -> Self {
        normalize_weights(&mut entries);
        let health = entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| (e.name.clone(), HealthState::new(true)))
            .collect();
        Self {
            table: RwLock::new(entries),
            health: RwLock::new(health),
            metrics: MetricsTracker::new(),
            balancer: WeightedBalancer::new(),
            accounting,
        }
    }

    /// Route a completion request: select, dispatch, fail over at most
    /// once, record metrics, and attach provenance.
    pub async fn complete(&self, request: &CanonicalRequest) -> RouterResult<CanonicalResponse> {
        request.validate().map_err(RouterError::InvalidRequest)?;

        let (primary_name, primary) = self.select_primary(request)?;
        let mut attempt = request.clone();
        attempt.model = resolve_model(&primary_name, request);

        let started = Instant::now();
        match primary.complete(&attempt).await {
            Ok(response) => Ok(self.finish_success(&primary_name, primary.as_ref(), response)),
            Err(err) if err.is_timeout() => {
                // Timeouts are terminal: a fallback would blow the
                // caller's end-to-end latency budget.
                self.metrics.record_error(&primary_name);
                tracing::error!(
                    provider = %primary_name,
                    error_kind = err.kind(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "request timed out, no fallback attempted"
                );
                Err(RouterError::Timeout {
                    provider: primary_name,
                })
            }
            Err(err) => {
                self.metrics.record_error(&primary_name);
                tracing::warn!(
                    provider = %primary_name,
                    error_kind = err.kind(),
                    error = %err,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "primary provider failed"
                );
                let Some((fallback_name, fallback)) = self.select_fallback(&primary_name) else {
                    return Err(RouterError::UpstreamFailure {
                        provider: primary_name,
                        message: err.to_string(),
                    });
                };

                tracing::info!(from = %primary_name, to = %fallback_name, "failing over");
                let mut retry = request.clone();
                retry.model = resolve_model(&fallback_name, request);
                match fallback.complete(&retry).await {
                    Ok(response) => {
                        Ok(self.finish_success(&fallback_name, fallback.as_ref(), response))
                    }
                    Err(final_err) => {
                        self.metrics.record_error(&fallback_name);
                        tracing::error!(
                            provider = %fallback_name,
                            error_kind = final_err.kind(),
                            error = %final_err,
                            latency_ms = started.elapsed().as_millis() as u64,
                            "fallback provider failed"
                        );
                        if final_err.is_timeout() {
                            Err(RouterError::Timeout {
                                provider: fallback_name,
                            })
                        } else {
                            Err(RouterError::UpstreamFailure {
                                provider: fallback_name,
                                message: final_err.to_string(),
                            })
                        }
                    }
                }
            }
        }
    }

    /// Pick the primary provider under a read lock. The returned adapter
    /// handle is used after the lock is released.
    fn select_primary(
        &self,
        request: &CanonicalRequest,
    ) -> RouterResult<(String, Arc<dyn ProviderAdapter>)> {
        let table = self.table.read();
        let health = self.health.read();
        let healthy: Vec<&ProviderEntry> = table
            .iter()
            .filter(|e| e.enabled && health.get(&e.name).is_some_and(|h| h.healthy))
            .collect();
        if healthy.is_empty() {
            return Err(RouterError::NoProviders);
        }

        let pick = |name: &str| {
            healthy
                .iter()
                .find(|e| e.name == name)
                .map(|e| (e.name.clone(), e.adapter.clone()))
        };

        if let Some(preferred) = &request.preferred_provider {
            if let Some(found) = pick(preferred) {
                return Ok(found);
            }
            tracing::debug!(provider = %preferred, "preferred provider not healthy, reselecting");
        }

        match request.request_kind {
            RequestKind::ComplexAnalysis => {
                for name in ["anthropic", "openai"] {
                    if let Some(found) = pick(name) {
                        return Ok(found);
                    }
                }
            }
            RequestKind::SimpleQuery if request.allow_local => {
                if let Some(found) = pick("ollama") {
                    return Ok(found);
                }
            }
            _ => {}
        }

        let candidates: Vec<(&str, f64)> = healthy
            .iter()
            .map(|e| (e.name.as_str(), e.weight))
            .collect();
        let selected = self
            .balancer
            .select(&candidates)
            .ok_or(RouterError::NoProviders)?;
        pick(selected).ok_or(RouterError::NoProviders)
    }

    /// First healthy provider other than the one that just failed.
    fn select_fallback(&self, exclude: &str) -> Option<(String, Arc<dyn ProviderAdapter>)> {
        let table = self.table.read();
        let health = self.health.read();
        table
            .iter()
            .find(|e| {
                e.enabled
                    && e.name != exclude
                    && health.get(&e.name).is_some_and(|h| h.healthy)
            })
            .map(|e| (e.name.clone(), e.adapter.clone()))
    }

    fn finish_success(
        &self,
        provider: &str,
        adapter: &dyn ProviderAdapter,
        mut response: CanonicalResponse,
    ) -> CanonicalResponse {
        response.normalize_tokens();
        self.metrics.record_success(provider, response.latency);

        let estimated_cost = adapter.estimate_cost(response.total_tokens);
        let latency_ms = response.latency.as_millis() as u64;
        if !response.metadata.is_object() {
            response.metadata = json!({});
        }
        response.metadata["provider_info"] = json!({
            "provider": provider,
            "model": response.model,
            "latency_ms": latency_ms,
            "tokens_used": response.total_tokens,
            "estimated_cost": estimated_cost,
        });

        tracing::info!(
            provider,
            model = %response.model,
            latency_ms,
            total_tokens = response.total_tokens,
            "request served"
        );
        self.notify_accounting(provider, &response, estimated_cost);
        response
    }

    /// Fire-and-forget usage accounting; never blocks the response.
    fn notify_accounting(&self, provider: &str, response: &CanonicalResponse, cost: f64) {
        let record = UsageRecord {
            id: Uuid::new_v4(),
            provider: provider.to_string(),
            model: response.model.clone(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            total_tokens: response.total_tokens,
            estimated_cost: cost,
            latency_ms: response.latency.as_millis() as u64,
            recorded_at: Utc::now(),
        };
        let sink = self.accounting.clone();
        tokio::spawn(async move {
            if let Err(err) = sink.record(record).await {
                tracing::warn!(error = %err, "usage accounting write failed");
            }
        });
    }

    /// Probe every enabled adapter and publish health transitions. Called
    /// by the health monitor; no lock is held across a probe.
    pub async fn probe_health(&self) {
        let adapters: Vec<(String, Arc<dyn ProviderAdapter>)> = {
            let table = self.table.read();
            table
                .iter()
                .filter(|e| e.enabled)
                .map(|e| (e.name.clone(), e.adapter.clone()))
                .collect()
        };
        for (name, adapter) in adapters {
            let healthy = adapter.check_health().await;
            let mut health = self.health.write();
            let previous = health.get(&name).map(|h| h.healthy);
            if previous != Some(healthy) {
                tracing::info!(provider = %name, healthy, "provider health transition");
            }
            health.insert(name, HealthState::new(healthy));
        }
    }

    /// Force-publish a health state, bypassing the probe. Used by status
    /// tooling and tests.
    pub fn set_health(&self, provider: &str, healthy: bool) {
        self.health
            .write()
            .insert(provider.to_string(), HealthState::new(healthy));
    }

    /// Replace all provider weights atomically.
    ///
    /// Every registered provider must be named, every weight must lie in
    /// [0, 1], and the enabled weights must sum to 1.0 within slack. Any
    /// violation rejects the whole update and retains the old weights.
    pub fn update_weights(&self, weights: &HashMap<String, f64>) -> RouterResult<()> {
        let mut table = self.table.write();
        if table.is_empty() {
            if weights.is_empty() {
                return Ok(());
            }
            return Err(RouterError::InvalidWeights(
                "no providers registered".into(),
            ));
        }

        for name in weights.keys() {
            if !table.iter().any(|e| &e.name == name) {
                return Err(RouterError::InvalidWeights(format!(
                    "unknown provider: {name}"
                )));
            }
        }
        for entry in table.iter() {
            if !weights.contains_key(&entry.name) {
                return Err(RouterError::InvalidWeights(format!(
                    "missing weight for provider: {}",
                    entry.name
                )));
            }
        }
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(weight) {
                return Err(RouterError::InvalidWeights(format!(
                    "weight {weight} for {name} out of range [0, 1]"
                )));
            }
        }
        let sum: f64 = table
            .iter()
            .filter(|e| e.enabled)
            .map(|e| weights[&e.name])
            .sum();
        if !(WEIGHT_SUM_MIN..=WEIGHT_SUM_MAX).contains(&sum) {
            return Err(RouterError::InvalidWeights(format!(
                "enabled weights sum to {sum:.4}, expected 1.0"
            )));
        }

        for entry in table.iter_mut() {
            entry.weight = weights[&entry.name];
        }
        tracing::info!(providers = table.len(), "provider weights updated");
        Ok(())
    }

    /// Snapshot of every provider's state for status queries.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        let table = self.table.read();
        let health = self.health.read();
        let metrics = self.metrics.snapshot();
        table
            .iter()
            .map(|e| ProviderStatus {
                name: e.name.clone(),
                enabled: e.enabled,
                weight: e.weight,
                healthy: health.get(&e.name).is_some_and(|h| h.healthy),
                capabilities: e
                    .adapter
                    .capabilities()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                metrics: metrics.get(&e.name).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Names of all registered providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.table.read().iter().map(|e| e.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }
}

/// Normalize weights so the enabled set sums to 1.0. Entries with no
/// weights at all share equally.
fn normalize_weights(entries: &mut [ProviderEntry]) {
    let enabled: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.enabled)
        .map(|(i, _)| i)
        .collect();
    if enabled.is_empty() {
        return;
    }
    let sum: f64 = enabled.iter().map(|&i| entries[i].weight.max(0.0)).sum();
    if sum <= 0.0 {
        let equal = 1.0 / enabled.len() as f64;
        for &i in &enabled {
            entries[i].weight = equal;
        }
    } else {
        for &i in &enabled {
            entries[i].weight = entries[i].weight.max(0.0) / sum;
        }
    }
}

/// Deterministic per-provider model resolution. An explicit request model
/// always wins; bedrock/gemini/ollama fall through to adapter defaults.
fn resolve_model(provider: &str, request: &CanonicalRequest) -> Option<String> {
    if let Some(model) = &request.model {
        return Some(model.clone());
    }
    match provider {
        "openai" => Some(
            match request.request_kind {
                RequestKind::CodeGeneration => OPENAI_CODE_MODEL,
                _ => OPENAI_DEFAULT_MODEL,
            }
            .to_string(),
        ),
        "anthropic" => Some(
            match request.request_kind {
                RequestKind::ComplexAnalysis | RequestKind::CodeGeneration => {
                    ANTHROPIC_PREMIUM_MODEL
                }
                _ => ANTHROPIC_STANDARD_MODEL,
            }
            .to_string(),
        ),
        _ => None,
    }
}
