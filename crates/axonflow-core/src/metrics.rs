//! Per-provider request metrics.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Counters for a single provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderMetrics {
    /// Successful requests handled.
    pub request_count: u64,

    /// Failed adapter invocations.
    pub error_count: u64,

    /// Rolling mean latency in milliseconds over successful requests.
    pub avg_latency_ms: f64,

    /// When this provider last served a successful request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Serialized metric writes behind a single lock; reads return a snapshot
/// copy. The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    inner: RwLock<HashMap<String, ProviderMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful request, folding the latency sample into the
    /// rolling mean: new = (old * n + sample) / (n + 1).
    pub fn record_success(&self, provider: &str, latency: Duration) {
        let mut inner = self.inner.write();
        let entry = inner.entry(provider.to_string()).or_default();
        let n = entry.request_count as f64;
        let sample = latency.as_secs_f64() * 1000.0;
        entry.avg_latency_ms = (entry.avg_latency_ms * n + sample) / (n + 1.0);
        entry.request_count += 1;
        entry.last_used_at = Some(Utc::now());
    }

    /// Record a failed adapter invocation.
    pub fn record_error(&self, provider: &str) {
        let mut inner = self.inner.write();
        inner.entry(provider.to_string()).or_default().error_count += 1;
    }

    /// Metrics for one provider, if any were recorded.
    pub fn get(&self, provider: &str) -> Option<ProviderMetrics> {
        self.inner.read().get(provider).cloned()
    }

    /// Snapshot copy of all provider metrics.
    pub fn snapshot(&self) -> HashMap<String, ProviderMetrics> {
        self.inner.read().clone()
    }
}
