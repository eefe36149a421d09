//! Asynchronous usage accounting.
//!
//! The accounting sink is an external collaborator; the router notifies it
//! fire-and-forget so the response path never blocks on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One successful completion, as reported to the accounting sink.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost: f64,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for usage records. Failures are logged by the caller and never
/// surfaced to the request path.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord) -> anyhow::Result<()>;
}

/// Default sink: a structured log record is the only signal.
#[derive(Debug, Default)]
pub struct LogUsageSink;

#[async_trait]
impl UsageSink for LogUsageSink {
    async fn record(&self, record: UsageRecord) -> anyhow::Result<()> {
        tracing::info!(
            id = %record.id,
            provider = %record.provider,
            model = %record.model,
            total_tokens = record.total_tokens,
            estimated_cost = record.estimated_cost,
            latency_ms = record.latency_ms,
            "usage recorded"
        );
        Ok(())
    }
}
