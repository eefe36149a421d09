//! Database-backed configuration tier.
//!
//! Persistence is an external collaborator; the resolver talks to it
//! through this seam. Store failures degrade to the lower tiers.

use async_trait::async_trait;

use super::LlmRouterConfig;

/// Highest-priority configuration source.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored provider configuration for a tenant, or `None`
    /// when the store has nothing for it.
    async fn load(&self, tenant_id: &str) -> anyhow::Result<Option<LlmRouterConfig>>;
}

/// Store used when no database is wired up: always empty.
#[derive(Debug, Default)]
pub struct NoopConfigStore;

#[async_trait]
impl ConfigStore for NoopConfigStore {
    async fn load(&self, _tenant_id: &str) -> anyhow::Result<Option<LlmRouterConfig>> {
        Ok(None)
    }
}
