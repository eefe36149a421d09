//! Process-wide router handle with hot refresh.
//!
//! The service owns the config resolver behind its own lock and the
//! current router behind a dedicated handle lock. Lock ordering is always
//! config lock before router-handle lock; the swap itself is a single
//! reference replacement, so in-flight requests finish against the router
//! they snapshotted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use axonflow_llm::CanonicalRequest;

use crate::accounting::{LogUsageSink, UsageSink};
use crate::config::{ConfigResolver, ConfigStore, LlmRouterConfig, NoopConfigStore};
use crate::error::RouterResult;
use crate::health::HealthMonitor;
use crate::pii::{PiiPostProcessor, ProcessedResponse};
use crate::router::{LlmRouter, ProviderStatus};

/// Tenant used when the embedding application has no tenant concept.
pub const DEFAULT_TENANT: &str = "default";

/// The routing engine facade: resolve config, keep a hot-swappable
/// router, and post-process every response.
pub struct RouterService {
    resolver: Mutex<ConfigResolver>,
    router: RwLock<Arc<LlmRouter>>,
    postprocessor: PiiPostProcessor,
    accounting: Arc<dyn UsageSink>,
    monitor: HealthMonitor,
}

impl RouterService {
    /// Build the service and perform the initial configuration load.
    pub async fn new(store: Arc<dyn ConfigStore>, accounting: Arc<dyn UsageSink>) -> Self {
        let service = Self {
            resolver: Mutex::new(ConfigResolver::new(store)),
            router: RwLock::new(Arc::new(LlmRouter::new(Vec::new(), accounting.clone()))),
            postprocessor: PiiPostProcessor::new(),
            accounting,
            monitor: HealthMonitor::default(),
        };
        service.refresh(DEFAULT_TENANT).await;
        service
    }

    /// Build from the file and environment tiers only, with log-based
    /// usage accounting.
    pub async fn from_env() -> Self {
        Self::new(Arc::new(NoopConfigStore), Arc::new(LogUsageSink)).await
    }

    /// Invalidate the config cache, rebuild the router, and atomically
    /// replace the process-wide handle. In-flight requests complete
    /// against the old adapters through their captured references.
    pub async fn refresh(&self, tenant_id: &str) {
        // Config lock first; the router handle lock is only taken for the
        // final swap.
        let mut resolver = self.resolver.lock().await;
        resolver.invalidate();
        let config = resolver.resolve(tenant_id).await;
        let entries = config.build_entries().await;
        let provider_count = entries.len();
        let router = Arc::new(LlmRouter::new(entries, self.accounting.clone()));
        self.monitor.spawn(&router);

        let mut handle = self.router.write();
        *handle = router;
        drop(handle);
        tracing::info!(
            tenant = tenant_id,
            providers = provider_count,
            "router rebuilt and swapped"
        );
    }

    /// Snapshot the current router. Callers hold the returned reference
    /// for the duration of one request so a refresh cannot tear it.
    pub fn router(&self) -> Arc<LlmRouter> {
        self.router.read().clone()
    }

    /// Route a request and post-process the response for the caller.
    pub async fn complete(&self, request: &CanonicalRequest) -> RouterResult<ProcessedResponse> {
        let router = self.router();
        let response = router.complete(request).await?;
        self.postprocessor.process_response(response, &request.caller)
    }

    /// The resolved (possibly cached) configuration for a tenant.
    pub async fn resolved_config(&self, tenant_id: &str) -> LlmRouterConfig {
        self.resolver.lock().await.resolve(tenant_id).await
    }

    /// Provider status snapshots from the current router.
    pub fn status(&self) -> Vec<ProviderStatus> {
        self.router().provider_status()
    }

    /// Replace provider weights on the current router.
    pub fn update_weights(&self, weights: &HashMap<String, f64>) -> RouterResult<()> {
        self.router().update_weights(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StaticStore(LlmRouterConfig);

    #[async_trait]
    impl ConfigStore for StaticStore {
        async fn load(&self, _tenant_id: &str) -> anyhow::Result<Option<LlmRouterConfig>> {
            Ok(Some(self.0.clone()))
        }
    }

    fn two_provider_config() -> LlmRouterConfig {
        LlmRouterConfig {
            openai_api_key: Some("sk-test-1".into()),
            anthropic_api_key: Some("sk-test-2".into()),
            ..LlmRouterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_initial_load_builds_router() {
        let service = RouterService::new(
            Arc::new(StaticStore(two_provider_config())),
            Arc::new(LogUsageSink),
        )
        .await;

        let status = service.status();
        let names: Vec<&str> = status.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["openai", "anthropic"]);
        let total: f64 = status.iter().map(|s| s.weight).sum();
        assert!((0.99..=1.01).contains(&total));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let service = RouterService::new(
            Arc::new(StaticStore(two_provider_config())),
            Arc::new(LogUsageSink),
        )
        .await;

        let before: Vec<(String, f64)> = service
            .status()
            .iter()
            .map(|s| (s.name.clone(), s.weight))
            .collect();

        service.refresh(DEFAULT_TENANT).await;
        service.refresh(DEFAULT_TENANT).await;

        let after: Vec<(String, f64)> = service
            .status()
            .iter()
            .map(|s| (s.name.clone(), s.weight))
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_refresh_swaps_router_instance() {
        let service = RouterService::new(
            Arc::new(StaticStore(two_provider_config())),
            Arc::new(LogUsageSink),
        )
        .await;

        let old = service.router();
        service.refresh(DEFAULT_TENANT).await;
        let new = service.router();
        assert!(!Arc::ptr_eq(&old, &new));

        // The old router remains usable through its captured reference.
        assert_eq!(old.provider_names(), new.provider_names());
    }

    #[tokio::test]
    async fn test_resolved_config_reflects_store() {
        let service = RouterService::new(
            Arc::new(StaticStore(two_provider_config())),
            Arc::new(LogUsageSink),
        )
        .await;

        let config = service.resolved_config(DEFAULT_TENANT).await;
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test-1"));
    }

    #[tokio::test]
    async fn test_weight_update_through_service() {
        let service = RouterService::new(
            Arc::new(StaticStore(two_provider_config())),
            Arc::new(LogUsageSink),
        )
        .await;

        let update = HashMap::from([("openai".to_string(), 0.8), ("anthropic".to_string(), 0.2)]);
        service.update_weights(&update).unwrap();
        let openai = service
            .status()
            .into_iter()
            .find(|s| s.name == "openai")
            .unwrap();
        assert_eq!(openai.weight, 0.8);
    }
}
