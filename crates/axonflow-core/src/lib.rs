//! # axonflow-core
//!
//! Core routing engine for AxonFlow: an LLM request-routing middleware.
//!
//! This crate provides the building blocks for:
//! - Routing canonical completion requests across providers with weighted
//!   load balancing and one-shot failover
//! - Health monitoring and per-provider metrics
//! - Three-tier configuration resolution (database, file, environment)
//!   with hot router swap
//! - Permission-aware PII redaction of responses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axonflow_core::RouterService;
//! use axonflow_llm::{CanonicalRequest, RequestKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RouterService::from_env().await;
//!
//!     let request = CanonicalRequest::builder("Explain the outage in plain words")
//!         .request_kind(RequestKind::ComplexAnalysis)
//!         .build();
//!
//!     let processed = service.complete(&request).await?;
//!     println!("{}", processed.response.content);
//!     Ok(())
//! }
//! ```

pub mod accounting;
pub mod balancer;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod pii;
pub mod router;
pub mod service;
pub mod telemetry;

// Re-exports
pub use accounting::{LogUsageSink, UsageRecord, UsageSink};
pub use config::{ConfigResolver, ConfigStore, LlmRouterConfig, NoopConfigStore};
pub use error::{RouterError, RouterResult};
pub use health::{HealthMonitor, HealthState};
pub use metrics::{MetricsTracker, ProviderMetrics};
pub use pii::{
    allowed_categories, PiiCategory, PiiPostProcessor, ProcessedResponse, RedactionManifest,
};
pub use router::{LlmRouter, ProviderEntry, ProviderStatus};
pub use service::{RouterService, DEFAULT_TENANT};
pub use telemetry::{init_telemetry, TelemetryConfig};

// Re-export the adapter crate for convenience
pub use axonflow_llm;
