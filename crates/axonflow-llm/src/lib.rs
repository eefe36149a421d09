//! # axonflow-llm
//!
//! Provider adapters for the AxonFlow LLM routing engine.
//!
//! This crate defines the provider-neutral message shapes used inside the
//! engine and the adapters that translate them to each upstream provider's
//! native protocol:
//!
//! 1. **Canonical Data Model** - [`CanonicalRequest`] / [`CanonicalResponse`]
//! 2. **Adapter Contract** - the [`ProviderAdapter`] trait
//! 3. **Upstream Bindings** - OpenAI, Anthropic, Google Gemini, AWS Bedrock,
//!    and self-hosted Ollama
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axonflow_llm::{CanonicalRequest, ProviderAdapter, RequestKind};
//! use axonflow_llm::providers::OpenAiAdapter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = OpenAiAdapter::new(std::env::var("OPENAI_API_KEY")?)?;
//!
//!     let request = CanonicalRequest::builder("Summarize Q4 revenue drivers")
//!         .request_kind(RequestKind::ComplexAnalysis)
//!         .max_tokens(512)
//!         .build();
//!
//!     let response = adapter.complete(&request).await?;
//!     println!("{} ({} tokens)", response.content, response.total_tokens);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod providers;
pub mod request;

// Re-export primary types
pub use adapter::ProviderAdapter;
pub use error::{ProviderError, ProviderResult};
pub use providers::{
    AnthropicAdapter, BedrockAdapter, GeminiAdapter, OllamaAdapter, OpenAiAdapter,
};
pub use request::{CallerIdentity, CanonicalRequest, CanonicalResponse, RequestKind};
