//! Upstream provider adapters.
//!
//! One module per provider family. Each adapter owns its client and
//! credentials and is bit-exact against the vendor's documented schema for
//! the fields the engine consumes.

pub mod anthropic;
pub mod bedrock;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use bedrock::BedrockAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use std::time::Duration;

/// Per-call deadline for cloud-hosted providers.
pub const CLOUD_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call deadline for self-hosted Ollama (local inference is slow).
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(120);
