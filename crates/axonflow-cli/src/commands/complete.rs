//! `axonflow complete`: route one request through the engine.

use clap::Args;
use colored::Colorize;

use axonflow_core::RedactionManifest;
use axonflow_llm::{CallerIdentity, CanonicalRequest, RequestKind};

#[derive(Args)]
pub struct CompleteArgs {
    /// The prompt to complete.
    pub prompt: String,

    /// Request kind steering provider and model selection.
    #[arg(long, value_enum, default_value_t = KindArg::Other)]
    pub kind: KindArg,

    /// Preferred provider (honored when healthy).
    #[arg(long)]
    pub provider: Option<String>,

    /// Explicit model identifier (overrides resolution).
    #[arg(long)]
    pub model: Option<String>,

    /// System prompt.
    #[arg(long)]
    pub system: Option<String>,

    /// Maximum tokens to generate.
    #[arg(long, default_value_t = 1024)]
    pub max_tokens: u32,

    /// Sampling temperature in [0, 2].
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Allow serving simple queries from a self-hosted provider.
    #[arg(long)]
    pub allow_local: bool,

    /// Caller role for PII authorization.
    #[arg(long, default_value = "user")]
    pub role: String,

    /// Caller permission (repeatable), e.g. view_basic_pii.
    #[arg(long = "permission")]
    pub permissions: Vec<String>,

    /// Print the raw response JSON instead of formatted output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum KindArg {
    SimpleQuery,
    ComplexAnalysis,
    CodeGeneration,
    Other,
}

impl std::fmt::Display for KindArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindArg::SimpleQuery => write!(f, "simple-query"),
            KindArg::ComplexAnalysis => write!(f, "complex-analysis"),
            KindArg::CodeGeneration => write!(f, "code-generation"),
            KindArg::Other => write!(f, "other"),
        }
    }
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::SimpleQuery => RequestKind::SimpleQuery,
            KindArg::ComplexAnalysis => RequestKind::ComplexAnalysis,
            KindArg::CodeGeneration => RequestKind::CodeGeneration,
            KindArg::Other => RequestKind::Other,
        }
    }
}

pub async fn execute(args: CompleteArgs, tenant: &str) -> anyhow::Result<()> {
    let service = crate::commands::engine(tenant).await;

    let mut builder = CanonicalRequest::builder(&args.prompt)
        .request_kind(args.kind.into())
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .allow_local(args.allow_local)
        .caller(CallerIdentity {
            role: args.role.clone(),
            permissions: args.permissions.clone(),
            org: None,
        });
    if let Some(provider) = &args.provider {
        builder = builder.preferred_provider(provider);
    }
    if let Some(model) = &args.model {
        builder = builder.model(model);
    }
    if let Some(system) = &args.system {
        builder = builder.system_prompt(system);
    }
    let request = builder.build();

    match service.complete(&request).await {
        Ok(processed) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&processed.response)?);
                return Ok(());
            }
            println!("{}\n", processed.response.content);
            print_provenance(&processed.response.metadata, &processed.manifest);
        }
        Err(err) => {
            println!(
                "  {} {} ({})",
                "✗".red().bold(),
                err,
                err.kind().dimmed()
            );
            std::process::exit(1);
        }
    }
    Ok(())
}

fn print_provenance(metadata: &serde_json::Value, manifest: &RedactionManifest) {
    let info = &metadata["provider_info"];
    if let Some(provider) = info["provider"].as_str() {
        println!(
            "  {} {} via {} in {}ms, {} tokens, ~${:.4}",
            "→".dimmed(),
            info["model"].as_str().unwrap_or("-").cyan(),
            provider.bold(),
            info["latency_ms"].as_u64().unwrap_or(0),
            info["tokens_used"].as_u64().unwrap_or(0),
            info["estimated_cost"].as_f64().unwrap_or(0.0)
        );
    }
    if manifest.had_redactions {
        let categories: Vec<String> = manifest
            .redacted_categories
            .iter()
            .map(|c| c.to_string())
            .collect();
        println!(
            "  {} {} redaction(s): {}",
            "⚠".yellow().bold(),
            manifest.redaction_count,
            categories.join(", ")
        );
    }
}
