//! CLI command definitions and dispatch.

pub mod complete;
pub mod config;
pub mod provider;

use clap::{Parser, Subcommand};
use colored::Colorize;

const BANNER: &str = r#"
   ⚡ AxonFlow
   Route LLM requests across providers.
"#;

/// AxonFlow CLI: the LLM request-routing engine.
#[derive(Parser)]
#[command(
    name = "axonflow",
    version,
    about = "⚡ AxonFlow: route LLM requests across providers",
    long_about = BANNER,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Tenant whose configuration is resolved.
    #[arg(long, global = true, default_value = axonflow_core::DEFAULT_TENANT)]
    pub tenant: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 💬 Route one completion request and print the redacted response.
    Complete(complete::CompleteArgs),

    /// 🔌 Inspect providers (list, status).
    #[command(subcommand)]
    Provider(provider::ProviderCommands),

    /// ⚙️  Show the resolved configuration (credentials masked).
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// 🔄 Invalidate the config cache and rebuild the router.
    Refresh,

    /// 📊 Show engine status and provider health.
    Status,
}

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Complete(args) => complete::execute(args, &cli.tenant).await,
        Commands::Provider(cmd) => provider::execute(cmd, &cli.tenant).await,
        Commands::Config(cmd) => config::execute(cmd, &cli.tenant).await,
        Commands::Refresh => refresh(&cli.tenant).await,
        Commands::Status => status(&cli.tenant).await,
    }
}

/// Build the engine for a tenant. The initial load resolves the default
/// tenant; anything else needs one refresh.
pub(crate) async fn engine(tenant: &str) -> axonflow_core::RouterService {
    let service = axonflow_core::RouterService::from_env().await;
    if tenant != axonflow_core::DEFAULT_TENANT {
        service.refresh(tenant).await;
    }
    service
}

async fn refresh(tenant: &str) -> anyhow::Result<()> {
    let service = engine(tenant).await;
    service.refresh(tenant).await;
    let providers = service.status().len();
    println!(
        "  {} Router rebuilt: {} provider(s) configured",
        "✓".green().bold(),
        providers
    );
    Ok(())
}

async fn status(tenant: &str) -> anyhow::Result<()> {
    println!("{BANNER}");

    let service = engine(tenant).await;
    let providers = service.status();

    if providers.is_empty() {
        println!("  Providers:  {} none configured", "⚠".yellow().bold());
        println!("  Tip:        set OPENAI_API_KEY or point AXONFLOW_CONFIG_FILE at a config");
    } else {
        println!("  Providers:  {} configured", providers.len());
        for p in &providers {
            let glyph = if p.healthy { "🟢" } else { "🔴" };
            println!("    {glyph} {:<12} weight {:.2}", p.name, p.weight);
        }
    }
    println!("  CLI version: {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
