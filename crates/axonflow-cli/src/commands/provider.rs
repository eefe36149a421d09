//! `axonflow provider`: inspect registered providers.

use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List resolved providers, weights, and capabilities.
    List,
    /// Show provider health and request metrics.
    Status,
}

pub async fn execute(cmd: ProviderCommands, tenant: &str) -> anyhow::Result<()> {
    match cmd {
        ProviderCommands::List => list(tenant).await,
        ProviderCommands::Status => status(tenant).await,
    }
}

async fn list(tenant: &str) -> anyhow::Result<()> {
    println!("\n  🔌 Providers:\n");

    let service = crate::commands::engine(tenant).await;
    let providers = service.status();
    if providers.is_empty() {
        println!("  (no providers configured; set provider credentials or a config file)");
        return Ok(());
    }

    println!(
        "  {:<12} {:<8} {:<8} {}",
        "NAME".bold(),
        "WEIGHT".bold(),
        "STATE".bold(),
        "CAPABILITIES".bold()
    );
    println!("  {}", "─".repeat(56).dimmed());
    for p in &providers {
        let state = if p.healthy { "🟢 up" } else { "🔴 down" };
        println!(
            "  {:<12} {:<8.2} {:<8} {}",
            p.name,
            p.weight,
            state,
            p.capabilities.join(", ").dimmed()
        );
    }
    println!("\n  {} {} provider(s)", "→".dimmed(), providers.len());
    Ok(())
}

async fn status(tenant: &str) -> anyhow::Result<()> {
    println!("\n  📊 Provider status:\n");

    let service = crate::commands::engine(tenant).await;
    let providers = service.status();
    if providers.is_empty() {
        println!("  (no providers configured)");
        return Ok(());
    }

    println!(
        "  {:<12} {:<8} {:<10} {:<10} {:<12} {}",
        "NAME".bold(),
        "STATE".bold(),
        "REQUESTS".bold(),
        "ERRORS".bold(),
        "AVG MS".bold(),
        "LAST USED".bold()
    );
    println!("  {}", "─".repeat(70).dimmed());
    for p in &providers {
        let state = if p.healthy { "🟢" } else { "🔴" };
        let last_used = p
            .metrics
            .last_used_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<12} {:<8} {:<10} {:<10} {:<12.1} {}",
            p.name,
            state,
            p.metrics.request_count,
            p.metrics.error_count,
            p.metrics.avg_latency_ms,
            last_used.dimmed()
        );
    }
    Ok(())
}
