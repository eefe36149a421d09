//! `axonflow config`: inspect the resolved configuration.

use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved configuration with credentials masked.
    Show,
}

pub async fn execute(cmd: ConfigCommands, tenant: &str) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => show(tenant).await,
    }
}

async fn show(tenant: &str) -> anyhow::Result<()> {
    println!("\n  ⚙️  Resolved configuration for tenant {}:\n", tenant.bold());

    let service = crate::commands::engine(tenant).await;
    let masked = service.resolved_config(tenant).await.masked();

    if let Some(path) = axonflow_core::config::config_file_path() {
        println!("  {:<18} {}", "Config file:".bold(), path.display());
    } else {
        println!(
            "  {:<18} {}",
            "Config file:".bold(),
            "(not set)".dimmed()
        );
    }
    println!("{}", serde_json::to_string_pretty(&masked)?);
    Ok(())
}
