//! # Alert Codifier CLI (`codifier`)
//!
//! ## Usage
//!
//! ```bash
//! codifier --config ./config/codifier.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codifier serve` | Start the HTTP API |
//! | `codifier search <fragment>` | Search settlements by name fragment |
//! | `codifier code <code>` | Look up a codifier code |
//! | `codifier lookup --region …` | Strict hierarchical name → code lookup |
//! | `codifier browse [--region …]` | List one level of the hierarchy |
//! | `codifier alerts` | Fetch active alerts and print their codes |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=alert_codifier=debug`).

use alert_codifier::{commands, config, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Resolve air-raid alerts to codes of the Ukrainian codifier of
/// administrative-territorial units.
#[derive(Parser)]
#[command(name = "codifier", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/codifier.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Search settlements whose name contains a fragment (case-insensitive).
    Search {
        fragment: String,
    },

    /// Find the record carrying a code, with or without the `UA` prefix.
    Code {
        code: String,
    },

    /// Strict lookup of the code of a region, district, community or unit.
    ///
    /// Names may carry administrative decorations ("область", "район",
    /// "територіальна громада", "м.", "с."); they are stripped first.
    Lookup {
        #[arg(long)]
        region: String,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        community: Option<String>,
        #[arg(long)]
        unit: Option<String>,
    },

    /// List the children of the deepest given level (all regions by default).
    Browse {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        community: Option<String>,
    },

    /// Fetch active alerts from the configured feed and resolve their codes.
    Alerts {
        /// Only alerts of this kind: oblast, raion, hromada, or city.
        #[arg(long)]
        location_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { fragment } => {
            commands::run_search(&cfg, &fragment)?;
        }
        Commands::Code { code } => {
            commands::run_code(&cfg, &code)?;
        }
        Commands::Lookup {
            region,
            district,
            community,
            unit,
        } => {
            commands::run_lookup(
                &cfg,
                &region,
                district.as_deref(),
                community.as_deref(),
                unit.as_deref(),
            )?;
        }
        Commands::Browse {
            region,
            district,
            community,
        } => {
            commands::run_browse(
                &cfg,
                region.as_deref(),
                district.as_deref(),
                community.as_deref(),
            )?;
        }
        Commands::Alerts { location_type } => {
            commands::run_alerts(&cfg, location_type.as_deref()).await?;
        }
    }

    Ok(())
}
