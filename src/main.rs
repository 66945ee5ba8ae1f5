//! # Signal Harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite database and run schema migrations |
//! | `harvest channels` | Probe the configured channels |
//! | `harvest ingest` | Ingest channels, optionally for a user query |
//! | `harvest insights` | Extract insights for pending posts |
//! | `harvest sweep` | Delete posts and insights past the retention horizon |
//! | `harvest run` | Sweep, ingest the configured channels, extract insights |
//! | `harvest discover "<query>"` | Suggest channels for a query |
//! | `harvest stats` | Print database statistics |
//! | `harvest serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `signal_harvest=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use signal_harvest::{channels, commands, config, migrate, server, stats};

/// Signal Harvest: turns forum posts into structured market insights.
#[derive(Parser)]
#[command(name = "harvest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Probe each configured channel and print its availability.
    Channels,

    /// Ingest the top posts of channels.
    ///
    /// Without `--channel`, the configured background list is used.
    Ingest {
        /// Channel to ingest (repeatable).
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Query the ingestion is scoped to. Requires `--user`.
        #[arg(long)]
        query: Option<String>,

        /// User the ingestion is scoped to.
        #[arg(long)]
        user: Option<String>,
    },

    /// Extract insights for posts that have none yet.
    Insights {
        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Delete posts and insights older than the retention horizon.
    Sweep,

    /// Sweep, ingest the configured channels, then extract insights.
    Run,

    /// Ask the completion service for channels relevant to a query.
    Discover {
        query: String,
    },

    /// Show post, insight and per-channel counts.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("signal_harvest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Channels => {
            channels::list_channels(&cfg).await?;
        }
        Commands::Ingest {
            channels,
            query,
            user,
        } => {
            commands::run_ingest(&cfg, channels, query, user).await?;
        }
        Commands::Insights { query, user } => {
            commands::run_insights(&cfg, query, user).await?;
        }
        Commands::Sweep => {
            commands::run_sweep(&cfg).await?;
        }
        Commands::Run => {
            commands::run_background(&cfg).await?;
        }
        Commands::Discover { query } => {
            commands::run_discover(&cfg, &query).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
