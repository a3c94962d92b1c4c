//! Tessera agent entry point.
//!
//! Loads the agent configuration and runs the getting-started walkthrough
//! in-process.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tessera_agent::{walkthrough, AgentConfig, LogFormat};

/// Tessera Agent
#[derive(Parser, Debug)]
#[command(name = "tessera-agent", version, about = "Tessera credential exchange walkthrough")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "tessera.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the holder's name.
    #[arg(long)]
    name: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        AgentConfig::default().save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    let mut config = AgentConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(name) = args.name {
        config.agent.name = name;
    }
    if args.json {
        config.logging.format = LogFormat::Json;
    }
    init_tracing(&config)?;

    tracing::info!("Tessera agent v{}", env!("CARGO_PKG_VERSION"));

    let report = walkthrough::run(&config).await?;
    for proof in &report.proofs {
        tracing::info!(
            request = %proof.request_name,
            attributes = proof.attributes.len(),
            self_attested = proof.self_attested.len(),
            issuers = proof.issuers.len(),
            "proof accepted"
        );
    }
    tracing::info!(
        holder = %config.agent.name,
        credentials = ?report.credentials,
        "walkthrough finished"
    );
    Ok(())
}

fn init_tracing(config: &AgentConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.logging.format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("tracing init: {}", e)),
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("tracing init: {}", e)),
    }
}
