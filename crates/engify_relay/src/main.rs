use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use engify_logging::{engify_info, LogDestination};
use engify_relay::{FallbackEngine, HttpInvoker, RelayConfig, RelayState};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Relay between the Engify extension and language-model providers.
#[derive(Debug, Parser)]
#[command(name = "engify-relay", version)]
struct Cli {
    /// RON config file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let destination = match cli.log_file {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    engify_logging::initialize(destination, engify_logging::parse_level(&cli.log_level));

    let mut config = RelayConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.apply_env_keys(|name| std::env::var(name).ok());
    config.log_warnings();

    let addr = config.listen_addr()?;
    let invoker = HttpInvoker::new(
        config.gemini.base_url.clone(),
        config.openai.base_url.clone(),
        PROVIDER_TIMEOUT,
    )
    .context("failed to build HTTP client")?;
    let engine = FallbackEngine::new(Arc::new(config), Arc::new(invoker));

    engify_info!("Starting engify-relay {}", env!("CARGO_PKG_VERSION"));
    engify_relay::run(addr, RelayState::new(engine)).await
}
