use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use engify_app::{enhance_page, EnhanceOptions, EnhanceOutcome};
use engify_engine::{RelaySettings, SettingsStore, UserSettings};
use engify_logging::LogDestination;

#[derive(Debug, Parser)]
#[command(
    name = "engify",
    version,
    about = "Fix or summarize selected page text through an Engify relay"
)]
struct Cli {
    /// Directory holding engify_settings.ron. Defaults to ./.engify
    #[arg(long, global = true)]
    settings_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Write logs to this file instead of the terminal.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select text in an HTML page, run the assistant and print the result.
    Enhance(EnhanceArgs),
    /// Store the API key forwarded to the relay.
    SetKey { key: String },
    /// Remove the stored API key.
    ClearKey,
}

#[derive(Debug, Args)]
struct EnhanceArgs {
    /// HTML file to load.
    page: PathBuf,

    /// Text to select; prefix with "/summarize" inside the page to summarize instead.
    #[arg(long)]
    select: String,

    #[arg(long, default_value = "http://127.0.0.1:8787/")]
    endpoint: String,

    /// Origin header presented to the relay.
    #[arg(long)]
    origin: Option<String>,

    /// Seconds to wait for the relay, retries included.
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let destination = match &cli.log_file {
        Some(path) => LogDestination::File(path.clone()),
        None => LogDestination::Terminal,
    };
    engify_logging::initialize(destination, engify_logging::parse_level(&cli.log_level));

    let settings_dir = match cli.settings_dir {
        Some(dir) => dir,
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".engify"),
    };
    let store = SettingsStore::new(settings_dir);

    match cli.command {
        Command::Enhance(args) => {
            let defaults = RelaySettings::default();
            let options = EnhanceOptions {
                page: args.page,
                selection: args.select,
                relay: RelaySettings {
                    endpoint: args.endpoint,
                    origin: args.origin.unwrap_or(defaults.origin.clone()),
                    ..defaults
                },
                settings_dir: store.dir().to_path_buf(),
                timeout: Duration::from_secs(args.timeout),
            };
            match enhance_page(&options)? {
                EnhanceOutcome::Replaced(text) => println!("{text}"),
                EnhanceOutcome::Failed(message) => {
                    eprintln!("{message}");
                    std::process::exit(1);
                }
            }
        }
        Command::SetKey { key } => {
            let path = store
                .save(&UserSettings {
                    api_key: Some(key.trim().to_string()),
                })
                .context("failed to save settings")?;
            println!("API key saved to {}", path.display());
        }
        Command::ClearKey => {
            let path = store
                .save(&UserSettings::default())
                .context("failed to save settings")?;
            println!("API key cleared in {}", path.display());
        }
    }
    Ok(())
}
