//! Fitmarket CLI - authenticated access to the Fitmarket REST API

mod commands;
mod config;
mod terminal;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use fitmarket_core::tracing::{InstrumentationConfig, LogFormat, init_tracing};
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "fitmarket")]
#[command(about = "Talk to the Fitmarket API with a persistent login session")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Client configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "FITMARKET_CONFIG")]
    config: Option<PathBuf>,

    /// Session file holding the stored tokens
    #[arg(short = 's', long, global = true, env = "FITMARKET_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// API base URL, overrides the configuration file
    #[arg(short = 'u', long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in seconds, overrides the configuration file
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let instrumentation = InstrumentationConfig {
        service_name: "fitmarket-cli".to_string(),
        log_level: cli.log_level.as_filter().to_string(),
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        ..InstrumentationConfig::from_env()
    };
    init_tracing(&instrumentation)?;

    let settings = config::Settings::load(
        cli.config.as_deref(),
        cli.session_file,
        cli.base_url,
        cli.timeout,
    )?;
    info!(base_url = %settings.client.base_url, session_file = %settings.session_file.display(), "Loaded settings");

    let client = settings.build_client()?;

    match cli.command.execute(&client, &settings).await {
        Ok(()) => {
            debug!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}
