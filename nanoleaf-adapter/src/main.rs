use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nanoleaf_adapter::logging::{init_logging, mode_from_env, LoggingMode};
use nanoleaf_adapter::{pair, search_devices, AdapterConfig, Supervisor};
use nanoleaf_api::OpenApiClient;
use state_store::StateStore;
use tracing::{error, info};

/// Nanoleaf adapter
///
/// Mirrors the state of a Nanoleaf controller and forwards changes back to it.
#[derive(Parser, Debug)]
#[command(name = "nanoleaf-adapter")]
#[command(about = "Keeps a Nanoleaf controller and a local state tree in sync")]
#[command(version)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller host name or IP address
    #[arg(long)]
    host: Option<String>,

    /// Controller port
    #[arg(short, long)]
    port: Option<u16>,

    /// Authorization token
    #[arg(short, long)]
    token: Option<String>,

    /// silent, development, debug or json
    #[arg(long)]
    log_mode: Option<LoggingMode>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Connect and keep the state tree in sync until Ctrl-C
    Run,
    /// Search the network once and print the controllers found as JSON
    Search,
    /// Request a new authorization token from a controller in pairing mode
    Pair,
}

impl Args {
    /// Config file contents with command line overrides applied
    fn adapter_config(&self) -> Result<AdapterConfig> {
        let mut config = match &self.config {
            Some(path) => AdapterConfig::load(path)?,
            None => AdapterConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(token) = &self.token {
            config.auth_token = token.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mode = match args.log_mode.map_or_else(mode_from_env, Ok) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(mode) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.adapter_config()?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_adapter(config).await,
        Command::Search => {
            let intervals = config.intervals();
            let devices = search_devices(intervals.search_window, config.interface).await?;
            println!("{}", serde_json::to_string_pretty(&devices)?);
            Ok(())
        }
        Command::Pair => {
            if config.host.trim().is_empty() {
                anyhow::bail!("A host is required for pairing");
            }
            let token = pair(&config.host, config.port, Duration::from_millis(config.request_timeout)).await?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn run_adapter(config: AdapterConfig) -> Result<()> {
    config.validate()?;
    let timeout = config.intervals().request_timeout;
    let client = OpenApiClient::new(&config.host, config.port, &config.auth_token, timeout)
        .context("Failed to create OpenAPI client")?;

    let mut handle = Supervisor::new(config, Arc::new(client), StateStore::new())?.spawn();

    let finished = tokio::select! {
        result = handle.wait() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(result) => result.context("Adapter stopped"),
        None => {
            info!("Received Ctrl-C, shutting down");
            handle.shutdown();
            handle.wait().await.context("Adapter stopped")
        }
    }
}
