// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Argus: AI image analysis agent
//!
//! Watches a directory and writes a detailed description of every new image,
//! using a hosted vision model or a local Ollama model.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use argus::backends::OllamaBackend;
use argus::config::{AgentConfig, ModelSpec, API_KEY_ENV};
use argus::{Agent, Result};

/// Argus CLI - AI image analysis agent
#[derive(Parser, Debug)]
#[command(name = "argus")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Continuously analyze new images with a vision model", long_about = None)]
#[command(after_help = "Examples:\n  \
    argus --watch ./images --output ./analysis\n  \
    argus --watch ./screenshots --output ./reports --interval 10\n  \
    argus --model ollama/llava --watch ./images --output ./analysis\n  \
    argus --model ollama/llama3.2-vision --once")]
struct Cli {
    /// Path to configuration file (JSON format); flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress log output below warnings
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Directory to watch for new images [default: ./input_images]
    #[arg(long, global = true)]
    watch: Option<PathBuf>,

    /// Directory to save analysis results [default: ./analysis_output]
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Check interval in seconds [default: 5]
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Hosted model (e.g. gpt-4o) or local model (e.g. ollama/llava) [default: gpt-4o]
    #[arg(long, global = true)]
    model: Option<String>,

    /// Process existing images once and exit
    #[arg(long)]
    once: bool,

    /// API key for the hosted model (or set OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Ollama base URL [default: http://localhost:11434]
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Retry failed analyses on the next scan instead of marking them processed
    #[arg(long, global = true)]
    retry_failed: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(ref watch) = self.watch {
            config.watch_directory = watch.clone();
        }
        if let Some(ref output) = self.output {
            config.output_directory = output.clone();
        }
        if let Some(interval) = self.interval {
            config.check_interval_secs = interval;
        }
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(ref key) = self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(ref url) = self.ollama_url {
            config.ollama_url = url.clone();
        }
        if self.retry_failed {
            config.retry_failed = true;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show backend status and effective settings
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Write the default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "argus.json")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match cli.config {
        Some(ref path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    cli.run.apply(&mut config);

    match cli.command {
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action),
        None => run_agent(config, cli.run.once).await,
    }
}

/// Run the agent once or until interrupted
async fn run_agent(config: AgentConfig, once: bool) -> Result<()> {
    info!("Argus v{} - model {}", env!("CARGO_PKG_VERSION"), config.model);

    if let ModelSpec::Local(model) = config.model_spec()? {
        check_local_model(&config, &model).await;
    }

    let mut agent = Agent::new(config)?;

    if once {
        let summary = agent.run_once().await?;
        info!(
            "Single run finished: {} analyzed, {} failed",
            summary.analyzed, summary.failed
        );
    } else {
        let shutdown = spawn_shutdown_listener();
        let summary = agent.run_continuous(shutdown).await?;
        info!(
            "Agent stopped: {} analyzed this session, {} failed",
            summary.analyzed, summary.failed
        );
    }

    Ok(())
}

/// Warn early when Ollama is down or the model is not pulled
async fn check_local_model(config: &AgentConfig, model: &str) {
    let client = match OllamaBackend::new(&config.ollama_url, model, Duration::from_secs(10)) {
        Ok(c) => c,
        Err(e) => {
            warn!("Cannot build Ollama client: {}", e);
            return;
        }
    };

    info!("Checking Ollama availability...");
    if let Err(e) = client.health_check().await {
        warn!("{}", e);
        warn!("Start Ollama before images arrive, or analyses will fail");
        return;
    }

    match client.model_available().await {
        Ok(true) => info!("Vision model '{}' available", model),
        Ok(false) => warn!("Vision model '{}' not found. Try: ollama pull {}", model, model),
        Err(e) => warn!("Could not list Ollama models: {}", e),
    }
}

/// Flip the returned channel to true on Ctrl+C or SIGTERM
fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }

        let _ = shutdown_tx.send(true);
    });

    shutdown_rx
}

/// Run status check
async fn run_status(config: AgentConfig) -> Result<()> {
    println!("Argus v{} Status", env!("CARGO_PKG_VERSION"));
    println!("===================");

    match config.model_spec()? {
        ModelSpec::Remote(model) => {
            println!("Backend: hosted API ({})", config.api_base_url);
            println!("Model: {}", model);
            match config.resolve_api_key() {
                Some(_) => println!("API key: configured"),
                None => println!("API key: missing (use --api-key or set {})", API_KEY_ENV),
            }
        }
        ModelSpec::Local(model) => {
            let client = OllamaBackend::new(
                &config.ollama_url,
                model.as_str(),
                Duration::from_secs(config.timeout_secs),
            )?;
            println!("Backend: Ollama ({})", client.base_url());
            println!("Model: {}", model);

            match client.health_check().await {
                Ok(()) => println!("Ollama: Running"),
                Err(e) => println!("Ollama: Error - {}", e),
            }

            match client.list_models().await {
                Ok(models) => {
                    println!("\nAvailable models:");
                    for m in &models {
                        let marker = if client.is_configured_model(m) { "→" } else { " " };
                        println!("  {} {}", marker, m);
                    }
                }
                Err(e) => println!("  Error listing models: {}", e),
            }
        }
    }

    println!("\nConfiguration:");
    println!("  Watch directory: {}", config.watch_directory.display());
    println!("  Output directory: {}", config.output_directory.display());
    println!("  Check interval: {} seconds", config.check_interval_secs);
    println!("  Supported formats: {}", config.supported_formats.join(", "));
    println!("  Retry failed: {}", config.retry_failed);

    Ok(())
}

/// Run config commands
fn run_config_command(config: AgentConfig, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config.redacted())?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AgentConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }

    Ok(())
}
