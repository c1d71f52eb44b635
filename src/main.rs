//! corekit: application bootstrap runtime
//!
//! Loads configuration, boots the built-in and directory modules, then
//! waits for a shutdown signal.

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt};

use corekit_core::config::logging::LogFormat;
use corekit_core::config::{AppConfig, ConfigTree};
use corekit_core::error::AppError;
use corekit_runtime::Application;

/// Application bootstrap runtime
#[derive(Debug, Parser)]
#[command(name = "corekit", version, about, long_about = None)]
struct Cli {
    /// Environment overlay to load (`config/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Directory holding the configuration files
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Modules directory, overrides `loader.modules`
    #[arg(long)]
    modules: Option<String>,

    /// Commands directory, overrides `loader.commands`
    #[arg(long)]
    commands: Option<String>,

    /// Run the application right after boot
    #[arg(long)]
    autorun: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (config, tree) = match load_configuration(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, tree).await {
        tracing::error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

/// Load configuration files and apply command line overrides
fn load_configuration(cli: &Cli) -> Result<(AppConfig, ConfigTree), AppError> {
    let (mut config, mut tree) = AppConfig::load(&cli.config_dir, &cli.env)?;

    if let Some(modules) = &cli.modules {
        config.loader.modules = modules.clone();
        tree.set("loader.modules", Value::String(modules.clone()));
    }
    if let Some(commands) = &cli.commands {
        config.loader.commands = commands.clone();
        tree.set("loader.commands", Value::String(commands.clone()));
    }
    if cli.autorun {
        config.app.autorun = true;
        tree.set("app.autorun", Value::Bool(true));
    }

    Ok((config, tree))
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, tree: ConfigTree) -> anyhow::Result<()> {
    tracing::info!(
        app = %config.app.name,
        environment = %config.app.environment,
        "Starting corekit v{}",
        env!("CARGO_PKG_VERSION")
    );

    let app = Application::new(
        config,
        tree,
        corekit::module_catalog(),
        corekit::command_catalog(),
    );
    app.boot().await?;

    shutdown_signal().await;
    app.close(0, "SIGINT").await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
