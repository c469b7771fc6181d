use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aidy::chat;
use aidy::config::Settings;
use aidy::manager::SessionManager;
use aidy::runtime::{default_engine, ModelEngine};
use aidy::server::ApiServer;

#[derive(Parser)]
#[command(name = "aidy", version, about = "On-device multimodal emergency assistant")]
struct Cli {
    /// Directory holding default.toml and an optional local.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the inference server only
    Serve,
    /// Start the inference server and an interactive chat session
    Run,
}

/// Main entry point for the aidy application
///
/// - Serve: Starts only the inference server
/// - Run: Starts the inference server and an interactive chat session
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config_dir {
        Some(dir) => Settings::from_dir(dir),
        None => Settings::new(),
    }
    .context("Failed to load settings")?;

    let log_dir = settings.logging.file.as_deref().unwrap_or_else(|| Path::new("logs"));
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        log_dir,
        "aidy",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.to_lowercase()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false);
    if settings.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("aidy starting up...");
    info!("Log directory: {}", std::fs::canonicalize(log_dir)?.display());
    info!(
        "Model storage: install={}, cache={}, bundle={}",
        settings.storage.install_dir.display(),
        settings.storage.cache_dir.display(),
        settings.storage.bundle_dir.display()
    );

    let engine: Arc<dyn ModelEngine> = Arc::from(default_engine());
    info!("Inference engine: {}", engine.name());
    if engine.name() == "unavailable" {
        warn!("Built without a native engine, initialization will fail");
    }

    let manager = SessionManager::from_settings(&settings, engine).context("Failed to start model worker")?;
    let server = ApiServer::new(
        manager,
        settings.server.host.clone(),
        settings.server.port,
        settings.worker.request_timeout_secs,
    );

    match cli.command {
        Command::Serve => {
            server.start().await.map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
        }
        Command::Run => {
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Server error: {}", e);
                    eprintln!("Server error: {}", e);
                }
            });

            // Give the server a moment to start
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            chat::chat_loop(&settings).await.map_err(|e| anyhow::anyhow!("Chat error: {}", e))?;
        }
    }

    Ok(())
}
