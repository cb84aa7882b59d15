//! Main entry point for the channel-matchmaker service
//!
//! Loads configuration, restores persisted queues, serves the health and
//! metrics endpoints, and optionally reads queue commands from stdin.

use anyhow::Result;
use channel_matchmaker::config::AppConfig;
use channel_matchmaker::console::Console;
use channel_matchmaker::service::{AppState, HealthCheck};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};

/// Channel Matchmaker - per-channel queues with scheduled match sessions
#[derive(Parser)]
#[command(
    name = "channel-matchmaker",
    version,
    about = "Per-channel matchmaking queues with global single-queue membership",
    long_about = "Channel Matchmaker keeps one FIFO queue per chat channel, lets each participant \
                 wait in at most one queue, forms a match when a queue fills, and warns then \
                 deletes the match's coordination session on a schedule."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Data directory override
    #[arg(long, value_name = "DIR", help = "Directory for the JSON snapshot store")]
    data_dir: Option<PathBuf>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Queue capacity override
    #[arg(long, value_name = "N", help = "Override queue capacity")]
    capacity: Option<usize>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Read commands from stdin
    #[arg(long, help = "Read queue commands from stdin and print their outcomes")]
    console: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Channel Matchmaker");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Queue capacity: {}", config.queue.capacity);
    info!(
        "   Cooldowns: enroll {}s, withdraw {}s",
        config.queue.enroll_cooldown_seconds, config.queue.withdraw_cooldown_seconds
    );
    info!(
        "   Sessions: delete after {}s, warn {}s before",
        config.session.delete_after_seconds, config.session.warn_before_seconds
    );
    match &config.storage.data_dir {
        Some(dir) => info!("   Storage: {}", dir.display()),
        None => info!("   Storage: in-memory"),
    }
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = Some(data_dir.clone());
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(capacity) = args.capacity {
        config.queue.capacity = capacity;
    }

    channel_matchmaker::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful");
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    info!("Initializing service components...");
    let app_state = match AppState::new(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Channel Matchmaker is running");

    if args.console {
        let console = Console::new(app_state.queue_manager().clone());
        let stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            result = console.run(stdin, tokio::io::stdout()) => {
                if let Err(e) = result {
                    warn!("Console stopped: {}", e);
                }
                info!("Console input closed");
            }
            _ = wait_for_shutdown_signal() => {}
        }
    } else {
        info!("Press Ctrl+C to shutdown gracefully...");
        wait_for_shutdown_signal().await;
    }

    info!("Shutdown signal received, beginning graceful shutdown...");

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => info!(
            "Final health: {} - {} channel(s), {} matches formed",
            health.status, health.stats.channels, health.stats.matches_formed
        ),
        Err(e) => warn!("Final health check failed: {}", e),
    }

    if let Err(e) = app_state.shutdown().await {
        error!("Shutdown failed: {}", e);
        std::process::exit(1);
    }

    info!("Channel Matchmaker stopped");
    Ok(())
}
