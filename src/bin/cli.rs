//! chapter-notifier CLI
//!
//! Long-running entry point. `start` polls until Ctrl-C or SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chapter_notifier::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    storage::{ReleaseRepository, SqliteRepository},
    utils::time,
};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

/// chapter-notifier - Discord alerts for new manga chapters
#[derive(Parser, Debug)]
#[command(
    name = "chapter-notifier",
    version,
    about = "Posts new chapters of watched series to Discord"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll for new releases until interrupted
    Start,

    /// Run a single cycle and exit
    Check {
        /// Log notifications instead of sending them and leave the database untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Write a default configuration file
    Init,

    /// List already notified releases
    List,
}

/// Initialize logging from the configured level, `--verbose` and `RUST_LOG`.
fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the file and apply environment overrides.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Resolve once Ctrl-C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
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

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config);

    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&level, cli.verbose);

    if let Command::Init = cli.command {
        if Config::write_template(&cli.config)? {
            log::info!("Wrote default configuration to {}", cli.config.display());
        } else {
            log::warn!(
                "{} already exists, leaving it untouched",
                cli.config.display()
            );
        }
        return Ok(());
    }

    let config = loaded.inspect_err(|e| {
        log::error!("Failed to load {}: {}", cli.config.display(), e);
    })?;
    if !cli.config.exists() {
        log::warn!(
            "{} not found, using defaults and environment overrides",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Start => {
            config.validate()?;
            log::info!("chapter-notifier starting...");

            let scheduler = Arc::new(pipeline::start(&config).await?);
            let (tx, rx) = watch::channel(false);

            let runner = tokio::spawn({
                let scheduler = Arc::clone(&scheduler);
                async move { scheduler.run(rx).await }
            });

            shutdown_signal().await;
            log::info!("Shutdown requested, finishing current cycle");
            let _ = tx.send(true);

            runner
                .await
                .map_err(|e| AppError::config(format!("Scheduler task failed: {e}")))??;
        }

        Command::Check { dry_run } => {
            let scheduler = if dry_run {
                if let Err(e) = config.validate() {
                    log::warn!("Configuration is not valid for a real run: {}", e);
                }
                pipeline::dry_run(&config).await?
            } else {
                config.validate()?;
                pipeline::start(&config).await?
            };

            let stats = scheduler.run_once().await?;
            log::info!(
                "{} candidates, {} rejected, {} watched, {} already notified, {} new",
                stats.candidates,
                stats.rejected,
                stats.watched,
                stats.already_seen,
                stats.notified
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} watched series)", config.watch.subjects.len());
        }

        Command::List => {
            if !Path::new(&config.storage.database).exists() {
                log::info!("No database at {} yet", config.storage.database);
                return Ok(());
            }
            let repository = SqliteRepository::open_read_only(&config.storage.database)?;
            let rows = repository.load_all().await?;

            for (key, record) in &rows {
                let released = time::display(&record.published_at)
                    .unwrap_or_else(|_| record.published_at.clone());
                println!("{key}\t{released}\t{}", record.link);
            }
            log::info!(
                "{} collected chapters in {}",
                rows.len(),
                config.storage.database
            );
        }

        // Written above, before the configuration is required to parse.
        Command::Init => {}
    }

    log::info!("Done!");

    Ok(())
}
