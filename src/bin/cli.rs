//! Licitation Sync CLI
//!
//! Local execution entry point. Schedule `sync` externally (cron, task queue).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use licitation_sync::{
    config,
    error::{AppError, Result},
    feed,
    models::Config,
    pipeline,
    services::{HttpAtomFetcher, notifier_from_config},
    storage::{CursorStore, LocalStorage, Stores},
};

/// licitation-sync - Procurement feed synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "licitation-sync",
    version,
    about = "Incremental procurement ATOM feed synchronizer"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one synchronization against the configured feed
    Sync,

    /// Decode a local ATOM file and print the parsed entries as JSON
    Parse {
        /// Path to the ATOM file
        file: PathBuf,
    },

    /// Inspect or seed the stored cursor
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },

    /// Validate configuration
    Validate,
}

#[derive(Subcommand, Debug)]
enum CursorAction {
    /// Print the stored cursor
    Show,

    /// Overwrite the stored cursor
    Set {
        /// RFC 3339 instant, e.g. 2025-03-27T00:00:00Z
        at: String,
    },
}

/// Initialize logging. `RUST_LOG` still takes precedence.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn open_stores(config: &Config) -> (Arc<LocalStorage>, Stores) {
    let storage = Arc::new(LocalStorage::new(&config.storage.dir));
    let stores = Stores::from_backend(storage.clone());
    (storage, stores)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = config::load_settings(&cli.config);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let config = loaded.inspect_err(|e| log::error!("Config load failed: {}", e))?;
    if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!(
            "Config file {} not found, using defaults and environment",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Sync => {
            config.validate()?;
            let (_, stores) = open_stores(&config);
            let fetcher = HttpAtomFetcher::new(&config.http)?;
            let notifier = notifier_from_config(&config)?;

            let report = pipeline::run_sync(&config, &stores, &fetcher, notifier.as_ref()).await?;
            if report.interrupted {
                log::warn!("Run {} stopped early, next run resumes from the same cursor", report.run_id);
            }
        }

        Command::Parse { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let page = feed::decode_page(&raw)?;

            let mut entries = Vec::new();
            let mut errors = Vec::new();
            for entry in page.entries {
                match entry {
                    Ok(entry) => entries.push(entry),
                    Err(e) => errors.push(e.to_string()),
                }
            }
            let output = serde_json::json!({
                "updated": page.updated,
                "next": page.next,
                "entries": entries,
                "errors": errors,
                "deleted": page.deleted,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Cursor { action } => {
            let (storage, _) = open_stores(&config);
            match action {
                CursorAction::Show => match storage.get_last().await? {
                    Some(cursor) => println!("{}", serde_json::to_string_pretty(&cursor)?),
                    None => log::warn!("No cursor stored in {}", config.storage.dir),
                },
                CursorAction::Set { at } => {
                    let at: DateTime<Utc> = DateTime::parse_from_rfc3339(&at)
                        .map_err(|e| AppError::validation(format!("invalid instant {at}: {e}")))?
                        .with_timezone(&Utc);
                    storage.advance(at, 0).await?;
                    log::info!("Cursor set to {}", at.to_rfc3339());
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Feed: {}", config.feed.url);
            log::info!("Watched CPV prefixes: {}", config.feed.watched_prefixes().join(", "));
            log::info!(
                "Notifier: {}",
                if config.notifier.webhook_url.is_some() {
                    "webhook"
                } else {
                    "log"
                }
            );
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
