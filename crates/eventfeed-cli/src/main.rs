mod db;
mod events;
mod feed;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eventfeed_core::{AppConfig, Clock, StoreBackend, SystemClock};
use eventfeed_db::ContentStore;

use crate::db::DbCommands;
use crate::events::EventsCommands;
use crate::feed::FeedCommands;

#[derive(Debug, Parser)]
#[command(name = "eventfeed-cli")]
#[command(about = "Event feed command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Trending feed scoring and ranking
    Feed {
        #[command(subcommand)]
        command: FeedCommands,
    },
    /// Event inspection
    Events {
        #[command(subcommand)]
        command: EventsCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("eventfeed-cli: run with --help to list commands");
        return Ok(());
    };

    let config = eventfeed_core::load_app_config()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        Commands::Db { command } => db::run(command, &config, clock).await,
        Commands::Feed { command } => {
            let store = open_cli_store(&config, Arc::clone(&clock)).await?;
            feed::run(command, store.as_ref(), &config, clock.now()).await
        }
        Commands::Events { command } => {
            let store = open_cli_store(&config, Arc::clone(&clock)).await?;
            events::run(command, store.as_ref(), clock.now()).await
        }
    }
}

/// Open the configured store. A memory store starts empty, so it is filled
/// from the seed file first.
async fn open_cli_store(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn ContentStore>> {
    let now = clock.now();
    let store = eventfeed_db::open_store(config, clock).await?;
    if config.store == StoreBackend::Memory {
        let seed = eventfeed_core::load_seed_file(&config.seed_path)?;
        eventfeed_db::seed_demo_data(store.as_ref(), seed, now).await?;
    }
    Ok(store)
}

fn resolve_seed_path(config: &AppConfig, path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| config.seed_path.clone())
}
