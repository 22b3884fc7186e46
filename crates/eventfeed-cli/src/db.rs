//! `db` subcommands: connectivity, migrations and demo seeding.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use eventfeed_core::{AppConfig, Clock};

use crate::resolve_seed_path;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the configured database answers
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load demo events and posts into the configured store
    Seed {
        /// Seed file to load (defaults to `SEED_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub(crate) async fn run(
    command: DbCommands,
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            let pool = eventfeed_db::connect_pool_from_config(config).await?;
            eventfeed_db::ping(&pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let pool = eventfeed_db::connect_pool_from_config(config).await?;
            let applied = eventfeed_db::run_migrations(&pool).await?;
            println!("migrations up to date ({applied} applied)");
        }
        DbCommands::Seed { path } => {
            let path = resolve_seed_path(config, path);
            let seed = eventfeed_core::load_seed_file(&path)?;
            let now = clock.now();
            let store = eventfeed_db::open_store(config, clock).await?;
            let summary = eventfeed_db::seed_demo_data(store.as_ref(), seed, now).await?;
            println!(
                "seeded {} events and {} posts into the {} store from {}",
                summary.events,
                summary.posts,
                store.backend_name(),
                path.display()
            );
        }
    }
    Ok(())
}
