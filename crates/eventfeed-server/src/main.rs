mod api;
mod middleware;

use std::sync::Arc;

use eventfeed_core::{Clock, StoreBackend, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = eventfeed_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = eventfeed_db::open_store(&config, Arc::clone(&clock)).await?;

    if config.store == StoreBackend::Memory && config.is_development() {
        seed_memory_store(store.as_ref(), &config, clock.now()).await?;
    }

    let auth = AuthState::from_env(config.is_development())?;
    let state = AppState {
        store,
        clock,
        feed: config.feed,
        policy: config.trending_policy,
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        env = %config.env,
        store = %config.store,
        "eventfeed server listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Fill a fresh in-memory store from the seed file so local runs have content.
async fn seed_memory_store(
    store: &dyn eventfeed_db::ContentStore,
    config: &eventfeed_core::AppConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<()> {
    if !config.seed_path.exists() {
        tracing::warn!(
            path = %config.seed_path.display(),
            "seed file not found; starting with an empty store"
        );
        return Ok(());
    }
    let seed = eventfeed_core::load_seed_file(&config.seed_path)?;
    eventfeed_db::seed_demo_data(store, seed, now).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
