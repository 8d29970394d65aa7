use std::sync::Arc;

use redis_timeline::{create_router, sweep, AppState, RedisStore, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> redis_timeline::Result<()> {
    // ── 1. Configuration ─────────────────────────────────────────
    let config = ServerConfig::from_env()?;

    // ── 2. Connect to Redis ──────────────────────────────────────
    let store = RedisStore::connect(&config.redis_url).await?;

    // ── 3. Shared state + periodic reduction ─────────────────────
    let state = Arc::new(AppState::new(Arc::new(store), config.namespace.clone()));
    let sweeper = sweep::spawn(state.registry.clone(), config.sweep_period);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;

    info!(addr = %config.bind, namespace = %config.namespace, "timeline service listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await;

    sweeper.stop().await;
    served?;
    Ok(())
}
