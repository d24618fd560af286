use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bingo_battle::clock::SystemClock;
use bingo_battle::config::{MatchConfig, ServerConfig};
use bingo_battle::game::CategoryPool;
use bingo_battle::store::{JsonFileStore, MatchStore, MemoryStore};
use bingo_battle::{api, broadcast, state::AppState, ws};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bingo_battle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting bingo battle server...");

    let server_config = ServerConfig::from_env();
    let match_config = MatchConfig::from_env();
    let pool = CategoryPool::beat_genres();
    if let Err(e) = match_config.validate(&pool) {
        tracing::error!("Refusing to start: {}", e);
        std::process::exit(1);
    }

    let store: Arc<dyn MatchStore> = match &server_config.data_dir {
        Some(dir) => match JsonFileStore::open(dir.clone()).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!("Cannot open match store at {}: {}", dir.display(), e);
                std::process::exit(1);
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    let state = Arc::new(AppState::with_parts(
        match_config,
        pool,
        store,
        Arc::new(SystemClock),
        StdRng::from_os_rng(),
    ));

    match state.restore().await {
        Ok(live) => tracing::info!("{} match(es) resumed", live),
        Err(e) => tracing::warn!("Could not restore matches: {}", e),
    }

    broadcast::spawn_deadline_watcher(state.clone(), server_config.deadline_tick);
    broadcast::spawn_vote_broadcaster(state.clone(), server_config.deadline_tick);
    broadcast::spawn_rating_updater(state.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
