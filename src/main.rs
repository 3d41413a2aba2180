use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardroom::{
    api,
    cards::{CardPool, CardRepository, JsonFileRepository},
    config::ServerConfig,
    state::AppState,
    ws,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cardroom...");

    let config = ServerConfig::from_env();

    let repository = Arc::new(JsonFileRepository::new(&config.cards_path));
    let cards = match repository.load().await.map(|packs| CardPool::from_packs(&packs)) {
        Ok(Ok(cards)) => cards,
        Ok(Err(e)) | Err(e) => {
            tracing::error!(
                "Failed to load cards from {}: {}",
                config.cards_path.display(),
                e
            );
            std::process::exit(1);
        }
    };
    let (white, black) = cards.counts().await;
    tracing::info!("Loaded {} white and {} black cards", white, black);

    let state = Arc::new(AppState::new(cards, repository, config.game.clone()));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(api::routes())
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::new(config.bind_addr, config.port);
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
