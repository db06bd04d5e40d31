use server::clients::chess_com::ChessComClient;
use server::config;
use server::routes;

use anyhow::Context;
use axum::{routing::get, Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        chess_com = %config.chess_com_base_url,
        engine = %config.stockfish_path,
        "Configuration loaded"
    );

    let chess_com = ChessComClient::new(config.chess_com_base_url.clone())?;

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Player lookup
        .route("/api/players/{username}", get(routes::players::get_player_profile))
        .route("/api/players/{username}/stats", get(routes::players::get_player_stats))
        .route("/api/players/{username}/games", get(routes::players::get_player_games))
        // Live review
        .route("/api/review", get(routes::review_ws::ws_handler))
        // Shared state
        .layer(Extension(chess_com))
        .layer(Extension(config.clone()))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
