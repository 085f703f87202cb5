mod config;
mod db;
mod error;
mod rate_limit;
mod routes;
mod services;
mod state;
mod verification;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let extractor = std::sync::Arc::new(services::extract::CommandExtractor::new(&config.extract));
    let media = services::media::from_config(&config.media).expect("media store init failed");
    tracing::info!(
        media_root = %config.media.root.display(),
        cloudinary = matches!(config.media.backend, config::MediaBackend::Cloudinary { .. }),
        "media store ready"
    );

    let _sweeper = services::session::spawn_session_sweeper(pool.clone(), SESSION_SWEEP_INTERVAL);

    let state = state::AppState::new(pool, config, extractor, media);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "validify listening");
    axum::serve(listener, app).await.expect("server failed");
}
