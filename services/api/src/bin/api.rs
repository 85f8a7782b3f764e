//! services/api/src/bin/api.rs
//!
//! Starts the feed service: account REST endpoint, reader WebSocket and Swagger UI.

use api_lib::{
    adapters::{AccountDirectory, DbAdapter, InMemoryAccountDirectory},
    config::Config,
    error::ApiError,
    web::{create_account_handler, rest::ApiDoc, state::AppState, ws_handler},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    routing::{get, post},
    Router,
};
use book_reels_core::{memory::InMemoryProfileStore, ProfileStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type Stores = (Arc<dyn ProfileStore>, Arc<dyn AccountDirectory>);

/// Postgres when `DATABASE_URL` is set, otherwise process-local stores.
async fn connect_stores(config: &Config) -> Result<Stores, ApiError> {
    let Some(database_url) = &config.database_url else {
        warn!("DATABASE_URL is not set; profiles and accounts live in memory only.");
        let profiles: Arc<dyn ProfileStore> = Arc::new(InMemoryProfileStore::new());
        let accounts: Arc<dyn AccountDirectory> = Arc::new(InMemoryAccountDirectory::new());
        return Ok((profiles, accounts));
    };

    info!("Connecting to the profile database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    let db = Arc::new(DbAdapter::new(pool));
    db.run_migrations().await?;
    info!("Profile database ready.");

    let profiles: Arc<dyn ProfileStore> = db.clone();
    let accounts: Arc<dyn AccountDirectory> = db;
    Ok((profiles, accounts))
}

fn cors_layer(config: &Config) -> Result<CorsLayer, ApiError> {
    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid ALLOWED_ORIGIN '{}': {}", config.allowed_origin, e))
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(
        "Feed tuning: wheel cooldown {:?}, swipe threshold {}, reveal delay {:?}",
        config.feed.gestures.wheel_cooldown,
        config.feed.gestures.swipe_threshold,
        config.feed.reveal_delay
    );

    let (profiles, accounts) = connect_stores(&config).await?;
    let app_state = Arc::new(AppState {
        profiles,
        accounts,
        config: config.clone(),
    });

    let feed_routes = Router::new()
        .route("/accounts", post(create_account_handler))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(&config)?)
        .with_state(app_state);

    let app = Router::new()
        .merge(feed_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Feed service listening on {} (Swagger UI at /swagger-ui)", config.bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
