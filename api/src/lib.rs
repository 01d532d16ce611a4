use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod playlist;
pub mod session;
pub mod spotify;
pub mod store;

use config::{Config, AUTH_CALLBACK_PATH};
use session::SessionStore;
use spotify::StreamingProvider;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub provider: Arc<dyn StreamingProvider>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn StreamingProvider>) -> Self {
        Self {
            store,
            provider,
            sessions: SessionStore::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::index))
        .route("/login", get(auth::login))
        .route(AUTH_CALLBACK_PATH, get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/profile", get(handlers::profile))
        .route("/playlists", get(handlers::playlists))
        .route("/playlists/:id", delete(handlers::delete_playlist))
        .route("/festivals", get(handlers::festivals))
        .route(
            "/festivals/:id",
            get(handlers::festival).post(handlers::create_festival_playlist),
        )
        .route("/artists", get(handlers::artists))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("festy_api=debug,tower_http=debug")),
        )
        .init();
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env();

    let pool = db::init_db(&config.database_url)
        .await
        .context("failed to initialize database")?;
    tracing::info!("database initialized");

    let provider = spotify::SpotifyClient::new(&config.spotify)?;
    let state = AppState::new(Arc::new(db::PgStore::new(pool)), Arc::new(provider));

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
