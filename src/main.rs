// ABOUTME: Main entry point for the keeper vault server storing encrypted per-user secrets
// ABOUTME: Sets up configuration, logging, storage, the access gate and routes

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod blob;
mod config;
mod crypto;
mod entities;
mod error;
mod handlers;
mod middleware;
mod migration;
mod storage;
mod token;
mod types;
mod validation;
mod vault;

#[cfg(test)]
mod integration_tests;

use auth::Accounts;
use blob::{BlobStore, FsBlobStore};
use config::Settings;
use crypto::{Cipher, CipherError};
use storage::Storage;
use token::TokenService;
use vault::Vault;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub vault: Arc<Vault>,
    pub accounts: Accounts,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        storage: Arc<Storage>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self, CipherError> {
        let cipher = Arc::new(Cipher::new(&settings.secret_key)?);
        let tokens = Arc::new(TokenService::new(&settings.secret_key, settings.token_ttl()));
        let vault = Arc::new(Vault::new(
            storage.clone(),
            blobs,
            cipher,
            settings.seal_blobs,
        ));
        let accounts = Accounts::new(storage.clone(), tokens.clone());

        Ok(Self {
            storage,
            vault,
            accounts,
            tokens,
        })
    }
}

pub fn router(state: AppState, settings: &Settings) -> Router {
    let protected = Router::new()
        .route("/api/user/data", get(handlers::list_data))
        .route("/api/user/passwords", post(handlers::add_password))
        .route("/api/user/passwords/:id", get(handlers::get_password))
        .route("/api/user/cards", post(handlers::add_card))
        .route("/api/user/cards/:id", get(handlers::get_card))
        .route("/api/user/texts", post(handlers::add_text))
        .route("/api/user/texts/:id", get(handlers::get_text))
        .route("/api/user/files", post(handlers::add_file))
        .route("/api/user/files/:id", get(handlers::get_file))
        .route(
            "/api/user/files/labels/:label",
            get(handlers::get_file_by_label),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_owner,
        ));

    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/api/user/register", post(auth::register))
        .route("/api/user/token", post(auth::create_token))
        .merge(protected)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(from_fn(middleware::security_headers))
        .layer(TimeoutLayer::new(settings.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(false)))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    init_tracing(settings.log_json)?;

    let storage = Arc::new(Storage::connect(&settings.database_url).await?);
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&settings.blob_dir));
    let state = AppState::new(&settings, storage, blobs)?;

    let app = router(state, &settings);

    let listener = TcpListener::bind(settings.addr).await?;
    tracing::info!(
        seal_blobs = settings.seal_blobs,
        blob_dir = %settings.blob_dir.display(),
        "Server listening on {}",
        settings.addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => tracing::warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
