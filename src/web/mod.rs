mod admin;
mod auth;
mod comments;
mod extract;
mod friends;
mod geocode;
mod likes;
mod posts;
mod reports;
mod routes;
mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::db::Database;
use crate::geocode::GeocodeClient;
use crate::media::MediaStore;

/// URL prefix uploaded files are served under.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Multipart framing on top of the largest accepted file.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub tokens: TokenKeys,
    pub media: MediaStore,
    pub geocoder: GeocodeClient,
}

impl AppState {
    /// Build the state from configuration and an open database.
    ///
    /// # Errors
    ///
    /// Returns an error if the geocoding client cannot be created.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let tokens = TokenKeys::new(config.jwt_secret.as_bytes(), config.jwt_access_token_ttl);
        let media = MediaStore::new(config.media_dir.clone(), MEDIA_URL_PREFIX);
        let geocoder = GeocodeClient::new(
            &config.geocode_url,
            config.google_maps_api_key.clone(),
            config.geocode_timeout,
        )?;

        Ok(Self {
            db,
            config: Arc::new(config),
            tokens,
            media,
            geocoder,
        })
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Start the web server and run until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    let media_dir = state.media.root().to_path_buf();
    info!(media_dir = %media_dir.display(), "Serving uploaded media");

    let body_limit = state
        .config
        .max_post_upload_bytes
        .max(state.config.max_profile_picture_bytes)
        + BODY_LIMIT_SLACK;

    Router::new()
        .merge(routes::router())
        .nest_service(MEDIA_URL_PREFIX, ServeDir::new(media_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config.cors_allow_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allow_origin: &str) -> CorsLayer {
    let origin = if allow_origin == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allow_origin
            .split(',')
            .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
