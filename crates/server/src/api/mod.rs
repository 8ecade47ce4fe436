//! HTTP surface of the mock.
//!
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! The OAuth2 routes themselves live in [`crate::oauth2`].

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::config::{AppConfig, CorsConfig};
use crate::oauth2::{self, OAuth2State};
use axum::{
    Router,
    http::{HeaderValue, Method},
};
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Builds the CORS layer for the configured origins. Credentials are allowed,
/// so wildcard origins are rejected.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            if origin == "*" {
                tracing::warn!("Ignoring wildcard CORS origin, credentials are allowed");
                return None;
            }
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the full application router: OAuth2 routes, health check, API docs.
pub fn app(state: OAuth2State, cors: &CorsConfig) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(oauth2::router(state))
        .routes(routes!(health::health))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip_all, fields(addr = %config.listen_addr))]
pub async fn start_webserver(state: OAuth2State, config: &AppConfig) -> color_eyre::Result<()> {
    let router = app(state, &config.cors);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Server running");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
