//! # uprelay: multipart upload relay for workspace volumes
//!
//! `uprelay` accepts a single file upload over HTTP and writes it into a workspace volume via the
//! Files API, authenticating with the caller's bearer token. The remote answer is translated into
//! a normalized JSON result.
//!
//! ## Request Flow
//!
//! A `POST` with `multipart/form-data` carrying `file`, `workspace_url`, `databricks_token` and
//! `catalog_path` goes through a linear pipeline, returning early at the first failing gate:
//!
//! 1. The body is parsed and file parts are spooled to temporary files ([`form`]).
//! 2. Required fields are checked and repeated fields collapse to their first value.
//! 3. `catalog_path` is split into catalog and schema.
//! 4. The spooled file is read back and sent with one `PUT` to
//!    `{workspace_url}/api/2.0/fs/files/Volumes/{catalog}/{schema}/default/{file_name}`
//!    ([`upstream`]).
//! 5. The upstream status is mapped to a success body or an error body ([`errors`]).
//!
//! `OPTIONS` requests are answered by the CORS layer before routing. Every other method answers
//! `405`. Requests are independent: nothing is cached or retried.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use uprelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     uprelay::install_crypto_provider();
//!     let args = uprelay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     uprelay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod form;
mod openapi;
pub mod telemetry;
pub mod upstream;

#[cfg(test)]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::upstream::{FilesApiReqwest, VolumeUploader};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .uploader(Arc::new(FilesApiReqwest::new(&config.upstream)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    /// Writes files into workspace volumes
    pub uploader: Arc<dyn VolumeUploader>,
}

/// Install the process-wide rustls crypto provider. Safe to call more than once.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Create CORS layer from configuration.
///
/// The layer answers every `OPTIONS` request itself with `200` and an empty body, so preflights
/// never reach the upload handler.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let wildcard = config
        .cors
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard));

    let allow_origin = if wildcard {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a trailing slash, unlike serialized URLs
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/healthz` liveness probe
/// - `/openapi.json` API description
/// - every other path: the upload surface (`POST` relays, other methods get `405`)
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.upload.max_file_size)?;
    let cors_layer = create_cors_layer(&state.config)?;

    let upload_surface = post(api::handlers::upload::upload_file)
        .fallback(api::handlers::upload::method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .fallback_service(upload_surface)
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with its HTTP client and router
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting upload relay with configuration: {:#?}", config);

        let uploader = Arc::new(FilesApiReqwest::new(&config.upstream)?);
        let state = AppState::builder().config(config.clone()).uploader(uploader).build();
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Upload relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;
    use url::Url;

    #[tokio::test]
    async fn test_healthz() {
        let app = create_test_app(create_test_config());

        let response = app.get("/healthz").await;

        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_openapi_json() {
        let app = create_test_app(create_test_config());

        let response = app.get("/openapi.json").await;

        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/api/upload-to-databricks"]["post"].is_object());
    }

    #[tokio::test]
    async fn test_cors_header_on_regular_responses() {
        let app = create_test_app(create_test_config());

        let response = app.get("/api/upload-to-databricks").add_header("origin", "https://app.example.com").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("access-control-allow-origin"), "*");
    }

    #[tokio::test]
    async fn test_cors_restricted_origins() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://app.example.com").unwrap())];
        let app = create_test_app(config);

        let response = app
            .method(Method::OPTIONS, "/")
            .add_header("origin", "https://app.example.com")
            .add_header("access-control-request-method", "POST")
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("access-control-allow-origin"), "https://app.example.com");

        let response = app
            .method(Method::OPTIONS, "/")
            .add_header("origin", "https://evil.example.com")
            .add_header("access-control-request-method", "POST")
            .await;

        response.assert_status_ok();
        assert!(response.maybe_header("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_body_limit_is_unhandled_error() {
        let mut config = create_test_config();
        config.upload.max_file_size = 16;
        let app = create_test_app(config);

        let response = app
            .post("/api/upload-to-databricks")
            .multipart(crate::test_utils::upload_form("http://localhost", "cat/sch", "big.bin", &[0u8; 1024]))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], false);
    }
}
