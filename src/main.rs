mod circuit_breaker;
mod config;
mod consolidation;
mod discovery;
mod errors;
mod field_transfer;
mod handlers;
mod merge;
mod models;
mod normalize;
mod relationships;
mod resolution;
mod scoring;
mod token;
mod zoho_client;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use crate::config::Config;
use crate::token::TokenProvider;
use crate::zoho_client::ZohoClient;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::resolve_contact,
        handlers::preview_candidates,
        handlers::get_score
    ),
    components(schemas(
        models::ResolutionReport,
        models::ResolutionStatus,
        models::ConsolidationOutcome,
        models::ScoreResult,
        handlers::CandidatePreview
    ))
)]
struct ApiDoc;

/// Serves the OpenAPI specification as JSON.
async fn serve_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page, configured to load the OpenAPI
/// specification served by `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CRM Dedup API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the CRM client with its credential
/// provider, the in-flight resolution guard, and the HTTP routes with
/// rate limiting, body limits, CORS and tracing, then starts the server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_dedup_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Credential provider + CRM client; credentials are validated lazily on
    // the first call, placeholder values were already rejected by Config
    let tokens = TokenProvider::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize token provider: {}", e))?;
    let zoho = ZohoClient::new(config.zoho_api_base.clone(), tokens)
        .map_err(|e| anyhow::anyhow!("Failed to initialize CRM client: {}", e))?;
    tracing::info!("CRM client initialized: {}", config.zoho_api_base);

    // In-flight resolution guard (5 minute TTL covers one full run)
    let processing_cache = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("In-flight resolution guard initialized");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        zoho,
        processing_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.json", get(serve_openapi_spec))
        // Resolution endpoints
        .route(
            "/api/v1/dedup/contacts/:id",
            post(handlers::resolve_contact),
        )
        .route(
            "/api/v1/dedup/contacts/:id/candidates",
            get(handlers::preview_candidates),
        )
        .route("/api/v1/score/:module/:id", get(handlers::get_score))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
