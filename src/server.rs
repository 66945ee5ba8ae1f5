//! HTTP server.
//!
//! Exposes the harvester over a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Sweep, ingest channels for a user query, extract insights |
//! | `POST` | `/discover` | Suggest channels for a query |
//! | `GET`  | `/insights` | Most recent insights, optionally scoped by `userId` / `query` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "userId must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `all_sources_unavailable` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use signal_harvest_core::models::{Insight, Scope};

use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::harvest::Harvester;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

const DEFAULT_INSIGHT_LIMIT: usize = 20;
const MAX_INSIGHT_LIMIT: usize = 100;

#[derive(Clone)]
struct AppState {
    harvester: Arc<Harvester>,
}

/// Start the server on `[server].bind` over the configured database,
/// Reddit source and completion provider.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let harvester = Arc::new(Harvester::from_config(config, store)?);

    run_server_with(&config.server.bind, harvester).await
}

/// Start the server on `bind` with an already-built harvester.
pub async fn run_server_with(bind: &str, harvester: Arc<Harvester>) -> anyhow::Result<()> {
    let app = router(harvester);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(harvester: Arc<Harvester>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/discover", post(handle_discover))
        .route("/insights", get(handle_insights))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { harvester })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoChannels => bad_request(err.to_string()),
            PipelineError::AllSourcesFailed { .. } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "all_sources_unavailable".to_string(),
                message: err.to_string(),
            },
            PipelineError::Store(_) => internal(err.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    success: bool,
    inserted_posts: u64,
    skipped_channels: Vec<String>,
    scraped_channels: Vec<String>,
    insights_created: u64,
}

/// Handler for `POST /ingest`.
///
/// An empty `channels` list is filled in by channel discovery. The insight
/// run for the same scope completes before the response is sent.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let user_id = req.user_id.trim();
    let query = req.query.trim();
    if user_id.is_empty() {
        return Err(bad_request("userId must not be empty"));
    }
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    // Malformed names are reported as skipped by the ingestion pipeline.
    let mut channels: Vec<String> = req
        .channels
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    if channels.is_empty() {
        channels = state.harvester.discover(query).await;
    }

    let scope = Scope::custom(query, user_id);
    let report = state.harvester.run_request(&scope, &channels).await?;

    Ok(Json(IngestResponse {
        success: true,
        inserted_posts: report.ingest.inserted_count,
        skipped_channels: report.ingest.skipped_channels,
        scraped_channels: report.ingest.scraped_channels,
        insights_created: report.insights.map(|r| r.created).unwrap_or(0),
    }))
}

// ============ POST /discover ============

#[derive(Deserialize)]
struct DiscoverRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct DiscoverResponse {
    channels: Vec<String>,
}

async fn handle_discover(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> Result<Json<DiscoverResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    Ok(Json(DiscoverResponse {
        channels: state.harvester.discover(query).await,
    }))
}

// ============ GET /insights ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightsParams {
    user_id: Option<String>,
    query: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct InsightsResponse {
    insights: Vec<Insight>,
}

/// Handler for `GET /insights`.
///
/// Without `userId`, returns insights for background posts only.
async fn handle_insights(
    State(state): State<AppState>,
    Query(params): Query<InsightsParams>,
) -> Result<Json<InsightsResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT);
    if limit == 0 || limit > MAX_INSIGHT_LIMIT {
        return Err(bad_request(format!(
            "limit must be in [1, {}]",
            MAX_INSIGHT_LIMIT
        )));
    }

    let scope = Scope::custom(
        params.query.unwrap_or_default(),
        params.user_id.unwrap_or_default(),
    );
    if scope.user_id().is_none() && scope.query().is_some() {
        return Err(bad_request("query requires userId"));
    }

    let insights = state
        .harvester
        .recent_insights(&scope, limit)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(InsightsResponse { insights }))
}
