//! Thin HTTP wiring over the query-processing core (§6). Route handlers,
//! request validation beyond what `Query::new` already enforces,
//! authentication, and rate limiting are explicitly out of scope — this is
//! the minimal surface the core needs to be reachable over HTTP at all.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::monitoring::MonitoringService;
use crate::processor::QueryProcessor;
use crate::registry::DataSourceRegistry;
use crate::types::{Filter, Metadata, QueryResult};

#[derive(Clone)]
pub struct AppState {
    processor: Arc<QueryProcessor>,
    registry: Arc<DataSourceRegistry>,
    monitoring: Arc<MonitoringService>,
    async_results: Arc<DashMap<Uuid, QueryResult>>,
}

pub struct SearchServer {
    app: Router,
    host: String,
    port: u16,
}

impl SearchServer {
    pub fn new(
        config: &Config,
        processor: Arc<QueryProcessor>,
        registry: Arc<DataSourceRegistry>,
        monitoring: Arc<MonitoringService>,
    ) -> Self {
        let state = AppState { processor, registry, monitoring, async_results: Arc::new(DashMap::new()) };

        let app = Router::new()
            .route("/query", post(query_handler))
            .route("/query/async", post(query_async_handler))
            .route("/query/:id", get(query_status_handler))
            .route("/query/:id", delete(query_cancel_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        Self { app, host: config.server.host.clone(), port: config.server.port }
    }

    pub async fn run(self) -> CoreResult<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| CoreError::Processing(format!("failed to bind to {addr}: {e}")))?;

        info!("server listening on {addr}");

        axum::serve(listener, self.app)
            .await
            .map_err(|e| CoreError::Processing(format!("server error: {e}")))?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub context: Option<Metadata>,
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
}

#[derive(Debug, Serialize)]
struct ResponseMetadata {
    correlation_id: Uuid,
}

#[derive(Debug, Serialize)]
struct QueryResponseBody {
    query: String,
    result: QueryResult,
    metadata: ResponseMetadata,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

fn error_response(error: CoreError) -> (StatusCode, Json<ErrorBody>) {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let retry_after = error.retry_after_secs();
    (status, Json(ErrorBody { error: error.to_string(), retry_after }))
}

/// `POST /query` (§6): 200 for confidence > 0.5, 206 otherwise; errors map
/// through `CoreError::status_code()`.
async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<(StatusCode, Json<QueryResponseBody>), (StatusCode, Json<ErrorBody>)> {
    let text = request.text.clone();
    let result = state
        .processor
        .process(&request.text, request.context, request.filters)
        .await
        .map_err(|e| {
            error!("query failed: {e}");
            error_response(e)
        })?;

    let status = if result.confidence > 0.5 { StatusCode::OK } else { StatusCode::PARTIAL_CONTENT };
    let correlation_id = result.id;
    Ok((status, Json(QueryResponseBody { query: text, result, metadata: ResponseMetadata { correlation_id } })))
}

#[derive(Debug, Serialize)]
struct AsyncAcceptedBody {
    query_id: Uuid,
    status: &'static str,
    status_url: String,
}

/// `POST /query/async` (§6): 202 immediately; the query runs on a
/// detached task and its result lands in `async_results` for later
/// retrieval via `GET /query/{id}`.
async fn query_async_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<AsyncAcceptedBody>) {
    let query_id = Uuid::new_v4();
    let status_url = format!("/query/{query_id}");

    let processor = state.processor.clone();
    let async_results = state.async_results.clone();
    tokio::spawn(async move {
        match processor.process(&request.text, request.context, request.filters).await {
            Ok(result) => {
                async_results.insert(query_id, result);
            }
            Err(e) => {
                error!("async query {query_id} failed: {e}");
            }
        }
    });

    (StatusCode::ACCEPTED, Json(AsyncAcceptedBody { query_id, status: "processing", status_url }))
}

/// `GET /query/{id}` (§6): 202 while in flight (tracked by the processor's
/// admission table), 200 once the async result has landed, 404 once it's
/// been consumed or never existed.
async fn query_status_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<QueryResult>, StatusCode> {
    if state.processor.status(id).is_some() {
        return Err(StatusCode::ACCEPTED);
    }
    match state.async_results.remove(&id) {
        Some((_, result)) => Ok(Json(result)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// `DELETE /query/{id}` (§6): cancellation.
async fn query_cancel_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.processor.cancel(id) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let active_sources = state.registry.get_active().len();
    let in_flight = state.processor.active_count();
    let tracked = state.monitoring.warmer.tracked_fingerprints();
    Json(serde_json::json!({
        "active_sources": active_sources,
        "in_flight_queries": in_flight,
        "tracked_fingerprints": tracked,
    }))
}
