//! HTTP API over the insights engine
//!
//! Upload failures are the only client-visible errors. Reads over missing
//! data and predictions without a trained model answer 200 with empty or
//! `unavailable` payloads.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hirewise_lib::analytics::FilterSpec;
use hirewise_lib::predictor::PositionFields;
use hirewise_lib::{render_metrics, InsightsEngine, SheetKind, UploadId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InsightsEngine>,
}

impl AppState {
    pub fn new(engine: Arc<InsightsEngine>) -> Self {
        Self { engine }
    }
}

/// JSON error body with a status code
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    filename: String,
    kind: Option<SheetKind>,
}

#[derive(Debug, Deserialize)]
struct BatchParams {
    upload_id: Option<UploadId>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.engine.get_ml_status();
    Json(json!({
        "status": "ok",
        "is_trained": status.is_trained,
        "model_version": status.version,
    }))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    match render_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => ApiError::internal(e.to_string()).into_response(),
    }
}

/// Ingest a raw workbook or CSV body and retrain
async fn upload(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let engine = Arc::clone(&state.engine);
    let filename = params.filename.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.ingest(&filename, &body, params.kind))
        .await
        .map_err(|e| {
            error!(error = %e, "Ingestion task panicked");
            ApiError::internal("ingestion task failed")
        })?
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    info!(
        filename = %params.filename,
        upload_id = outcome.upload_id,
        duplicate = outcome.duplicate,
        "Upload handled"
    );
    Ok(Json(outcome))
}

async fn list_uploads(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.list_uploads())
}

async fn filter_options(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<SheetKind>,
    Query(params): Query<BatchParams>,
) -> impl IntoResponse {
    Json(state.engine.get_filter_options(kind, params.upload_id))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<SheetKind>,
    Query(params): Query<BatchParams>,
    filter: Option<Json<FilterSpec>>,
) -> impl IntoResponse {
    let filter = filter.map(|Json(f)| f).unwrap_or_default();
    Json(state.engine.get_dashboard_data(kind, params.upload_id, &filter))
}

async fn ml_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.get_ml_status())
}

async fn predict_time_to_fill(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<PositionFields>,
) -> impl IntoResponse {
    Json(state.engine.predict_time_to_fill(&fields))
}

async fn forecast(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<PositionFields>,
) -> impl IntoResponse {
    Json(state.engine.forecast(&fields))
}

async fn anomalies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BatchParams>,
) -> impl IntoResponse {
    Json(state.engine.detect_anomalies(params.upload_id))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/uploads", get(list_uploads))
        .route("/api/filter-options/:kind", get(filter_options))
        .route("/api/dashboard/:kind", post(dashboard))
        .route("/api/ml-status", get(ml_status))
        .route("/api/predictions/time-to-fill", post(predict_time_to_fill))
        .route("/api/predictions", post(forecast))
        .route("/api/anomalies", get(anomalies))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>, max_upload_bytes: usize) -> anyhow::Result<()> {
    let app = create_router(state, max_upload_bytes);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
