//! HTTP routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use valuation_core::{BenchmarkRow, Error, RawPracticeInput, ValuationResult};

use crate::query::{HealthReport, QueryService};

/// Build the API router.
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/predict", post(predict))
        .route("/api/benchmarks", get(benchmarks))
        .with_state(service)
}

/// Error body returned for non-2xx responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Engine error mapped to an HTTP status.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_unavailable() {
            warn!(error = %self.0, "request rejected");
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BenchmarksQuery {
    pub province: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BenchmarksResponse {
    pub rows: Vec<BenchmarkRow>,
}

async fn health(State(service): State<Arc<QueryService>>) -> Json<HealthReport> {
    Json(service.health())
}

async fn predict(
    State(service): State<Arc<QueryService>>,
    Json(raw): Json<RawPracticeInput>,
) -> Result<Json<ValuationResult>, ApiError> {
    Ok(Json(service.predict(&raw)?))
}

async fn benchmarks(
    State(service): State<Arc<QueryService>>,
    Query(query): Query<BenchmarksQuery>,
) -> Result<Json<BenchmarksResponse>, ApiError> {
    let province = query.province.as_deref().filter(|p| !p.trim().is_empty());
    let rows = service.benchmarks(province)?;
    Ok(Json(BenchmarksResponse { rows }))
}
