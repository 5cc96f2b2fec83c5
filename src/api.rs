//! HTTP ingest boundary and read-only history endpoints.
//!
//! | Method | Path | |
//! |--------|------|-|
//! | POST | `/api/v1/track` | ingest one report |
//! | GET | `/api/v1/buses` | list routes |
//! | GET | `/api/v1/buses/{bus_id}` | one route |
//! | GET | `/api/v1/buses/{bus_id}/history?limit=N` | recent positions, newest first |
//! | GET | `/api/v1/buses/{bus_id}/latest` | most recent position |
//! | GET | `/health` | liveness |

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::catalog::RouteDefinition;
use crate::error::{IngestionError, ResolveError};
use crate::pipeline::IngestionPipeline;
use crate::record::PositionRecord;
use crate::report::PositionReport;

pub const DEFAULT_HISTORY_LIMIT: usize = 25;
pub const MAX_HISTORY_LIMIT: usize = 100;

pub type AppState = Arc<IngestionPipeline>;

/// Reply to `POST /api/v1/track`: `{ok: true, stored}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored: Option<PositionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl TrackResponse {
    pub fn stored(record: PositionRecord) -> Self {
        Self { ok: true, stored: Some(record), error: None, code: None }
    }

    pub fn failed(code: &str, error: String) -> Self {
        Self { ok: false, stored: None, error: Some(error), code: Some(code.to_string()) }
    }
}

/// A stored record plus its human-readable time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub record: PositionRecord,
    #[serde(rename = "FormattedTime")]
    pub formatted_time: String,
}

impl From<PositionRecord> for HistoryItem {
    fn from(record: PositionRecord) -> Self {
        let formatted_time = record.formatted_time();
        Self { record, formatted_time }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub bus_id: String,
    pub route: String,
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Failure reply for the read endpoints.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: TrackResponse,
}

impl ApiError {
    fn not_found(bus_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: TrackResponse::failed(
                "unknown_vehicle",
                format!("Bus {} not found", bus_id.trim().to_uppercase()),
            ),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        Self { status: status_for(&err), body: TrackResponse::failed(err.code(), err.to_string()) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn status_for(err: &IngestionError) -> StatusCode {
    match err {
        IngestionError::Validation(_) => StatusCode::BAD_REQUEST,
        IngestionError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        IngestionError::Resolve(ResolveError::EmptyRoute(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/track", post(track))
        .route("/api/v1/buses", get(list_buses))
        .route("/api/v1/buses/{bus_id}", get(bus_details))
        .route("/api/v1/buses/{bus_id}/history", get(bus_history))
        .route("/api/v1/buses/{bus_id}/latest", get(bus_latest))
        .route("/health", get(health))
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr, routes = state.catalog().len(), "Ingest server listening");
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}

/// Accepts any body and reports decoding problems in the JSON envelope.
pub async fn track(
    State(pipeline): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<TrackResponse>) {
    let report: PositionReport = match serde_json::from_slice(&body) {
        Ok(report) => report,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(TrackResponse::failed("invalid_body", format!("invalid JSON body: {e}"))),
            );
        }
    };

    match pipeline.ingest(&report).await {
        Ok(record) => (StatusCode::OK, Json(TrackResponse::stored(record))),
        Err(e) => {
            if !e.is_client_error() {
                error!(code = e.code(), error = %e, "Ingest failed");
            }
            (status_for(&e), Json(TrackResponse::failed(e.code(), e.to_string())))
        }
    }
}

pub async fn list_buses(State(pipeline): State<AppState>) -> Json<Vec<RouteDefinition>> {
    Json(pipeline.catalog().iter().cloned().collect())
}

pub async fn bus_details(
    State(pipeline): State<AppState>,
    Path(bus_id): Path<String>,
) -> Result<Json<RouteDefinition>, ApiError> {
    pipeline
        .catalog()
        .lookup(&bus_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(&bus_id))
}

pub async fn bus_history(
    State(pipeline): State<AppState>,
    Path(bus_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    history(&pipeline, &bus_id, limit).await.map(Json)
}

pub async fn bus_latest(
    State(pipeline): State<AppState>,
    Path(bus_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    history(&pipeline, &bus_id, 1).await.map(Json)
}

async fn history(
    pipeline: &IngestionPipeline,
    bus_id: &str,
    limit: usize,
) -> Result<HistoryResponse, ApiError> {
    if pipeline.catalog().lookup(bus_id).is_none() {
        return Err(ApiError::not_found(bus_id));
    }
    let (route, records) = pipeline.recent_history(bus_id, limit).await?;
    Ok(HistoryResponse {
        ok: true,
        bus_id: route.vehicle_id.clone(),
        route: route.route_label.clone(),
        items: records.into_iter().map(HistoryItem::from).collect(),
    })
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
