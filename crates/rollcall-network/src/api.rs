//! HTTP control API.
//!
//! Handlers translate JSON requests into [`ControlRequest`]s and wait for the
//! engine's reply through the [`ControlHandle`]. Input validation (body
//! presence, JSON syntax, id range) happens here, so a malformed request never
//! reaches the engine or the sensor.

use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_core::FingerprintId;
use rollcall_engine::{ControlHandle, ControlRequest, ControlResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const STATUS_PAGE: &str = include_str!("status_page.html");

/// Listener configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    control: ControlHandle,
}

impl ApiState {
    pub fn new(control: ControlHandle) -> Self {
        Self { control }
    }

    async fn request(&self, request: ControlRequest) -> Result<ControlResponse, ApiError> {
        Ok(self.control.request(request).await?)
    }
}

/// Build the API router.
pub fn router(control: ControlHandle) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/fingerprints", get(list_fingerprints))
        .route("/enroll", post(enroll))
        .route("/enroll/cancel", post(cancel_enrollment))
        .route("/enrollment", get(enrollment_status))
        .route("/delete", post(delete))
        .route("/attendance", post(set_attendance))
        .route("/fingerprint-mode", post(set_fingerprint_mode))
        .route("/attendance-records", get(records))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState::new(control))
}

/// Bind the configured address.
pub async fn bind(config: &ApiConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(config.bind).await?;
    info!("Control API listening on http://{}", listener.local_addr()?);
    Ok(listener)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    control: ControlHandle,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(control))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn index() -> Html<&'static str> {
    Html(STATUS_PAGE)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

async fn status(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let ControlResponse::Status(report) = state.request(ControlRequest::Status).await? else {
        return Err(ApiError::UnexpectedReply);
    };

    let link = if report.connected {
        "connected"
    } else {
        "disconnected"
    };

    Ok(Json(json!({
        "status": link,
        "fingerprint_sensor": report.fingerprint_required,
        "attendance_mode": report.attendance_enabled,
        "sensor_available": report.sensor_available,
        "uptime": report.uptime_ms,
        "scan_phase": report.scan_phase,
        "enrollment_phase": report.enrollment_phase,
        "records": report.record_count,
        "telemetry": report.telemetry,
    })))
}

async fn list_fingerprints(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let ControlResponse::Fingerprints(ids) = state.request(ControlRequest::ListFingerprints).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    let entries: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "status": "stored" }))
        .collect();

    Ok(Json(json!({ "fingerprints": entries, "total": ids.len() })))
}

async fn enroll(State(state): State<ApiState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let id = id_field(&parse_body(&body)?)?;

    let ControlResponse::EnrollmentStarted { id } = state.request(ControlRequest::Enroll { id }).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    Ok(Json(json!({
        "message": "Enrollment started. Please place finger on sensor.",
        "id": id,
    })))
}

async fn cancel_enrollment(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let ControlResponse::EnrollmentCancelled { id } =
        state.request(ControlRequest::CancelEnrollment).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    Ok(Json(json!({ "message": "Enrollment cancelled", "id": id })))
}

async fn enrollment_status(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let ControlResponse::Enrollment(status) = state.request(ControlRequest::EnrollmentStatus).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    Ok(Json(json!(status)))
}

async fn delete(State(state): State<ApiState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let id = id_field(&parse_body(&body)?)?;

    let ControlResponse::Deleted { id } = state.request(ControlRequest::Delete { id }).await? else {
        return Err(ApiError::UnexpectedReply);
    };

    Ok(Json(json!({ "message": "Fingerprint deleted successfully", "id": id })))
}

async fn set_attendance(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let enabled = mode_field(&parse_body(&body)?)?;

    let ControlResponse::AttendanceMode { enabled } =
        state.request(ControlRequest::SetAttendance { enabled }).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    let message = if enabled {
        "Attendance mode activated"
    } else {
        "Attendance mode deactivated"
    };
    Ok(Json(json!({ "message": message, "mode": enabled })))
}

async fn set_fingerprint_mode(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let required = mode_field(&parse_body(&body)?)?;

    let ControlResponse::FingerprintMode { required } = state
        .request(ControlRequest::SetFingerprintRequired { required })
        .await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    let message = if required {
        "Fingerprint mode enabled"
    } else {
        "Fingerprint mode disabled"
    };
    Ok(Json(json!({ "message": message, "mode": required })))
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    limit: Option<usize>,
}

async fn records(
    State(state): State<ApiState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let limit = query.limit.unwrap_or(usize::MAX);

    let ControlResponse::Records(records) = state.request(ControlRequest::Records { limit }).await?
    else {
        return Err(ApiError::UnexpectedReply);
    };

    Ok(Json(json!({ "total": records.len(), "records": records })))
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))
}

/// A missing or non-integer id is treated as 0 and therefore out of range.
fn id_field(body: &Value) -> Result<FingerprintId, ApiError> {
    let raw = body.get("id").and_then(Value::as_i64).unwrap_or(0);
    FingerprintId::try_from(raw).map_err(|_| ApiError::InvalidId { value: raw })
}

fn mode_field(body: &Value) -> Result<bool, ApiError> {
    body.get("mode")
        .and_then(Value::as_bool)
        .ok_or(ApiError::MissingField("mode"))
}
