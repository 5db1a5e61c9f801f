//! HTTP error mapping for the control API.
//!
//! Every refusal is answered with a JSON body of the form
//! `{"error": <message>, "reason": <code>}`, plus `"code"` when the sensor
//! reported a confirmation code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rollcall_core::constants::{MAX_FINGERPRINT_ID, MIN_FINGERPRINT_ID};
use rollcall_engine::ControlError;
use serde_json::json;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No data received")]
    EmptyBody,

    #[error("Invalid JSON")]
    InvalidJson(String),

    #[error("Invalid ID. Must be between {MIN_FINGERPRINT_ID} and {MAX_FINGERPRINT_ID}")]
    InvalidId { value: i64 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid query string")]
    InvalidQuery(String),

    #[error(transparent)]
    Control(#[from] ControlError),

    /// The engine answered with a reply of the wrong kind.
    #[error("Unexpected reply from engine")]
    UnexpectedReply,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptyBody
            | Self::InvalidJson(_)
            | Self::InvalidId { .. }
            | Self::MissingField(_)
            | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Control(error) => match error {
                ControlError::IdOccupied { .. } => StatusCode::BAD_REQUEST,
                ControlError::NotPresent { .. } | ControlError::NoActiveEnrollment => {
                    StatusCode::NOT_FOUND
                }
                ControlError::Busy(_) => StatusCode::CONFLICT,
                ControlError::EngineStopped => StatusCode::SERVICE_UNAVAILABLE,
                ControlError::DeviceUnavailable
                | ControlError::DeleteFailed { .. }
                | ControlError::Device(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::UnexpectedReply => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyBody => "empty_body",
            Self::InvalidJson(_) => "invalid_json",
            Self::InvalidId { .. } => "invalid_id",
            Self::MissingField(_) => "missing_field",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Control(error) => error.reason(),
            Self::UnexpectedReply => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "reason": self.reason(),
        });

        if let Self::Control(error) = &self {
            if let Some(code) = error.sensor_code() {
                body["code"] = json!(code.as_u8());
            }
        }

        (status, Json(body)).into_response()
    }
}
