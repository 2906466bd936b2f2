//! API Error Handling
//!
//! Engine errors mapped onto HTTP status codes, echoed with the request id.

use crate::errors::{FairroundError, PlayError, RoundError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// NOT_FOUND, BAD_REQUEST, BUCKET_CLOSED, ...
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    /// Bet arrived after its round stopped accepting plays
    BucketClosed { message: String, closes_at: u64 },
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    /// Malformed request that never reached the engine
    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    /// Classify an engine error. Server-side failures are logged here and
    /// their message is not leaked to the client.
    pub fn from_engine(request_id: &str, err: FairroundError) -> Self {
        let request_id = request_id.to_string();
        let kind = match &err {
            FairroundError::UnknownGame(_) | FairroundError::Round(RoundError::NotFound { .. }) => {
                ApiErrorKind::NotFound(err.to_string())
            }
            FairroundError::Play(PlayError::BucketClosed { closes_at, .. }) => ApiErrorKind::BucketClosed {
                message: err.to_string(),
                closes_at: *closes_at,
            },
            FairroundError::Round(RoundError::StillOpen { .. }) => ApiErrorKind::Conflict(err.to_string()),
            _ if err.is_client_error() => ApiErrorKind::BadRequest(err.to_string()),
            _ => {
                tracing::error!(request_id = %request_id, "Request failed: {}", err);
                ApiErrorKind::InternalError("Internal server error".to_string())
            }
        };
        Self { kind, request_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::BucketClosed { message, .. } => {
                write!(f, "[{}] Bucket Closed: {}", self.request_id, message)
            }
            ApiErrorKind::Conflict(msg) => write!(f, "[{}] Conflict: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiErrorKind::BucketClosed { message, closes_at } => (
                StatusCode::BAD_REQUEST,
                "BUCKET_CLOSED",
                message,
                Some(serde_json::json!({ "closes_at": closes_at })),
            ),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}
