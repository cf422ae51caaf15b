//! API Models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use zt_core::{ControlResult, ScanError, ScanSummary};

/// Body of a completed assessment
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    /// Completion message
    pub message: String,
    /// Display name of the subscription
    pub subscription_name: String,
    /// Public path of the stored report; absent when the report could not be written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    /// Time spent running controls
    pub scan_duration_secs: f64,
    /// Totals
    pub summary: ScanSummary,
    /// Results in control order
    pub results: Vec<ControlResult>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short description
    pub error: String,
    /// Underlying failure, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handler failure mapped onto a status code
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 500 with the failure detail
    Internal {
        /// Short description
        error: String,
        /// Underlying failure
        details: String,
    },
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::MissingContext(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal {
                error: "ZT Scan failed".into(),
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorResponse { error, details: None }),
            ApiError::NotFound(error) => (StatusCode::NOT_FOUND, ErrorResponse { error, details: None }),
            ApiError::Internal { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error,
                    details: Some(details),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
