//! API error taxonomy.
//!
//! Converts module-level errors into HTTP responses with a JSON
//! `{"error": ...}` body: client input errors map to 4xx, upstream
//! failures forward the vendor's status and message when present, and
//! response-format failures keep their distinct messages so callers can
//! tell them apart from transport failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::detect::DetectError;
use crate::jobscan::AnalyzeError;
use crate::uploads::UploadError;

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Forward an upstream status code and message verbatim.
    fn forwarded(status: u16, message: String) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Missing => ApiError::bad_request(e.to_string()),
            UploadError::TooLarge { .. } => {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
            }
            UploadError::Malformed(_) => ApiError::bad_request(e.to_string()),
            UploadError::Io(ref source) => {
                tracing::error!(error = %source, "Failed to store uploaded file");
                ApiError::internal("Failed to store uploaded file")
            }
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        match e {
            DetectError::ApiResponse { status, message } => {
                ApiError::forwarded(status, message)
            }
            DetectError::ParseResponse(detail) => {
                tracing::error!(error = %detail, "Detection vendor returned an unparseable response");
                ApiError::new(
                    StatusCode::BAD_GATEWAY,
                    "Invalid response from detection service",
                )
            }
            DetectError::VerdictTimeout => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "Timed out waiting for the detection verdict",
            ),
            other => {
                tracing::error!(error = %other, "Detection request failed");
                ApiError::internal("Failed to analyze media. Please try again.")
            }
        }
    }
}

impl From<AnalyzeError> for ApiError {
    fn from(e: AnalyzeError) -> Self {
        match e {
            AnalyzeError::ApiResponse { status, message } => {
                ApiError::forwarded(status, message)
            }
            // Distinct from transport failures so callers can tell
            // "unreachable" from "returned garbage".
            AnalyzeError::ParseResponse(_) | AnalyzeError::InvalidFormat => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            other => {
                tracing::error!(error = %other, "Job analysis request failed");
                ApiError::internal("Failed to analyze job posting. Please try again.")
            }
        }
    }
}
