//! Route handlers.
//!
//! Each analysis handler runs the same sequence: validate the input,
//! forward to the configured vendor, normalize the reply, and (for
//! uploads) delete the scratch file before the response goes out —
//! on the error path too.

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::detect::DetectionResult;
use crate::jobscan::JobFraudResult;
use crate::uploads::{StoredUpload, UploadError};

/// `GET /health` — gateway liveness plus a best-effort upstream probe
/// when the proxy strategy is configured.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut body = json!({
        "status": "ok",
        "message": "TrustLens gateway is running",
    });

    if let Some(ml) = &state.ml {
        body["mlService"] = match ml.health().await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::debug!(error = %e, "ML service health probe failed");
                json!("unavailable")
            }
        };
    }

    Json(body)
}

/// `POST /api/detect-deepfake` — multipart upload under field `file`.
pub async fn detect_deepfake(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResult>, ApiError> {
    let mut stored: Option<StoredUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from(UploadError::Malformed(e.to_string())))?
    {
        if field.name() == Some("file") {
            stored = Some(state.uploads.store_field(field).await?);
            break;
        }
    }
    let upload = stored.ok_or_else(|| ApiError::from(UploadError::Missing))?;

    tracing::info!(
        original_name = %upload.original_name,
        mime_type = %upload.mime_type,
        size = upload.size,
        vendor = state.detector.name(),
        "Forwarding upload for deepfake detection"
    );

    // The scratch file is deleted before either arm returns.
    let outcome = state.detector.detect(&upload).await;
    upload.discard().await;
    let verdict = outcome?;

    Ok(Json(DetectionResult::from_verdict(verdict)))
}

/// `POST /api/analyze-job` — JSON body with job-posting fields.
pub async fn analyze_job(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<JobFraudResult>, ApiError> {
    let empty = match body.as_object() {
        Some(map) => map.is_empty(),
        None => body.is_null(),
    };
    if empty {
        return Err(ApiError::bad_request("No job data provided"));
    }

    tracing::info!(analyzer = state.analyzer.name(), "Analyzing job posting");

    let result = state.analyzer.analyze(&body).await?;
    Ok(Json(result))
}

/// `GET /api/models/info` — upstream model metadata in proxy mode,
/// static vendor metadata otherwise.
pub async fn models_info(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match &state.ml {
        Some(ml) => match ml.models_info().await {
            Ok(info) => Ok(Json(info)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch ML service model info");
                Err(ApiError::internal("Failed to retrieve model information"))
            }
        },
        None => Ok(Json(json!({
            "detection": {
                "provider": state.detector.name(),
                "description": "External deepfake detection API",
            },
            "jobAnalysis": {
                "provider": state.analyzer.name(),
                "description": "LLM-based job posting fraud analysis",
            },
        }))),
    }
}
