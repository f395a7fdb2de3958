//! Self-hosted ML microservice client (proxy vendor strategy).
//!
//! Implements both vendor contracts against the separately deployed ML
//! service: uploads are re-streamed as multipart form data without
//! buffering, job postings are forwarded as JSON, and the service's
//! health and model-metadata endpoints are exposed for the gateway's
//! `/health` and `/api/models/info` passthroughs. Non-2xx upstream
//! replies propagate their status code and `error` message verbatim
//! when available.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::detect::{DeepfakeVendor, DetectError, ModelScore, VendorVerdict};
use crate::jobscan::{AnalyzeError, JobAnalyzer, JobFraudResult, JobVerdict};
use crate::uploads::StoredUpload;

/// Request timeout for the best-effort health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fallback message when an upstream error body carries no `error` field.
const GENERIC_UPSTREAM_ERROR: &str = "ML service error";

/// Cautionary recommendations attached to classifier verdicts, which
/// carry no recommendations of their own.
const CLASSIFIER_RECOMMENDATIONS: &[&str] = &[
    "Verify the company through an independent source before applying.",
    "Never pay upfront fees or share financial details during hiring.",
];

/// Errors constructing the client.
#[derive(Debug, Error)]
pub enum MlServiceError {
    #[error("invalid ML service URL {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// HTTP client for the ML microservice.
#[derive(Debug)]
pub struct MlServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl MlServiceClient {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MlServiceError> {
        // Parse up front so a malformed deployment URL fails at startup,
        // not on the first request.
        Url::parse(base_url).map_err(|source| MlServiceError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| MlServiceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Best-effort health probe with a short timeout.
    pub async fn health(&self) -> Result<serde_json::Value, reqwest::Error> {
        let url = format!("{}/health", self.base_url);
        self.client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Fetch the service's model metadata.
    pub async fn models_info(&self) -> Result<serde_json::Value, reqwest::Error> {
        let url = format!("{}/api/models/info", self.base_url);
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl DeepfakeVendor for MlServiceClient {
    fn name(&self) -> &str {
        "ml-service"
    }

    async fn detect(&self, upload: &StoredUpload) -> Result<VendorVerdict, DetectError> {
        let file = tokio::fs::File::open(upload.path()).await.map_err(|e| {
            DetectError::Io(format!("failed to open {}: {}", upload.path().display(), e))
        })?;

        // Re-stream from disk rather than buffering the whole file.
        let part = reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(
            ReaderStream::new(file),
        ))
        .file_name(upload.original_name.clone())
        .mime_str(&upload.mime_type)
        .map_err(|e| DetectError::ApiRequest(format!("failed to build form part: {e}")))?;

        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}/api/detect-deepfake", self.base_url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectError::ApiRequest(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = upstream_error_message(response).await;
            return Err(DetectError::ApiResponse {
                status: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DetectError::ParseResponse(format!("failed to read JSON: {e}")))?;
        verdict_from_detection(&value)
    }
}

#[async_trait]
impl JobAnalyzer for MlServiceClient {
    fn name(&self) -> &str {
        "ml-service"
    }

    async fn analyze(&self, job: &serde_json::Value) -> Result<JobFraudResult, AnalyzeError> {
        let url = format!("{}/api/analyze-job", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(job)
            .send()
            .await
            .map_err(|e| AnalyzeError::ApiRequest(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = upstream_error_message(response).await;
            return Err(AnalyzeError::ApiResponse {
                status: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyzeError::ApiRequest(format!("failed to read JSON: {e}")))?;
        job_result_from_classifier(&value)
    }
}

/// Pull the upstream's `error` field out of a failed response, falling
/// back to a generic message.
async fn upstream_error_message(response: reqwest::Response) -> String {
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string())
}

/// Map the detection endpoint's reply into a [`VendorVerdict`].
///
/// The service reports `result` ("Real"/"Fake"), a `probability` in
/// `[0, 1]`, and a `details` object of named sub-scores.
fn verdict_from_detection(value: &serde_json::Value) -> Result<VendorVerdict, DetectError> {
    let status = value
        .get("result")
        .and_then(|r| r.as_str())
        .ok_or_else(|| {
            DetectError::ParseResponse("detection response missing 'result'".to_string())
        })?;

    let score = value.get("probability").and_then(|p| p.as_f64());

    let models = value
        .get("details")
        .and_then(|d| d.as_object())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(name, v)| {
                    v.as_f64().map(|score| ModelScore {
                        name: name.clone(),
                        status: None,
                        score: Some(score),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(VendorVerdict {
        status: status.to_string(),
        score,
        models,
    })
}

/// Map the classifier's output into a [`JobFraudResult`].
///
/// The classifier reports a boolean plus a risk score and indicator
/// list; verdict banding and the fixed recommendations fill the gap to
/// the application shape.
fn job_result_from_classifier(value: &serde_json::Value) -> Result<JobFraudResult, AnalyzeError> {
    let fraudulent = value
        .get("is_fraudulent")
        .and_then(|v| v.as_bool())
        .ok_or(AnalyzeError::InvalidFormat)?;
    let risk_score = value
        .get("risk_score")
        .and_then(|v| v.as_u64())
        .ok_or(AnalyzeError::InvalidFormat)?;

    let scam_score = risk_score.min(100) as u8;
    let result = if fraudulent && scam_score >= 70 {
        JobVerdict::LikelyFake
    } else if fraudulent {
        JobVerdict::PossiblyFake
    } else {
        JobVerdict::Safe
    };

    let red_flags = value
        .get("fraud_indicators")
        .and_then(|v| v.as_array())
        .map(|flags| {
            flags
                .iter()
                .filter_map(|f| f.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let explanation = value
        .get("explanation")
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            format!("This job posting has a {scam_score}% fraud probability.")
        });

    Ok(JobFraudResult {
        result,
        scam_score,
        red_flags,
        recommendations: CLASSIFIER_RECOMMENDATIONS
            .iter()
            .map(|s| s.to_string())
            .collect(),
        explanation,
    })
}
