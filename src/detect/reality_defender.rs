//! Reality Defender detection client (direct vendor strategy).
//!
//! Reproduces the vendor SDK's flow over its REST API: request a presigned
//! upload slot, PUT the media bytes, then poll the result endpoint until
//! the analysis leaves its in-progress states. The poll is part of the
//! vendor's asynchronous protocol; a failed request still surfaces
//! immediately as a forwarding failure.

use std::time::Duration;

use super::{DetectError, DeepfakeVendor, ModelScore, VendorVerdict};
use crate::uploads::StoredUpload;
use async_trait::async_trait;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.prd.realitydefender.xyz";

/// Statuses that mean the analysis has not finished yet.
const IN_PROGRESS_STATUSES: &[&str] = &["QUEUED", "PROCESSING", "ANALYZING", "UPLOADED"];

/// Reality Defender REST client.
pub struct RealityDefenderClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl RealityDefenderClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key` - Reality Defender API key
    pub fn new(api_key: String) -> Result<Self, DetectError> {
        if api_key.trim().is_empty() {
            return Err(DetectError::NotConfigured(
                "Reality Defender API key must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DetectError::ApiRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(3000),
            max_polls: 20,
        })
    }

    /// Set a custom base URL (e.g., for proxy or testing).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the interval between result polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum number of result polls before giving up.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Request a presigned upload slot for the given filename.
    async fn request_upload(&self, file_name: &str) -> Result<PresignedUpload, DetectError> {
        let url = format!("{}/api/files/aws-presigned", self.base_url);
        let body = serde_json::json!({ "fileName": file_name });

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DetectError::ApiRequest(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(DetectError::ApiResponse {
                status: status.as_u16(),
                message: body_text,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DetectError::ParseResponse(format!("failed to read JSON: {e}")))?;
        parse_presigned(&value)
    }

    /// PUT the media bytes to the presigned URL.
    async fn put_media(
        &self,
        signed_url: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), DetectError> {
        let response = self
            .client
            .put(signed_url)
            .header("content-type", mime_type)
            .body(data)
            .send()
            .await
            .map_err(|e| DetectError::ApiRequest(format!("upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(DetectError::ApiResponse {
                status: status.as_u16(),
                message: body_text,
            });
        }
        Ok(())
    }

    /// Fetch the current analysis state for a request.
    async fn fetch_result(&self, request_id: &str) -> Result<serde_json::Value, DetectError> {
        let url = format!("{}/api/media/users/{}", self.base_url, request_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| DetectError::ApiRequest(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(DetectError::ApiResponse {
                status: status.as_u16(),
                message: body_text,
            });
        }

        response
            .json()
            .await
            .map_err(|e| DetectError::ParseResponse(format!("failed to read JSON: {e}")))
    }
}

#[async_trait]
impl DeepfakeVendor for RealityDefenderClient {
    fn name(&self) -> &str {
        "reality-defender"
    }

    async fn detect(&self, upload: &StoredUpload) -> Result<VendorVerdict, DetectError> {
        let data = tokio::fs::read(upload.path())
            .await
            .map_err(|e| DetectError::Io(format!("failed to read {}: {}", upload.path().display(), e)))?;

        let presigned = self.request_upload(&upload.original_name).await?;
        self.put_media(&presigned.signed_url, data, &upload.mime_type)
            .await?;

        tracing::debug!(
            request_id = %presigned.request_id,
            original_name = %upload.original_name,
            "Media uploaded, polling for verdict"
        );

        for attempt in 0..self.max_polls {
            let value = self.fetch_result(&presigned.request_id).await?;
            let status = result_status(&value);
            if !is_in_progress(status) {
                return parse_media_result(&value);
            }
            tracing::debug!(
                request_id = %presigned.request_id,
                status = %status,
                attempt,
                "Analysis still in progress"
            );
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(DetectError::VerdictTimeout)
    }
}

/// Presigned upload slot returned by the vendor.
struct PresignedUpload {
    signed_url: String,
    request_id: String,
}

/// Extract the presigned URL and request id from the slot response.
fn parse_presigned(value: &serde_json::Value) -> Result<PresignedUpload, DetectError> {
    let signed_url = value
        .get("response")
        .and_then(|r| r.get("signedUrl"))
        .and_then(|u| u.as_str())
        .ok_or_else(|| {
            DetectError::ParseResponse("presigned response missing 'response.signedUrl'".to_string())
        })?;
    let request_id = value
        .get("requestId")
        .and_then(|r| r.as_str())
        .ok_or_else(|| {
            DetectError::ParseResponse("presigned response missing 'requestId'".to_string())
        })?;
    Ok(PresignedUpload {
        signed_url: signed_url.to_string(),
        request_id: request_id.to_string(),
    })
}

/// The result status string, preferring the summary over the overall state.
fn result_status(value: &serde_json::Value) -> &str {
    value
        .get("resultsSummary")
        .and_then(|s| s.get("status"))
        .and_then(|s| s.as_str())
        .or_else(|| value.get("overallStatus").and_then(|s| s.as_str()))
        .unwrap_or("")
}

/// Whether a status string marks an unfinished analysis.
fn is_in_progress(status: &str) -> bool {
    let upper = status.to_uppercase();
    IN_PROGRESS_STATUSES.iter().any(|s| upper == *s)
}

/// Map a finished media result into a [`VendorVerdict`].
fn parse_media_result(value: &serde_json::Value) -> Result<VendorVerdict, DetectError> {
    let status = result_status(value);
    if status.is_empty() {
        return Err(DetectError::ParseResponse(
            "media result missing 'resultsSummary.status'".to_string(),
        ));
    }

    // finalScore is reported as a 0-100 percentage.
    let score = value
        .get("resultsSummary")
        .and_then(|s| s.get("metadata"))
        .and_then(|m| m.get("finalScore"))
        .and_then(|f| f.as_f64())
        .map(|f| f / 100.0);

    let models = value
        .get("models")
        .and_then(|m| m.as_array())
        .map(|entries| entries.iter().filter_map(parse_model_entry).collect())
        .unwrap_or_default();

    Ok(VendorVerdict {
        status: status.to_string(),
        score,
        models,
    })
}

/// Map one per-model entry; entries without a name are dropped.
fn parse_model_entry(entry: &serde_json::Value) -> Option<ModelScore> {
    let name = entry.get("name").and_then(|n| n.as_str())?.to_string();
    let status = entry
        .get("status")
        .and_then(|s| s.as_str())
        .map(|s| s.to_string());
    // predictionNumber is already a probability; finalScore is a percentage.
    let score = entry
        .get("predictionNumber")
        .and_then(|p| p.as_f64())
        .or_else(|| {
            entry
                .get("finalScore")
                .and_then(|f| f.as_f64())
                .map(|f| f / 100.0)
        });
    Some(ModelScore {
        name,
        status,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Verdict;

    // ==================== presigned parsing tests ====================

    #[test]
    fn test_parse_presigned_success() {
        let value = serde_json::json!({
            "code": "ok",
            "response": { "signedUrl": "https://bucket.s3.amazonaws.com/media?sig=abc" },
            "requestId": "req-123",
            "mediaId": "media-456"
        });
        let presigned = parse_presigned(&value).unwrap();
        assert_eq!(
            presigned.signed_url,
            "https://bucket.s3.amazonaws.com/media?sig=abc"
        );
        assert_eq!(presigned.request_id, "req-123");
    }

    #[test]
    fn test_parse_presigned_missing_url() {
        let value = serde_json::json!({ "requestId": "req-123" });
        assert!(matches!(
            parse_presigned(&value),
            Err(DetectError::ParseResponse(_))
        ));
    }

    // ==================== status helpers ====================

    #[test]
    fn test_is_in_progress() {
        assert!(is_in_progress("ANALYZING"));
        assert!(is_in_progress("queued"));
        assert!(!is_in_progress("AUTHENTIC"));
        assert!(!is_in_progress("MANIPULATED"));
        assert!(!is_in_progress(""));
    }

    // ==================== media result parsing tests ====================

    #[test]
    fn test_parse_media_result_full() {
        let value = serde_json::json!({
            "requestId": "req-123",
            "overallStatus": "COMPLETED",
            "resultsSummary": {
                "status": "MANIPULATED",
                "metadata": { "finalScore": 93.5 }
            },
            "models": [
                { "name": "faces", "status": "MANIPULATED", "predictionNumber": 0.97 },
                { "name": "frequency", "status": "AUTHENTIC", "finalScore": 12.0 },
                { "notAName": true }
            ]
        });
        let verdict = parse_media_result(&value).unwrap();
        assert_eq!(verdict.status, "MANIPULATED");
        assert_eq!(verdict.score, Some(0.935));
        assert_eq!(verdict.models.len(), 2);
        assert_eq!(verdict.models[0].score, Some(0.97));
        assert_eq!(verdict.models[1].score, Some(0.12));
        assert_eq!(
            Verdict::from_vendor_status(&verdict.status),
            Verdict::Fake
        );
    }

    #[test]
    fn test_parse_media_result_without_score() {
        let value = serde_json::json!({
            "resultsSummary": { "status": "AUTHENTIC" }
        });
        let verdict = parse_media_result(&value).unwrap();
        assert_eq!(verdict.status, "AUTHENTIC");
        assert_eq!(verdict.score, None);
        assert!(verdict.models.is_empty());
    }

    #[test]
    fn test_parse_media_result_missing_status() {
        let value = serde_json::json!({ "models": [] });
        assert!(matches!(
            parse_media_result(&value),
            Err(DetectError::ParseResponse(_))
        ));
    }

    // ==================== construction tests ====================

    #[test]
    fn test_new_rejects_empty_api_key() {
        assert!(matches!(
            RealityDefenderClient::new("  ".to_string()),
            Err(DetectError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_with_base_url_trims_trailing_slash() {
        let client = RealityDefenderClient::new("key".to_string())
            .unwrap()
            .with_base_url("https://rd.example.com/".to_string());
        assert_eq!(client.base_url, "https://rd.example.com");
    }
}
