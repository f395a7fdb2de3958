//! Deepfake detection pipeline
//!
//! Defines the vendor contract ([`DeepfakeVendor`]), the raw shape vendors
//! return ([`VendorVerdict`]), and the normalizer that maps vendor status
//! vocabulary into the application's stable [`DetectionResult`].

pub mod reality_defender;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::uploads::StoredUpload;

/// Errors that can occur while forwarding media to a detection vendor.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("API response error: {status} {message}")]
    ApiResponse { status: u16, message: String },

    #[error("failed to parse API response: {0}")]
    ParseResponse(String),

    #[error("timed out waiting for analysis verdict")]
    VerdictTimeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("vendor not configured: {0}")]
    NotConfigured(String),
}

/// Contract every detection vendor satisfies: given a stored file, return
/// a raw verdict or fail.
///
/// Implementations are constructed once at startup and injected into
/// request handlers as `Arc<dyn DeepfakeVendor>`, so tests can substitute
/// a double.
#[async_trait]
pub trait DeepfakeVendor: Send + Sync {
    /// Vendor name for logs and metadata.
    fn name(&self) -> &str;

    /// Forward the stored file to the vendor and await its verdict.
    async fn detect(&self, upload: &StoredUpload) -> Result<VendorVerdict, DetectError>;
}

/// Categorical detection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Real,
    Fake,
    Suspect,
}

impl Verdict {
    /// Map a vendor's free-text status into a verdict.
    ///
    /// Matching is case-insensitive substring: `AUTHENTIC`/`REAL` win over
    /// `MANIPULATED`/`FAKE`, and anything unmodeled lands on the cautious
    /// middle state, never on `Real`. Unknown statuses are logged so they
    /// can be handled explicitly instead of guessed at.
    pub fn from_vendor_status(status: &str) -> Self {
        let upper = status.to_uppercase();
        if upper.contains("AUTHENTIC") || upper.contains("REAL") {
            Verdict::Real
        } else if upper.contains("MANIPULATED") || upper.contains("FAKE") {
            Verdict::Fake
        } else {
            if !upper.is_empty()
                && !upper.contains("SUSPECT")
                && !upper.contains("INCONCLUSIVE")
            {
                tracing::warn!(status = %status, "Unrecognized vendor status, treating as SUSPECT");
            }
            Verdict::Suspect
        }
    }
}

/// Per-model sub-score reported by a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelScore {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Raw detection outcome as reported by a vendor, before normalization.
#[derive(Debug, Clone, Default)]
pub struct VendorVerdict {
    /// Vendor status vocabulary, e.g. `AUTHENTIC`, `MANIPULATED`, `Fake`.
    pub status: String,
    /// Manipulation probability in `[0, 1]`, when the vendor reports one.
    pub score: Option<f64>,
    /// Per-model sub-scores, when the vendor reports them.
    pub models: Vec<ModelScore>,
}

/// Normalized detection result returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub result: Verdict,
    /// Vendor probability rounded to an integer percentage.
    pub risk_score: u8,
    /// Vendor probability, unrounded.
    pub probability: f64,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detailed_models: Vec<ModelScore>,
}

impl DetectionResult {
    /// Normalize a vendor verdict into the application's result shape.
    pub fn from_verdict(verdict: VendorVerdict) -> Self {
        let probability = verdict.score.unwrap_or(0.0).clamp(0.0, 1.0);
        let risk_score = (probability * 100.0).round() as u8;
        let explanation = format!(
            "Analysis complete. Status: {}. Confidence score: {:.1}%",
            verdict.status,
            probability * 100.0
        );
        Self {
            result: Verdict::from_vendor_status(&verdict.status),
            risk_score,
            probability,
            explanation,
            detailed_models: verdict.models,
        }
    }
}
