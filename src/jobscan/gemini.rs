//! Gemini generative API client (direct LLM strategy).
//!
//! Sends the fixed fraud-analysis prompt to the `generateContent`
//! endpoint and hands the reply text to the jobscan parser.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    build_prompt, job_text_from_fields, parse_fraud_response, AnalyzeError, JobAnalyzer,
    JobFraudResult,
};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for fraud analysis.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini REST client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key` - Gemini API key
    pub fn new(api_key: String) -> Result<Self, AnalyzeError> {
        if api_key.trim().is_empty() {
            return Err(AnalyzeError::NotConfigured(
                "Gemini API key must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AnalyzeError::ApiRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Set a custom base URL (e.g., for proxy or testing).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set a custom model.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl JobAnalyzer for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, job: &serde_json::Value) -> Result<JobFraudResult, AnalyzeError> {
        let prompt = build_prompt(&job_text_from_fields(job));

        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyzeError::ApiRequest(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(AnalyzeError::ApiResponse {
                status: status.as_u16(),
                message: body_text,
            });
        }

        let resp_body: serde_json::Value = response.json().await.map_err(|e| {
            AnalyzeError::ApiRequest(format!("failed to read response body: {e}"))
        })?;

        let text = extract_gemini_text(&resp_body)?;
        parse_fraud_response(&text)
    }
}

/// Extract the reply text from a `generateContent` response.
fn extract_gemini_text(response: &serde_json::Value) -> Result<String, AnalyzeError> {
    let candidates = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .ok_or(AnalyzeError::InvalidFormat)?;

    if candidates.is_empty() {
        return Err(AnalyzeError::InvalidFormat);
    }

    let parts = candidates[0]
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or(AnalyzeError::InvalidFormat)?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        return Err(AnalyzeError::InvalidFormat);
    }

    Ok(text)
}
