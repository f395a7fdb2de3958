//! Job-posting fraud analysis pipeline
//!
//! Defines the analyzer contract ([`JobAnalyzer`]), the stable
//! [`JobFraudResult`] shape, the fixed fraud-analysis prompt, and the
//! parser that turns an LLM reply into a result. Parse failures and
//! structurally incomplete replies are distinct errors so callers can
//! tell "upstream unreachable" from "upstream returned garbage".

pub mod gemini;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while analyzing a job posting.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("API response error: {status} {message}")]
    ApiResponse { status: u16, message: String },

    /// The LLM reply was not valid JSON.
    #[error("Failed to parse AI response")]
    ParseResponse(#[source] serde_json::Error),

    /// The reply parsed but is missing required keys or uses an
    /// unmodeled verdict.
    #[error("Invalid response format")]
    InvalidFormat,

    #[error("analyzer not configured: {0}")]
    NotConfigured(String),
}

/// Contract every job analyzer satisfies: given the caller's job-posting
/// JSON, return a fraud result or fail.
#[async_trait]
pub trait JobAnalyzer: Send + Sync {
    /// Analyzer name for logs and metadata.
    fn name(&self) -> &str;

    /// Analyze the job posting described by `job`.
    async fn analyze(&self, job: &serde_json::Value) -> Result<JobFraudResult, AnalyzeError>;
}

/// Categorical job-fraud outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobVerdict {
    Safe,
    #[serde(rename = "Possibly Fake")]
    PossiblyFake,
    #[serde(rename = "Likely Fake")]
    LikelyFake,
}

/// Fraud analysis result returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFraudResult {
    pub result: JobVerdict,
    /// Scam likelihood as an integer percentage.
    pub scam_score: u8,
    /// Specific textual fraud indicators, most significant first.
    #[serde(default)]
    pub red_flags: Vec<String>,
    /// Suggested next steps for the job seeker.
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// System prompt fixed for every fraud-analysis request.
pub const SYSTEM_PROMPT: &str = "You are an expert fraud detection analyst specializing in identifying fake job postings. Always respond with valid JSON.";

/// Fraud-analysis prompt template; `{job_description}` is replaced with
/// the posting text.
pub const FRAUD_DETECTION_PROMPT: &str = r#"Analyze the following job posting text for signs of being a scam or fraudulent.

Job Posting Text: "{job_description}"

First, determine if you have enough information (like a company name, a clear job description, and responsibilities) to make a reasonable analysis.

Look for red flags such as:
- Vague or generic job descriptions without specific responsibilities
- Unprofessional language, grammar, or spelling errors
- Pressure to act quickly or limited-time offers
- Requests for personal financial information, upfront fees, or payment for training
- Unrealistically high salary for the role described or vague compensation
- No verifiable company information or contact details
- Work-from-home schemes with unrealistic promises
- Requests to use personal accounts, equipment, or handle money
- Missing job location or suspicious remote-only postings
- Generic company names or suspicious email domains
- Too-good-to-be-true benefits or promises
- Investment or training fee requirements

Provide your analysis as a JSON object with these exact keys:
{
    "result": "Safe", "Possibly Fake", or "Likely Fake",
    "scamScore": <number from 0 to 100>,
    "redFlags": [],
    "recommendations": [],
    "explanation": ""
}

Be thorough and specific. Only respond with valid JSON, no other text."#;

/// Assemble the full prompt for a posting's text.
pub fn build_prompt(job_text: &str) -> String {
    format!(
        "{}\n\n{}",
        SYSTEM_PROMPT,
        FRAUD_DETECTION_PROMPT.replace("{job_description}", job_text)
    )
}

/// Flatten the caller's job-posting JSON into prompt text.
///
/// Scalar fields become `key: value` lines (sorted by key, since callers
/// send arbitrary field sets); a non-object body is embedded as-is.
pub fn job_text_from_fields(body: &serde_json::Value) -> String {
    match body.as_object() {
        Some(map) => {
            let mut lines = Vec::new();
            for (key, value) in map {
                match value {
                    serde_json::Value::String(s) if !s.trim().is_empty() => {
                        lines.push(format!("{key}: {s}"));
                    }
                    serde_json::Value::Number(n) => lines.push(format!("{key}: {n}")),
                    serde_json::Value::Bool(b) => lines.push(format!("{key}: {b}")),
                    _ => {}
                }
            }
            lines.join("\n")
        }
        None => body.to_string(),
    }
}

/// Parse an LLM reply into a [`JobFraudResult`].
///
/// Strips optional triple-backtick fencing, then requires valid JSON with
/// at least `result` and `scamScore` present.
pub fn parse_fraud_response(text: &str) -> Result<JobFraudResult, AnalyzeError> {
    let json_text = strip_code_fence(text);
    let value: serde_json::Value =
        serde_json::from_str(json_text).map_err(AnalyzeError::ParseResponse)?;

    if value.get("result").is_none() || value.get("scamScore").is_none() {
        return Err(AnalyzeError::InvalidFormat);
    }

    serde_json::from_value(value).map_err(|_| AnalyzeError::InvalidFormat)
}

/// Extract the contents of a ``` or ```json fence, if present.
fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence regex is valid")
    });
    match fence.captures(text) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(text).trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REPLY: &str = r#"{
        "result": "Possibly Fake",
        "scamScore": 65,
        "redFlags": ["No company details", "Urgency pressure"],
        "recommendations": ["Verify the company registry entry"],
        "explanation": "The posting is vague and pressures the reader."
    }"#;

    // ==================== fence stripping tests ====================

    #[test]
    fn test_strip_json_fence() {
        let fenced = format!("```json\n{}\n```", VALID_REPLY);
        assert_eq!(strip_code_fence(&fenced), VALID_REPLY.trim());
    }

    #[test]
    fn test_strip_bare_fence() {
        let fenced = format!("```\n{}\n```", VALID_REPLY);
        assert_eq!(strip_code_fence(&fenced), VALID_REPLY.trim());
    }

    #[test]
    fn test_unfenced_text_passes_through() {
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    // ==================== parsing tests ====================

    #[test]
    fn test_parse_fenced_reply_returns_object_unchanged() {
        let fenced = format!("```json\n{}\n```", VALID_REPLY);
        let result = parse_fraud_response(&fenced).unwrap();
        assert_eq!(result.result, JobVerdict::PossiblyFake);
        assert_eq!(result.scam_score, 65);
        assert_eq!(
            result.red_flags,
            vec!["No company details", "Urgency pressure"]
        );
        assert_eq!(
            result.recommendations,
            vec!["Verify the company registry entry"]
        );
        assert_eq!(
            result.explanation,
            "The posting is vague and pressures the reader."
        );
    }

    #[test]
    fn test_parse_unfenced_reply() {
        let result = parse_fraud_response(VALID_REPLY).unwrap();
        assert_eq!(result.result, JobVerdict::PossiblyFake);
    }

    #[test]
    fn test_non_json_reply_is_distinct_parse_error() {
        let err = parse_fraud_response("I am sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, AnalyzeError::ParseResponse(_)));
        assert_eq!(err.to_string(), "Failed to parse AI response");
    }

    #[test]
    fn test_missing_verdict_is_invalid_format() {
        let err = parse_fraud_response(r#"{"scamScore": 10}"#).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidFormat));
        assert_eq!(err.to_string(), "Invalid response format");
    }

    #[test]
    fn test_missing_score_is_invalid_format() {
        let err = parse_fraud_response(r#"{"result": "Safe"}"#).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidFormat));
    }

    #[test]
    fn test_unmodeled_verdict_is_invalid_format() {
        let err =
            parse_fraud_response(r#"{"result": "Dodgy", "scamScore": 50}"#).unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidFormat));
    }

    #[test]
    fn test_optional_lists_default_to_empty() {
        let result =
            parse_fraud_response(r#"{"result": "Safe", "scamScore": 5}"#).unwrap();
        assert!(result.red_flags.is_empty());
        assert!(result.recommendations.is_empty());
        assert!(result.explanation.is_empty());
    }

    // ==================== prompt tests ====================

    #[test]
    fn test_build_prompt_embeds_job_text() {
        let prompt = build_prompt("title: Data entry\nsalary: $9000/week");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("title: Data entry"));
        assert!(!prompt.contains("{job_description}"));
    }

    #[test]
    fn test_job_text_from_fields() {
        let body = serde_json::json!({
            "title": "Remote assistant",
            "company": "Acme Corp",
            "salary": 90000,
            "remote": true,
            "description": "   ",
            "attachments": ["ignored.pdf"]
        });
        let text = job_text_from_fields(&body);
        // serde_json maps iterate in sorted key order
        assert_eq!(
            text,
            "company: Acme Corp\nremote: true\nsalary: 90000\ntitle: Remote assistant"
        );
    }

    #[test]
    fn test_job_text_from_non_object_body() {
        let body = serde_json::json!("plain posting text");
        assert_eq!(job_text_from_fields(&body), "\"plain posting text\"");
    }

    // ==================== serialization tests ====================

    #[test]
    fn test_result_serializes_with_api_field_names() {
        let result = JobFraudResult {
            result: JobVerdict::LikelyFake,
            scam_score: 91,
            red_flags: vec!["Upfront fee".to_string()],
            recommendations: vec!["Do not pay".to_string()],
            explanation: "Classic advance-fee pattern.".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["result"], "Likely Fake");
        assert_eq!(json["scamScore"], 91);
        assert_eq!(json["redFlags"][0], "Upfront fee");
        assert_eq!(json["recommendations"][0], "Do not pay");
    }
}
