//! HTTP server
//!
//! Builds the application state from configuration (constructing the
//! configured vendor clients once and injecting them as trait objects),
//! assembles the router, and serves it.

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;

use crate::config::{Config, DetectionStrategy, JobscanStrategy};
use crate::detect::reality_defender::RealityDefenderClient;
use crate::detect::DeepfakeVendor;
use crate::jobscan::gemini::GeminiClient;
use crate::jobscan::JobAnalyzer;
use crate::mlsvc::MlServiceClient;
use crate::uploads::UploadStore;

/// Errors that can occur while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Shared per-request state: the scratch store and the injected vendor
/// clients.
#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadStore>,
    pub detector: Arc<dyn DeepfakeVendor>,
    pub analyzer: Arc<dyn JobAnalyzer>,
    /// Present only when a strategy targets the ML microservice; backs
    /// the `/health` probe and `/api/models/info` passthrough.
    pub ml: Option<Arc<MlServiceClient>>,
}

/// Construct vendor clients and state from configuration.
pub fn build_state(config: &Config) -> Result<AppState, ServerError> {
    let needs_ml = config.detection.strategy == DetectionStrategy::MlService
        || config.jobscan.strategy == JobscanStrategy::MlService;

    let ml = if needs_ml {
        let client = MlServiceClient::new(
            &config.ml_service.url,
            Duration::from_secs(config.ml_service.timeout_secs),
        )
        .map_err(|e| ServerError::Config(e.to_string()))?;
        Some(Arc::new(client))
    } else {
        None
    };

    let detector: Arc<dyn DeepfakeVendor> = match config.detection.strategy {
        DetectionStrategy::MlService => ml
            .clone()
            .ok_or_else(|| ServerError::Config("ML service client not built".to_string()))?,
        DetectionStrategy::RealityDefender => {
            let rd = &config.detection.reality_defender;
            let client = RealityDefenderClient::new(rd.api_key.clone().unwrap_or_default())
                .map_err(|e| ServerError::Config(e.to_string()))?
                .with_base_url(rd.base_url.clone())
                .with_poll_interval(Duration::from_millis(rd.poll_interval_ms))
                .with_max_polls(rd.max_polls);
            Arc::new(client)
        }
    };

    let analyzer: Arc<dyn JobAnalyzer> = match config.jobscan.strategy {
        JobscanStrategy::MlService => ml
            .clone()
            .ok_or_else(|| ServerError::Config("ML service client not built".to_string()))?,
        JobscanStrategy::Gemini => {
            let gm = &config.jobscan.gemini;
            let client = GeminiClient::new(gm.api_key.clone().unwrap_or_default())
                .map_err(|e| ServerError::Config(e.to_string()))?
                .with_base_url(gm.base_url.clone())
                .with_model(gm.model.clone());
            Arc::new(client)
        }
    };

    Ok(AppState {
        uploads: Arc::new(UploadStore::new(
            config.uploads.dir.clone(),
            config.uploads.max_file_size,
        )),
        detector,
        analyzer,
        ml,
    })
}

/// Assemble the router over the given state.
pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(multipart_body_limit(state.uploads.max_bytes()));
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/detect-deepfake", post(handlers::detect_deepfake))
        .route("/api/analyze-job", post(handlers::analyze_job))
        .route("/api/models/info", get(handlers::models_info))
        .layer(body_limit)
        .with_state(state)
}

/// Request-body ceiling: the upload limit plus headroom for multipart
/// framing, so the store's own chunk-by-chunk check is what rejects an
/// oversized file.
fn multipart_body_limit(max_file_bytes: u64) -> usize {
    usize::try_from(max_file_bytes.saturating_add(1024 * 1024)).unwrap_or(usize::MAX)
}

/// Build state from configuration and serve until the process exits.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let state = build_state(&config)?;
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(
        address = %addr,
        detection = ?config.detection.strategy,
        jobscan = ?config.jobscan.strategy,
        "TrustLens gateway listening"
    );

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_default_uses_ml_service() {
        let state = build_state(&Config::default()).unwrap();
        assert!(state.ml.is_some());
        assert_eq!(state.detector.name(), "ml-service");
        assert_eq!(state.analyzer.name(), "ml-service");
    }

    #[test]
    fn test_build_state_direct_strategies() {
        let mut config = Config::default();
        config.detection.strategy = DetectionStrategy::RealityDefender;
        config.detection.reality_defender.api_key = Some("rd-key".to_string());
        config.jobscan.strategy = JobscanStrategy::Gemini;
        config.jobscan.gemini.api_key = Some("gm-key".to_string());

        let state = build_state(&config).unwrap();
        assert!(state.ml.is_none());
        assert_eq!(state.detector.name(), "reality-defender");
        assert_eq!(state.analyzer.name(), "gemini");
    }

    #[test]
    fn test_build_state_rejects_missing_api_key() {
        let mut config = Config::default();
        config.detection.strategy = DetectionStrategy::RealityDefender;
        assert!(matches!(
            build_state(&config),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_build_state_rejects_bad_ml_url() {
        let mut config = Config::default();
        config.ml_service.url = "definitely not a url".to_string();
        assert!(matches!(
            build_state(&config),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_multipart_body_limit_adds_headroom() {
        assert_eq!(multipart_body_limit(1024), 1024 + 1024 * 1024);
    }
}
