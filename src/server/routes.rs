use axum::{extract::State, http::StatusCode, Json};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::manager::{InferError, InitError, InitReport, SessionManager};
use crate::response::InferenceResult;
use crate::session::{Modality, PromptRequest};
use super::types::{ApiResponse, InferRequest, StatusResponse};

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    /// Deadline for one inference, `None` waits forever
    pub request_timeout: Option<Duration>,
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

/// Returns a health check response
pub async fn health_check() -> &'static str {
    info!("Health check endpoint called");
    "aidy is running!"
}

/// Loads (or reloads) the model and opens a fresh session.
pub async fn init_model(State(app): State<AppState>) -> Reply<InitReport> {
    info!("Init endpoint called");

    match app.manager.initialize().await {
        Ok(report) => {
            info!("Model ready: {}", report.artifact.path.display());
            (StatusCode::OK, Json(ApiResponse::success(report)))
        }
        Err(e) => {
            error!("Failed to initialize model: {}", e);
            (init_status(&e), Json(ApiResponse::failure(e.kind(), e.to_string())))
        }
    }
}

/// Runs one multi-part prompt. Attachment paths are read here; unusable paths count as absent.
pub async fn run_inference(
    State(app): State<AppState>,
    Json(request): Json<InferRequest>,
) -> Reply<InferenceResult> {
    info!(
        "Infer endpoint called. Text: {}, image: {:?}, audio: {:?}",
        request.text.is_some(),
        request.image_path,
        request.audio_path
    );

    let prompt = PromptRequest {
        text: request.text,
        image_bytes: read_attachment(request.image_path.as_deref(), Modality::Image).await,
        audio_bytes: read_attachment(request.audio_path.as_deref(), Modality::Audio).await,
    };

    let outcome = match app.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, app.manager.infer(prompt)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(InferError::Timeout(limit.as_secs())),
        },
        None => app.manager.infer(prompt).await,
    };

    match outcome {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(e) => {
            warn!("Inference request failed: {}", e);
            (infer_status(&e), Json(ApiResponse::failure(e.kind(), e.to_string())))
        }
    }
}

/// Reports the lifecycle state and the last initialization.
pub async fn get_status(State(app): State<AppState>) -> Reply<StatusResponse> {
    let response = StatusResponse { state: app.manager.state(), report: app.manager.report() };
    (StatusCode::OK, Json(ApiResponse::success(response)))
}

async fn read_attachment(path: Option<&str>, modality: Modality) -> Option<Vec<u8>> {
    let path = path.map(str::trim).filter(|p| !p.is_empty())?;
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            info!("Read {} attachment {} ({} bytes)", modality, path, bytes.len());
            Some(bytes)
        }
        Err(e) => {
            warn!("Ignoring {} attachment {}: {}", modality, path, e);
            None
        }
    }
}

fn init_status(err: &InitError) -> StatusCode {
    match err.kind() {
        "MODEL_NOT_FOUND" | "BUNDLE_ENTRY_MISSING" => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn infer_status(err: &InferError) -> StatusCode {
    match err {
        InferError::NotReady => StatusCode::CONFLICT,
        InferError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        InferError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        InferError::GenerationFailed(_) | InferError::ModalityUnsupported(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::artifact::{ArtifactLocator, DirectoryBundle, ModelArtifact};
    use crate::manager::{BusyPolicy, ModelSource, SessionState};
    use crate::runtime::{
        Backend, EngineSession, InferenceRuntime, LoadOptions, LoadedModel, ModelEngine, PieceStream,
        RuntimeCapabilities, RuntimeError,
    };
    use crate::session::SamplingConfig;

    struct EchoEngine;
    struct EchoModel;
    struct EchoSession {
        prompt: String,
    }

    impl ModelEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        fn load(&self, _artifact: &ModelArtifact, _options: &LoadOptions) -> Result<Box<dyn LoadedModel>, RuntimeError> {
            Ok(Box::new(EchoModel))
        }
    }

    impl LoadedModel for EchoModel {
        fn capabilities(&self) -> RuntimeCapabilities {
            RuntimeCapabilities::text_only(Backend::Cpu)
        }

        fn create_session(&self, _config: &SamplingConfig) -> Result<Box<dyn EngineSession>, RuntimeError> {
            Ok(Box::new(EchoSession { prompt: String::new() }))
        }
    }

    impl EngineSession for EchoSession {
        fn add_query_chunk(&mut self, text: &str) -> Result<(), RuntimeError> {
            self.prompt.push_str(text);
            Ok(())
        }

        fn generate(&mut self) -> Result<PieceStream<'_>, RuntimeError> {
            let reply = format!("SMS Draft: {}\nGuidance:\n1. Stay calm", std::mem::take(&mut self.prompt));
            Ok(Box::new(std::iter::once(Ok::<_, RuntimeError>(reply))))
        }

        fn reset(&mut self) -> Result<(), RuntimeError> {
            self.prompt.clear();
            Ok(())
        }
    }

    fn app_state(dir: &std::path::Path, with_model: bool) -> AppState {
        let bundle_dir = dir.join("bundle");
        std::fs::create_dir_all(&bundle_dir).unwrap();
        if with_model {
            std::fs::write(bundle_dir.join("model.gguf"), b"GGUF weights").unwrap();
        }
        let source = ModelSource {
            install_dir: dir.join("install"),
            bundle: Arc::new(DirectoryBundle::new(bundle_dir)),
            locator: ArtifactLocator::new(dir.join("cache")),
            filename: "model.gguf".to_string(),
        };
        let runtime = InferenceRuntime::new(Arc::new(EchoEngine), LoadOptions::default());
        let manager = SessionManager::new(source, runtime, SamplingConfig::default(), BusyPolicy::Queue).unwrap();
        AppState { manager, request_timeout: Some(Duration::from_secs(10)) }
    }

    #[tokio::test]
    async fn test_infer_before_init_reports_kind() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_state(dir.path(), true);

        let (status, Json(body)) = run_inference(State(app), Json(InferRequest::default())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!body.ok);
        assert_eq!(body.error.unwrap().kind, "MODEL_NOT_INITIALIZED");
    }

    #[tokio::test]
    async fn test_init_without_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_state(dir.path(), false);

        let (status, Json(body)) = init_model(State(app.clone())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.unwrap().kind, "BUNDLE_ENTRY_MISSING");
        assert!(matches!(app.manager.state(), SessionState::Failed(_)));
    }

    #[tokio::test]
    async fn test_init_then_infer_ignores_missing_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_state(dir.path(), true);

        let (status, _) = init_model(State(app.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let request = InferRequest {
            text: Some("Chest pain".to_string()),
            image_path: Some(dir.path().join("missing.png").display().to_string()),
            audio_path: Some("   ".to_string()),
        };
        let (status, Json(body)) = run_inference(State(app.clone()), Json(request)).await;

        assert_eq!(status, StatusCode::OK);
        let result = body.result.unwrap();
        assert_eq!(result.sms_draft, "Chest pain");
        assert_eq!(result.guidance_steps, vec!["Stay calm".to_string()]);

        let (_, Json(status_body)) = get_status(State(app)).await;
        let snapshot = status_body.result.unwrap();
        assert_eq!(snapshot.state, SessionState::Ready);
        assert_eq!(snapshot.report.unwrap().engine, "echo");
    }

    #[test]
    fn test_infer_request_uses_camel_case() {
        let request: InferRequest =
            serde_json::from_str(r#"{"text":"hi","imagePath":"/tmp/a.png"}"#).unwrap();
        assert_eq!(request.image_path.as_deref(), Some("/tmp/a.png"));
        assert!(request.audio_path.is_none());
    }
}
