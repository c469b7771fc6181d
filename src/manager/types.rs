use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::{ArtifactError, ModelArtifact};
use crate::runtime::{RuntimeCapabilities, RuntimeError, RuntimeHandle};
use crate::session::{Modality, SamplingConfig};

/// Lifecycle of the managed runtime/session pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Busy,
    /// Initialization failed; only a fresh `initialize` leaves this state
    Failed(String),
}

/// What a caller arriving during a running inference gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Wait for the worker in submission order
    #[default]
    Queue,
    /// Fail immediately with `InferError::Busy`
    Reject,
}

/// Summary of a successful initialization.
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub engine: String,
    pub artifact: ModelArtifact,
    pub capabilities: RuntimeCapabilities,
    pub sampling: SamplingConfig,
    #[serde(with = "ts_seconds")]
    pub loaded_at: DateTime<Utc>,
}

impl InitReport {
    pub(crate) fn new(engine: &str, handle: &RuntimeHandle, sampling: &SamplingConfig) -> Self {
        Self {
            engine: engine.to_string(),
            artifact: handle.artifact().clone(),
            capabilities: handle.capabilities(),
            sampling: sampling.clone(),
            loaded_at: handle.loaded_at(),
        }
    }
}

/// Errors surfaced by `SessionManager::initialize`. Each one leaves the state `Failed`.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("unexpected initialization failure: {0}")]
    Unexpected(String),
}

impl InitError {
    pub fn kind(&self) -> &'static str {
        match self {
            InitError::Artifact(e) => e.kind(),
            InitError::Runtime(e) => e.kind(),
            InitError::Unexpected(_) => "INIT_ERROR",
        }
    }
}

/// Errors surfaced by `SessionManager::infer`. None of them leaves the session `Busy`.
#[derive(Debug, Error)]
pub enum InferError {
    #[error("model is not initialized")]
    NotReady,
    #[error("another inference is in progress")]
    Busy,
    #[error("inference failed: {0}")]
    GenerationFailed(String),
    /// Logged when an attachment is dropped; never returned to callers
    #[error("{0} input is not supported by the loaded model")]
    ModalityUnsupported(Modality),
    /// Imposed by callers that wrap `infer` in a deadline
    #[error("inference did not finish within {0} seconds")]
    Timeout(u64),
}

impl InferError {
    pub fn kind(&self) -> &'static str {
        match self {
            InferError::NotReady => "MODEL_NOT_INITIALIZED",
            InferError::Busy => "BUSY",
            InferError::GenerationFailed(_) => "INFERENCE_ERROR",
            InferError::ModalityUnsupported(_) => "MODALITY_UNSUPPORTED",
            InferError::Timeout(_) => "TIMEOUT",
        }
    }
}

impl From<RuntimeError> for InferError {
    fn from(err: RuntimeError) -> Self {
        InferError::GenerationFailed(err.to_string())
    }
}
