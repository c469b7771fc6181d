use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compute backend a model is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Safe default, always available
    #[default]
    Cpu,
    /// Accelerator offload when the engine supports it
    Gpu,
}

/// What a loaded model can accept, reported once by the engine at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeCapabilities {
    pub backend: Backend,
    pub supports_vision: bool,
    pub supports_audio: bool,
}

impl RuntimeCapabilities {
    pub fn text_only(backend: Backend) -> Self {
        Self { backend, supports_vision: false, supports_audio: false }
    }
}

/// Parameters fixed when the model is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Upper bound on tokens per generation
    pub max_tokens: u32,
    /// Largest top-k any session on this runtime may request
    pub max_top_k: u32,
    /// Images a single prompt may carry
    pub max_images: u32,
    /// Context window handed to the engine
    pub context_size: u32,
    /// Preferred backend; engines fall back to CPU when they cannot honor it
    pub backend: Backend,
    /// Layers to offload when `backend` is `Gpu`
    pub gpu_layers: u32,
    /// Worker threads for the engine, 0 lets the engine decide
    pub threads: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            max_top_k: 40,
            max_images: 1,
            context_size: 2048,
            backend: Backend::Cpu,
            gpu_layers: 0,
            threads: 0,
        }
    }
}

/// Errors raised by the inference runtime and its sessions.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to load model: {0}")]
    LoadFailed(String),
    #[error("failed to create inference session: {0}")]
    SessionCreateFailed(String),
    /// Failure inside the engine while appending input or generating
    #[error("engine error: {0}")]
    Engine(String),
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::LoadFailed(_) => "LOAD_FAILED",
            RuntimeError::SessionCreateFailed(_) => "SESSION_CREATE_FAILED",
            RuntimeError::Engine(_) => "INFERENCE_ERROR",
        }
    }
}
