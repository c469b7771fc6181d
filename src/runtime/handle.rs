use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::artifact::ModelArtifact;
use crate::session::SamplingConfig;
use super::engine::{EngineSession, LoadedModel, ModelEngine};
use super::types::{LoadOptions, RuntimeCapabilities, RuntimeError};

/// Loads model artifacts with a fixed engine and fixed load options.
///
/// Loading is expensive (hundreds of milliseconds to seconds) and must only be
/// driven from the session manager's worker thread.
#[derive(Clone)]
pub struct InferenceRuntime {
    engine: Arc<dyn ModelEngine>,
    options: LoadOptions,
}

impl InferenceRuntime {
    pub fn new(engine: Arc<dyn ModelEngine>, options: LoadOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Loads the artifact into a new runtime handle.
    ///
    /// The artifact must exist and be non-empty; the caller is responsible for
    /// releasing any previous handle first.
    pub fn load(&self, artifact: &ModelArtifact) -> Result<RuntimeHandle, RuntimeError> {
        let on_disk = std::fs::metadata(&artifact.path)
            .map_err(|e| RuntimeError::LoadFailed(format!("{}: {}", artifact.path.display(), e)))?;
        if on_disk.len() == 0 {
            return Err(RuntimeError::LoadFailed(format!("{} is empty", artifact.path.display())));
        }

        info!(
            engine = self.engine.name(),
            backend = ?self.options.backend,
            max_tokens = self.options.max_tokens,
            max_top_k = self.options.max_top_k,
            max_images = self.options.max_images,
            "Loading model from {}",
            artifact.path.display()
        );
        let started = Instant::now();
        let model = self.engine.load(artifact, &self.options)?;
        let capabilities = model.capabilities();
        if capabilities.backend != self.options.backend {
            warn!("Engine bound the model to {:?} instead of the requested {:?}", capabilities.backend, self.options.backend);
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            vision = capabilities.supports_vision,
            audio = capabilities.supports_audio,
            "Model loaded"
        );

        Ok(RuntimeHandle {
            model,
            capabilities,
            options: self.options.clone(),
            artifact: artifact.clone(),
            loaded_at: Utc::now(),
        })
    }
}

/// A loaded model. Exactly one is alive per session manager.
pub struct RuntimeHandle {
    model: Box<dyn LoadedModel>,
    capabilities: RuntimeCapabilities,
    options: LoadOptions,
    artifact: ModelArtifact,
    loaded_at: DateTime<Utc>,
}

impl RuntimeHandle {
    pub fn capabilities(&self) -> RuntimeCapabilities {
        self.capabilities
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub(crate) fn open_session(&self, config: &SamplingConfig) -> Result<Box<dyn EngineSession>, RuntimeError> {
        self.model.create_session(config)
    }

    /// Tears the model down explicitly instead of waiting for it to go out of scope.
    pub fn release(self) {
        info!("Releasing model loaded from {}", self.artifact.path.display());
        self.model.release();
    }
}
