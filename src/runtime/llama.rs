use llama_cpp::standard_sampler::{SamplerStage, StandardSampler};
use llama_cpp::{LlamaModel, LlamaParams, LlamaSession, SessionParams};
use tracing::{debug, info};

use crate::artifact::ModelArtifact;
use crate::session::SamplingConfig;
use super::engine::{EngineSession, LoadedModel, ModelEngine, PieceStream};
use super::types::{Backend, LoadOptions, RuntimeCapabilities, RuntimeError};

/// Engine backed by llama.cpp. Accepts GGUF artifacts and text input only.
#[derive(Debug, Default)]
pub struct LlamaEngine;

impl ModelEngine for LlamaEngine {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    fn load(&self, artifact: &ModelArtifact, options: &LoadOptions) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        // llama.cpp aborts the process on some malformed files, so reject them up front
        if !artifact.format.is_gguf() {
            return Err(RuntimeError::LoadFailed(format!(
                "{} is not a GGUF file (detected {:?})",
                artifact.path.display(),
                artifact.format
            )));
        }

        let n_gpu_layers = match options.backend {
            Backend::Gpu => options.gpu_layers,
            Backend::Cpu => 0,
        };
        let llama_params = LlamaParams { n_gpu_layers, ..Default::default() };
        info!(n_gpu_layers, "Attempting to load model with LlamaParams");

        let model = LlamaModel::load_from_file(&artifact.path, llama_params)
            .map_err(|e| RuntimeError::LoadFailed(format!("llama.cpp rejected {}: {}", artifact.path.display(), e)))?;

        let backend = if n_gpu_layers > 0 { Backend::Gpu } else { Backend::Cpu };
        Ok(Box::new(LlamaLoadedModel { model, options: options.clone(), backend }))
    }
}

struct LlamaLoadedModel {
    model: LlamaModel,
    options: LoadOptions,
    backend: Backend,
}

impl LoadedModel for LlamaLoadedModel {
    fn capabilities(&self) -> RuntimeCapabilities {
        RuntimeCapabilities::text_only(self.backend)
    }

    fn create_session(&self, config: &SamplingConfig) -> Result<Box<dyn EngineSession>, RuntimeError> {
        let mut session_params = SessionParams {
            n_ctx: self.options.context_size,
            ..Default::default()
        };
        if let Some(seed) = config.random_seed {
            session_params.seed = seed as u32;
        }
        if self.options.threads > 0 {
            session_params.n_threads = self.options.threads;
        }

        info!("Creating LlamaSession with context size: {}", session_params.n_ctx);
        let session = self.model.create_session(session_params)
            .map_err(|e| RuntimeError::SessionCreateFailed(format!("Failed to create LlamaSession: {}", e)))?;

        Ok(Box::new(LlamaEngineSession {
            session,
            config: config.clone(),
            max_tokens: config.max_tokens.min(self.options.max_tokens) as usize,
        }))
    }
}

struct LlamaEngineSession {
    session: LlamaSession,
    config: SamplingConfig,
    max_tokens: usize,
}

impl EngineSession for LlamaEngineSession {
    fn add_query_chunk(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.session.advance_context(text)
            .map_err(|e| RuntimeError::Engine(format!("Failed to advance context: {}", e)))?;
        debug!("Context advanced with {} bytes of prompt text", text.len());
        Ok(())
    }

    fn generate(&mut self) -> Result<PieceStream<'_>, RuntimeError> {
        let sampler = StandardSampler::new_softmax(
            vec![
                SamplerStage::TopK(self.config.top_k as i32),
                SamplerStage::TopP(self.config.top_p),
                SamplerStage::Temperature(self.config.temperature),
            ],
            1,
        );
        let completions = self.session.start_completing_with(sampler, self.max_tokens)
            .map_err(|e| RuntimeError::Engine(format!("Failed to start completion: {}", e)))?;
        info!("Started completion generation for max {} tokens.", self.max_tokens);

        Ok(Box::new(completions.into_strings().map(Ok)))
    }

    fn reset(&mut self) -> Result<(), RuntimeError> {
        self.session.truncate_context(0)
            .map_err(|e| RuntimeError::Engine(format!("Failed to truncate context: {}", e)))?;
        debug!("Context cleared");
        Ok(())
    }
}
