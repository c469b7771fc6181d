use image::DynamicImage;

use crate::artifact::ModelArtifact;
use crate::session::SamplingConfig;
use super::types::{LoadOptions, RuntimeCapabilities, RuntimeError};

/// Raw text pieces streamed by an engine, in emission order.
pub type PieceStream<'a> = Box<dyn Iterator<Item = Result<String, RuntimeError>> + Send + 'a>;

/// An inference engine able to turn an artifact into a loaded model.
///
/// This is the seam to the neural network itself, which stays opaque.
pub trait ModelEngine: Send + Sync {
    /// Short engine name for logs and status reports
    fn name(&self) -> &str;

    /// Loads the artifact. Called on the manager's worker thread only.
    fn load(
        &self,
        artifact: &ModelArtifact,
        options: &LoadOptions,
    ) -> Result<Box<dyn LoadedModel>, RuntimeError>;
}

/// Model weights bound to a compute backend.
pub trait LoadedModel: Send {
    /// Capability descriptor, queried once right after load
    fn capabilities(&self) -> RuntimeCapabilities;

    fn create_session(&self, config: &SamplingConfig) -> Result<Box<dyn EngineSession>, RuntimeError>;

    /// Frees native resources. The default relies on `Drop`.
    fn release(self: Box<Self>) {}
}

/// Engine-side generation state: a prompt buffer plus sampling state.
pub trait EngineSession: Send {
    fn add_query_chunk(&mut self, text: &str) -> Result<(), RuntimeError>;

    fn add_image(&mut self, _image: &DynamicImage) -> Result<(), RuntimeError> {
        Err(RuntimeError::Engine("image input is not supported by this engine".into()))
    }

    fn add_audio(&mut self, _audio: &[u8]) -> Result<(), RuntimeError> {
        Err(RuntimeError::Engine("audio input is not supported by this engine".into()))
    }

    /// Starts generation over everything appended so far.
    fn generate(&mut self) -> Result<PieceStream<'_>, RuntimeError>;

    /// Drops every appended chunk and any context left by earlier generations.
    fn reset(&mut self) -> Result<(), RuntimeError>;
}

/// Stand-in used when the binary is built without any native engine.
#[derive(Debug, Default)]
pub struct UnavailableEngine;

impl ModelEngine for UnavailableEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn load(&self, artifact: &ModelArtifact, _options: &LoadOptions) -> Result<Box<dyn LoadedModel>, RuntimeError> {
        Err(RuntimeError::LoadFailed(format!(
            "no inference engine compiled in (rebuild with `--features llama`) to load {}",
            artifact.path.display()
        )))
    }
}

/// Returns the engine this binary was built with.
pub fn default_engine() -> Box<dyn ModelEngine> {
    #[cfg(feature = "llama")]
    {
        Box::new(super::llama::LlamaEngine::default())
    }
    #[cfg(not(feature = "llama"))]
    {
        Box::new(UnavailableEngine)
    }
}
