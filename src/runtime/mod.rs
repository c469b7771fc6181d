mod engine;
mod handle;
#[cfg(feature = "llama")]
mod llama;
mod types;

pub use engine::{default_engine, EngineSession, LoadedModel, ModelEngine, PieceStream, UnavailableEngine};
pub use handle::{InferenceRuntime, RuntimeHandle};
#[cfg(feature = "llama")]
pub use llama::LlamaEngine;
pub use types::{Backend, LoadOptions, RuntimeCapabilities, RuntimeError};
