use std::fmt;
use serde::{Deserialize, Serialize};

/// Sampling parameters, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    /// Tokens generated per request
    pub max_tokens: u32,
    /// Fixed seed for reproducible sampling, random when absent
    pub random_seed: Option<u64>,
    /// Whether image chunks may be attached at all
    pub enable_vision_modality: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            top_k: 64,
            top_p: 0.95,
            temperature: 1.0,
            max_tokens: 256,
            random_seed: None,
            enable_vision_modality: true,
        }
    }
}

impl SamplingConfig {
    /// Checks that every value is usable by a sampler.
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be greater than 0".to_string());
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(format!("top_p must be in (0, 1], got: {}", self.top_p));
        }
        if self.temperature.is_nan() || self.temperature < 0.0 {
            return Err(format!("temperature must not be negative, got: {}", self.temperature));
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// One multi-part prompt. Every part is optional, and an empty request is valid.
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub text: Option<String>,
    pub image_bytes: Option<Vec<u8>>,
    pub audio_bytes: Option<Vec<u8>>,
}

impl PromptRequest {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self { text: Some(text.into()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.image_bytes.is_none()
            && self.audio_bytes.is_none()
    }
}

/// One increment of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    /// Set on the last element of a generation, and only there
    pub is_final: bool,
}

/// Input types a session may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
            Modality::Audio => write!(f, "audio"),
        }
    }
}

/// Result of appending one chunk to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Attached,
    /// Blank text or an empty buffer
    Empty,
    /// Bytes could not be decoded into the expected media
    Undecodable(String),
    /// Neither the runtime nor the sampling config allow this input type
    ModalityUnsupported(Modality),
    /// The prompt already carries the runtime's maximum number of images
    LimitReached(Modality),
}
