use std::iter::Peekable;
use tracing::{debug, info, warn};

use crate::runtime::{EngineSession, PieceStream, RuntimeCapabilities, RuntimeError, RuntimeHandle};
use super::types::{AppendOutcome, Fragment, Modality, SamplingConfig};

/// A stateful generation session: sampling configuration plus the pending prompt.
///
/// Attachments degrade gracefully. A chunk that cannot be decoded or whose
/// modality is unavailable is skipped and reported through [`AppendOutcome`],
/// so one bad attachment never aborts a request.
pub struct InferenceSession {
    inner: Box<dyn EngineSession>,
    config: SamplingConfig,
    capabilities: RuntimeCapabilities,
    max_images: u32,
    /// Images appended since the last generation
    pending_images: u32,
}

impl InferenceSession {
    /// Creates a session on a loaded runtime.
    ///
    /// # Arguments
    ///
    /// * `runtime` - The loaded model to sample from
    /// * `config` - Sampling parameters, immutable afterwards
    ///
    /// # Returns
    ///
    /// The session, or `SessionCreateFailed` for invalid parameters or engine failures
    pub fn create(runtime: &RuntimeHandle, mut config: SamplingConfig) -> Result<Self, RuntimeError> {
        config.validate().map_err(RuntimeError::SessionCreateFailed)?;

        let max_top_k = runtime.options().max_top_k;
        if max_top_k > 0 && config.top_k > max_top_k {
            debug!("Clamping top_k {} to the runtime maximum {}", config.top_k, max_top_k);
            config.top_k = max_top_k;
        }

        let inner = runtime.open_session(&config).map_err(|e| match e {
            RuntimeError::SessionCreateFailed(msg) => RuntimeError::SessionCreateFailed(msg),
            other => RuntimeError::SessionCreateFailed(other.to_string()),
        })?;
        info!(
            top_k = config.top_k,
            top_p = config.top_p,
            temperature = config.temperature,
            max_tokens = config.max_tokens,
            vision = config.enable_vision_modality,
            "Inference session created"
        );

        Ok(Self {
            inner,
            config,
            capabilities: runtime.capabilities(),
            max_images: runtime.options().max_images,
            pending_images: 0,
        })
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Appends a text chunk; blank input is ignored.
    pub fn append_text(&mut self, text: &str) -> Result<AppendOutcome, RuntimeError> {
        if text.trim().is_empty() {
            return Ok(AppendOutcome::Empty);
        }
        self.inner.add_query_chunk(text)?;
        Ok(AppendOutcome::Attached)
    }

    /// Decodes and appends an image.
    pub fn append_image(&mut self, bytes: &[u8]) -> Result<AppendOutcome, RuntimeError> {
        if bytes.is_empty() {
            return Ok(AppendOutcome::Empty);
        }
        if !self.config.enable_vision_modality || !self.capabilities.supports_vision {
            return Ok(AppendOutcome::ModalityUnsupported(Modality::Image));
        }
        if self.pending_images >= self.max_images {
            warn!("Prompt already carries {} image(s), dropping another", self.pending_images);
            return Ok(AppendOutcome::LimitReached(Modality::Image));
        }

        let image = match image::load_from_memory(bytes) {
            Ok(image) if image.width() > 0 && image.height() > 0 => image,
            Ok(_) => {
                warn!("Ignoring zero-sized image attachment");
                return Ok(AppendOutcome::Undecodable("image has no pixels".to_string()));
            }
            Err(e) => {
                warn!("Ignoring undecodable image attachment: {}", e);
                return Ok(AppendOutcome::Undecodable(e.to_string()));
            }
        };

        self.inner.add_image(&image)?;
        self.pending_images += 1;
        debug!("Image {}x{} added to session", image.width(), image.height());
        Ok(AppendOutcome::Attached)
    }

    /// Appends raw audio when the runtime advertises audio support.
    pub fn append_audio(&mut self, bytes: &[u8]) -> Result<AppendOutcome, RuntimeError> {
        if bytes.is_empty() {
            return Ok(AppendOutcome::Empty);
        }
        if !self.capabilities.supports_audio {
            return Ok(AppendOutcome::ModalityUnsupported(Modality::Audio));
        }
        self.inner.add_audio(bytes)?;
        debug!("Audio ({} bytes) added to session", bytes.len());
        Ok(AppendOutcome::Attached)
    }

    /// Generates over the pending prompt.
    ///
    /// The returned sequence is lazy and cannot be restarted. A successful
    /// sequence ends with exactly one fragment marked `is_final`, and the
    /// concatenation of all fragments is the complete response.
    pub fn generate(&mut self) -> Result<Fragments<'_>, RuntimeError> {
        self.pending_images = 0;
        let pieces = self.inner.generate()?;
        Ok(Fragments { pieces: pieces.peekable(), done: false })
    }

    /// Discards the pending prompt, attachments included, so the next request starts clean.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        self.pending_images = 0;
        self.inner.reset()
    }
}

/// Lazy sequence of generated fragments with an explicit terminal element.
pub struct Fragments<'a> {
    pieces: Peekable<PieceStream<'a>>,
    done: bool,
}

impl Iterator for Fragments<'_> {
    type Item = Result<Fragment, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pieces.next() {
            // An engine that stops without output still owes the final marker
            None => {
                self.done = true;
                Some(Ok(Fragment { text: String::new(), is_final: true }))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Some(Ok(text)) => {
                let is_final = self.pieces.peek().is_none();
                self.done = is_final;
                Some(Ok(Fragment { text, is_final }))
            }
        }
    }
}
