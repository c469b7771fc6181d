use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactLocator, BundleReader};
use crate::response::{InferenceResult, ResponseAssembler};
use crate::runtime::{InferenceRuntime, RuntimeHandle};
use crate::session::{AppendOutcome, InferenceSession, Modality, PromptRequest, SamplingConfig};
use super::types::{InferError, InitError, InitReport, SessionState};

/// Where the model artifact comes from.
#[derive(Clone)]
pub struct ModelSource {
    /// Application-private storage root checked first
    pub install_dir: PathBuf,
    /// Read-only application bundle used when nothing is installed
    pub bundle: Arc<dyn BundleReader>,
    /// Extracts bundled copies into its cache directory
    pub locator: ArtifactLocator,
    /// Fixed artifact filename
    pub filename: String,
}

/// Work items executed by the model worker, strictly in submission order.
pub(super) enum Job {
    Initialize {
        reply: oneshot::Sender<Result<InitReport, InitError>>,
    },
    Infer {
        request_id: Uuid,
        request: PromptRequest,
        reply: oneshot::Sender<Result<InferenceResult, InferError>>,
    },
}

/// State visible outside the worker thread.
#[derive(Default)]
pub(super) struct Shared {
    state: RwLock<SessionState>,
    report: RwLock<Option<InitReport>>,
    /// Inference jobs submitted and not yet finished
    pub(super) in_flight: AtomicUsize,
}

impl Shared {
    pub(super) fn state(&self) -> SessionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(super) fn report(&self) -> Option<InitReport> {
        self.report.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        debug!("Session state {:?} -> {:?}", *state, next);
        *state = next;
    }

    fn set_report(&self, report: Option<InitReport>) {
        *self.report.write().unwrap_or_else(|e| e.into_inner()) = report;
    }
}

/// Sole owner of the runtime handle and session.
pub(super) struct Worker {
    pub(super) source: ModelSource,
    pub(super) runtime: InferenceRuntime,
    pub(super) sampling: SamplingConfig,
    pub(super) shared: Arc<Shared>,
    pub(super) pair: Option<(RuntimeHandle, InferenceSession)>,
}

impl Worker {
    /// Processes jobs until every sender is gone, then tears the pair down.
    pub(super) fn run(mut self, jobs: Receiver<Job>) {
        info!("Model worker started");
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Initialize { reply } => {
                    let outcome = self.initialize();
                    if reply.send(outcome).is_err() {
                        debug!("Initialize caller went away before the result was ready");
                    }
                }
                Job::Infer { request_id, request, reply } => {
                    let outcome = self.infer(request_id, request);
                    self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                    if reply.send(outcome).is_err() {
                        warn!(%request_id, "Inference caller went away before the result was ready");
                    }
                }
            }
        }
        self.teardown();
        info!("Model worker stopped");
    }

    fn initialize(&mut self) -> Result<InitReport, InitError> {
        self.shared.set_state(SessionState::Loading);
        self.shared.set_report(None);
        self.teardown();

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.load_pair()))
            .unwrap_or_else(|panic| Err(InitError::Unexpected(format!("engine panicked: {}", panic_message(&*panic)))));

        match outcome {
            Ok((handle, session)) => {
                let report = InitReport::new(self.runtime.engine_name(), &handle, session.config());
                self.pair = Some((handle, session));
                self.shared.set_report(Some(report.clone()));
                self.shared.set_state(SessionState::Ready);
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "Model initialized successfully");
                Ok(report)
            }
            Err(e) => {
                error!(kind = e.kind(), "Model initialization failed: {}", e);
                self.shared.set_state(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Resolve, load, create. Stops at the first failure.
    fn load_pair(&self) -> Result<(RuntimeHandle, InferenceSession), InitError> {
        let artifact = self.source.locator.resolve(
            &self.source.install_dir,
            self.source.bundle.as_ref(),
            &self.source.filename,
        )?;
        info!("Model artifact resolved: {} ({:?})", artifact.path.display(), artifact.format);

        let handle = self.runtime.load(&artifact)?;
        match InferenceSession::create(&handle, self.sampling.clone()) {
            Ok(session) => Ok((handle, session)),
            Err(e) => {
                handle.release();
                Err(e.into())
            }
        }
    }

    fn infer(&mut self, request_id: Uuid, request: PromptRequest) -> Result<InferenceResult, InferError> {
        let span = info_span!("infer", %request_id);
        let _enter = span.enter();

        if self.shared.state() != SessionState::Ready {
            info!("Rejecting inference, model not initialized");
            return Err(InferError::NotReady);
        }
        let Some((_, session)) = self.pair.as_mut() else {
            return Err(InferError::NotReady);
        };

        self.shared.set_state(SessionState::Busy);
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| drive(&mut *session, request)))
            .unwrap_or_else(|panic| Err(InferError::GenerationFailed(format!("engine panicked: {}", panic_message(&*panic)))));

        // Whatever this request appended must not reach the next one, even after a failed append
        match catch_unwind(AssertUnwindSafe(|| session.reset())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to clear the session prompt: {}", e),
            Err(panic) => warn!("Engine panicked while clearing the session prompt: {}", panic_message(&*panic)),
        }
        self.shared.set_state(SessionState::Ready);

        match &outcome {
            Ok(_) => info!(elapsed_ms = started.elapsed().as_millis() as u64, "Inference complete"),
            Err(e) => error!(elapsed_ms = started.elapsed().as_millis() as u64, "Inference failed: {}", e),
        }
        outcome
    }

    /// Releases the current pair, session first.
    fn teardown(&mut self) {
        if let Some((handle, session)) = self.pair.take() {
            drop(session);
            handle.release();
        }
    }
}

/// Appends every chunk of the request, then consumes the whole fragment sequence.
fn drive(session: &mut InferenceSession, request: PromptRequest) -> Result<InferenceResult, InferError> {
    if request.is_empty() {
        debug!("Empty prompt, generating without input");
    }
    if let Some(text) = request.text.as_deref() {
        note_append(Modality::Text, session.append_text(text)?);
    }
    if let Some(image) = request.image_bytes.as_deref() {
        note_append(Modality::Image, session.append_image(image)?);
    }
    if let Some(audio) = request.audio_bytes.as_deref() {
        note_append(Modality::Audio, session.append_audio(audio)?);
    }

    let mut response = String::new();
    let mut fragments = 0usize;
    for fragment in session.generate()? {
        let fragment = fragment?;
        response.push_str(&fragment.text);
        fragments += 1;
        if fragment.is_final {
            break;
        }
    }
    debug!(fragments, chars = response.len(), "Generation finished");

    Ok(ResponseAssembler::parse(&response))
}

fn note_append(modality: Modality, outcome: AppendOutcome) {
    match outcome {
        AppendOutcome::Attached => debug!("Added {} chunk to session", modality),
        AppendOutcome::Empty => debug!("Empty {} chunk skipped", modality),
        AppendOutcome::Undecodable(reason) => warn!("Dropped {} attachment: {}", modality, reason),
        AppendOutcome::ModalityUnsupported(m) => warn!("Dropped attachment: {}", InferError::ModalityUnsupported(m)),
        AppendOutcome::LimitReached(m) => warn!("Dropped {} attachment: per-prompt limit reached", m),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
