use std::io;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactLocator, DirectoryBundle};
use crate::config::Settings;
use crate::response::InferenceResult;
use crate::runtime::{InferenceRuntime, ModelEngine};
use crate::session::{PromptRequest, SamplingConfig};
use super::types::{BusyPolicy, InferError, InitError, InitReport, SessionState};
use super::worker::{Job, ModelSource, Shared, Worker};

/// Owns the model lifecycle and serializes every request against it.
///
/// All loading, appending and generation happens on one dedicated worker
/// thread, in submission order. Callers only ever await replies, so the
/// manager can be cloned freely into request handlers.
#[derive(Clone)]
pub struct SessionManager {
    jobs: Sender<Job>,
    shared: Arc<Shared>,
    policy: BusyPolicy,
}

impl SessionManager {
    /// Spawns the model worker.
    ///
    /// # Arguments
    ///
    /// * `source` - Where to find the model artifact
    /// * `runtime` - Loader bound to an engine and load options
    /// * `sampling` - Configuration for every session created on (re-)initialization
    /// * `policy` - Behavior for inference calls arriving while one is running
    ///
    /// # Returns
    ///
    /// The manager in state `Uninitialized`, or the error from spawning the thread
    pub fn new(
        source: ModelSource,
        runtime: InferenceRuntime,
        sampling: SamplingConfig,
        policy: BusyPolicy,
    ) -> io::Result<Self> {
        let (jobs, receiver) = mpsc::channel();
        let shared = Arc::new(Shared::default());
        let worker = Worker {
            source,
            runtime,
            sampling,
            shared: Arc::clone(&shared),
            pair: None,
        };
        thread::Builder::new()
            .name("model-worker".to_string())
            .spawn(move || worker.run(receiver))?;

        Ok(Self { jobs, shared, policy })
    }

    /// Builds a manager from loaded settings and the engine to run.
    pub fn from_settings(settings: &Settings, engine: Arc<dyn ModelEngine>) -> io::Result<Self> {
        let storage = &settings.storage;
        let source = ModelSource {
            install_dir: storage.install_dir.clone(),
            bundle: Arc::new(DirectoryBundle::new(&storage.bundle_dir)),
            locator: ArtifactLocator::new(&storage.cache_dir),
            filename: storage.model_filename.clone(),
        };
        let runtime = InferenceRuntime::new(engine, settings.runtime.load_options());
        Self::new(source, runtime, settings.sampling.clone(), settings.worker.on_busy)
    }

    /// Resolves the artifact, loads it and opens a fresh session.
    ///
    /// Safe to call repeatedly: any previous handle and session are released
    /// before the new ones are created. On failure the state is `Failed` and
    /// the error names the step that failed.
    pub async fn initialize(&self) -> Result<InitReport, InitError> {
        info!("Model initialization requested");
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job::Initialize { reply })
            .map_err(|_| InitError::Unexpected("model worker has stopped".to_string()))?;

        response
            .await
            .map_err(|_| InitError::Unexpected("model worker dropped the request".to_string()))?
    }

    /// Runs one multi-part prompt and returns the structured response.
    ///
    /// Requests are served strictly one at a time. Under `BusyPolicy::Queue`
    /// a caller waits its turn; under `BusyPolicy::Reject` it gets `Busy`
    /// immediately while another inference is pending.
    pub async fn infer(&self, request: PromptRequest) -> Result<InferenceResult, InferError> {
        let request_id = Uuid::new_v4();
        let waiting = match self.policy {
            BusyPolicy::Queue => self.shared.in_flight.fetch_add(1, Ordering::SeqCst),
            BusyPolicy::Reject => {
                if self
                    .shared
                    .in_flight
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    info!(%request_id, "Rejecting inference, another one is running");
                    return Err(InferError::Busy);
                }
                0
            }
        };
        info!(
            %request_id,
            queued_behind = waiting,
            text = request.text.is_some(),
            image = request.image_bytes.is_some(),
            audio = request.audio_bytes.is_some(),
            "Inference requested"
        );

        let (reply, response) = oneshot::channel();
        if self.jobs.send(Job::Infer { request_id, request, reply }).is_err() {
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            warn!(%request_id, "Model worker has stopped");
            return Err(InferError::GenerationFailed("model worker has stopped".to_string()));
        }

        response
            .await
            .map_err(|_| InferError::GenerationFailed("model worker dropped the request".to_string()))?
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Report of the last successful initialization, cleared while loading or after a failure.
    pub fn report(&self) -> Option<InitReport> {
        self.shared.report()
    }
}
