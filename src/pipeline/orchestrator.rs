//! Sequential encoding pipeline with single-run admission.

use crate::audio::{AudioAsset, AudioNormalizer};
use crate::codec::SafePayload;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::inference::{InferenceEngine, OnnxEngine};
use crate::pipeline::state::{PipelineEvent, PipelineFailure, PipelineState, Stage};
use crate::remote::{HttpSubmitter, ResourceLocator, Submitter};
use crate::tensor::{OutputBinding, TensorAdapter};
use crossbeam_channel::Sender;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Drives one audio asset through normalize, tensor preparation, inference,
/// serialization and submission.
///
/// Only one run may be in flight. A trigger while `Running` fails with
/// `Busy` and leaves the in-flight run untouched. The engine is shared
/// across runs, so the model is loaded once per orchestrator.
///
/// Decoding and inference hold an exclusivity permit that travels into the
/// blocking pool with the work. A cancelled run keeps it until that work
/// actually ends, and the next run waits for it before decoding.
pub struct PipelineOrchestrator {
    normalizer: Arc<AudioNormalizer>,
    adapter: TensorAdapter,
    engine: Arc<dyn InferenceEngine>,
    submitter: Arc<dyn Submitter>,
    state: Mutex<PipelineState>,
    exclusive: Arc<AsyncMutex<()>>,
    event_tx: Option<Sender<PipelineEvent>>,
}

impl PipelineOrchestrator {
    pub fn new(
        normalizer: AudioNormalizer,
        engine: Arc<dyn InferenceEngine>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self {
            normalizer: Arc::new(normalizer),
            adapter: TensorAdapter::default(),
            engine,
            submitter,
            state: Mutex::new(PipelineState::Idle),
            exclusive: Arc::new(AsyncMutex::new(())),
            event_tx: None,
        }
    }

    /// Build the production pipeline: loads the model and prepares the HTTP client.
    ///
    /// # Errors
    /// `ModelLoad` if the model cannot be loaded, `Remote` if the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = OnnxEngine::load(&config.model.path, config.model.intra_threads)?;
        let submitter = HttpSubmitter::new(&config.service.base_url, config.service.timeout)?;

        Ok(Self::new(
            AudioNormalizer::from_config(&config.audio),
            Arc::new(engine),
            Arc::new(submitter),
        )
        .with_binding(OutputBinding::from_config(&config.model)))
    }

    pub fn with_binding(mut self, binding: OutputBinding) -> Self {
        self.adapter = TensorAdapter::new(binding);
        self
    }

    /// Publish state transitions on `tx`.
    pub fn with_event_sender(mut self, tx: Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.lock_state().clone()
    }

    /// Return a terminal state to `Idle`. Returns false if there was nothing to acknowledge.
    pub fn acknowledge(&self) -> bool {
        let mut state = self.lock_state();
        if !state.is_terminal() {
            return false;
        }
        *state = PipelineState::Idle;
        drop(state);
        self.emit(PipelineEvent::Reset);
        true
    }

    /// Run the whole pipeline for one asset.
    ///
    /// Dropping the returned future abandons the run: the state returns to
    /// `Idle` and a `Cancelled` event is published. Work already handed to
    /// the blocking pool finishes there and releases its resources, including
    /// the exclusivity permit, when it ends.
    ///
    /// # Errors
    /// The first failing stage, wrapped with its name. A `Trigger` failure
    /// with `Busy` means another run is still in flight.
    pub async fn run(&self, asset: AudioAsset) -> std::result::Result<ResourceLocator, PipelineFailure> {
        self.begin()?;

        let mut guard = RunGuard {
            orchestrator: self,
            armed: true,
        };
        let outcome = self.execute(asset).await;
        guard.armed = false;

        self.finish(outcome)
    }

    fn begin(&self) -> std::result::Result<(), PipelineFailure> {
        let mut state = self.lock_state();
        if state.is_running() {
            tracing::warn!("rejecting trigger, a run is already in progress");
            return Err(PipelineFailure::new(Stage::Trigger, RelayError::Busy));
        }
        *state = PipelineState::Running;
        drop(state);

        tracing::info!("pipeline run started");
        self.emit(PipelineEvent::Started);
        Ok(())
    }

    async fn execute(&self, asset: AudioAsset) -> std::result::Result<ResourceLocator, PipelineFailure> {
        let permit = self.acquire_exclusive().await;

        let normalizer = Arc::clone(&self.normalizer);
        let (pcm, permit) = self
            .stage(
                Stage::Normalize,
                blocking(move || normalizer.normalize(&asset).map(|pcm| (pcm, permit))),
            )
            .await?;

        let tensor = self
            .stage(Stage::PrepareTensor, async { self.adapter.to_input_tensor(&pcm) })
            .await?;
        drop(pcm);

        let engine = Arc::clone(&self.engine);
        let outputs = self
            .stage(Stage::Inference, async {
                let raw = blocking(move || {
                    let raw = engine.run(tensor);
                    drop(permit);
                    raw
                })
                .await?;
                self.adapter.from_outputs(raw)
            })
            .await?;

        let payload = self
            .stage(Stage::Serialize, async { SafePayload::from_outputs(&outputs) })
            .await?;
        drop(outputs);

        self.stage(Stage::Submit, self.submitter.submit(&payload))
            .await
    }

    fn finish(
        &self,
        outcome: std::result::Result<ResourceLocator, PipelineFailure>,
    ) -> std::result::Result<ResourceLocator, PipelineFailure> {
        let (state, event) = match &outcome {
            Ok(locator) => {
                tracing::info!(locator = %locator, "pipeline run succeeded");
                (
                    PipelineState::Succeeded(locator.clone()),
                    PipelineEvent::Succeeded(locator.clone()),
                )
            }
            Err(failure) => {
                tracing::error!(stage = %failure.stage, error = %failure.error, "pipeline run failed");
                (
                    PipelineState::Failed(failure.clone()),
                    PipelineEvent::Failed(failure.clone()),
                )
            }
        };
        *self.lock_state() = state;
        self.emit(event);
        outcome
    }

    async fn stage<T, F>(&self, stage: Stage, work: F) -> std::result::Result<T, PipelineFailure>
    where
        F: Future<Output = Result<T>>,
    {
        self.emit(PipelineEvent::StageStarted(stage));
        let started = Instant::now();

        let result = work.await;
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                tracing::debug!(
                    stage = %stage,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "stage completed"
                );
                self.emit(PipelineEvent::StageCompleted { stage, elapsed });
                Ok(value)
            }
            Err(error) => Err(PipelineFailure::new(stage, error)),
        }
    }

    /// Wait until no earlier run still holds the model or a decoder.
    async fn acquire_exclusive(&self) -> OwnedMutexGuard<()> {
        if let Ok(permit) = Arc::clone(&self.exclusive).try_lock_owned() {
            return permit;
        }
        tracing::debug!("waiting for a cancelled run to release the engine");
        Arc::clone(&self.exclusive).lock_owned().await
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.event_tx {
            // Observers are optional; a full or closed channel never stalls a run
            let _ = tx.try_send(event);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resets the state if the run future is dropped before completing.
struct RunGuard<'a> {
    orchestrator: &'a PipelineOrchestrator,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("pipeline run cancelled");
            *self.orchestrator.lock_state() = PipelineState::Idle;
            self.orchestrator.emit(PipelineEvent::Cancelled);
        }
    }
}

/// Run CPU-bound or blocking work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(RelayError::Io(std::io::Error::other(e))),
    }
}
