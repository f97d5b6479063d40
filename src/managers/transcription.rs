use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{EngineFactory, EngineSlot, RawTranscript};
use crate::error::TranscriptionFailure;
use crate::event::{AppEvent, EventBus};
use crate::jobs::{Generation, GenerationCounter};
use crate::managers::video::VideoInfo;
use crate::media::MediaTool;

/// Message a background task sends back to the event thread. The owner of the
/// receiver feeds these into `handle_completion`; background tasks never touch
/// manager state themselves.
pub enum Completion {
    EngineLoaded(std::result::Result<Arc<EngineSlot>, String>),
    TranscriptionFinished {
        generation: Generation,
        outcome: std::result::Result<RawTranscript, TranscriptionFailure>,
    },
}

/// Lifecycle of the per-video transcription task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Clone)]
enum EngineStatus {
    Loading,
    Ready(Arc<EngineSlot>),
    Failed(String),
}

struct TranscriptionState {
    engine: EngineStatus,
    video: Option<VideoInfo>,
    task: TaskState,
}

/// Owns the background speech-recognition pipeline: the resident engine
/// (loaded once, asynchronously) and one cancellable transcription task.
/// Cancellation is by generation: a video change or an explicit cancel bumps
/// the counter, and any result tagged with an older generation is discarded
/// when it comes back. Superseded work is never interrupted, only ignored.
#[derive(Clone)]
pub struct TranscriptionManager {
    state: Arc<Mutex<TranscriptionState>>,
    generation: GenerationCounter,
    bus: EventBus,
    media: Arc<dyn MediaTool>,
    config: EngineConfig,
    temp_dir: PathBuf,
    completions: UnboundedSender<Completion>,
}

impl TranscriptionManager {
    pub fn new(
        bus: EventBus,
        media: Arc<dyn MediaTool>,
        config: EngineConfig,
        temp_dir: PathBuf,
        completions: UnboundedSender<Completion>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TranscriptionState {
                engine: EngineStatus::Loading,
                video: None,
                task: TaskState::Idle,
            })),
            generation: GenerationCounter::new(),
            bus,
            media,
            config,
            temp_dir,
            completions,
        }
    }

    /// Kicks off the once-only engine load in the background. Readiness (or
    /// failure) arrives later as a `Completion::EngineLoaded`.
    pub fn begin_engine_load(&self, models_dir: PathBuf) {
        let config = self.config.clone();
        let completions = self.completions.clone();
        info!("Loading recognition engine ({:?})", config.kind);

        tokio::spawn(async move {
            let result = EngineFactory::load(&config, &models_dir)
                .await
                .map(|engine| Arc::new(EngineSlot::new(engine)))
                .map_err(|e| e.to_string());
            // Receiver gone means shutdown; nothing left to notify
            let _ = completions.send(Completion::EngineLoaded(result));
        });
    }

    /// Event-thread entry point for background results.
    pub fn handle_completion(&self, completion: Completion) {
        match completion {
            Completion::EngineLoaded(Ok(slot)) => {
                info!("Recognition engine ready: {}", slot.describe());
                self.state.lock().engine = EngineStatus::Ready(slot);
                self.bus.publish(AppEvent::EngineReady);
                self.start_queued();
            }
            Completion::EngineLoaded(Err(message)) => {
                warn!("Recognition engine failed to load: {}", message);
                let queued = {
                    let mut state = self.state.lock();
                    state.engine = EngineStatus::Failed(message.clone());
                    let queued = state.task == TaskState::Queued;
                    if queued {
                        state.task = TaskState::Failed;
                    }
                    queued
                };
                if queued {
                    self.bus.publish(AppEvent::TranscriptionFailed(
                        TranscriptionFailure::EngineUnavailable(message),
                    ));
                }
            }
            Completion::TranscriptionFinished {
                generation,
                outcome,
            } => {
                if !self.generation.is_current(generation) {
                    debug!(
                        "Discarding stale transcription result (generation {} superseded)",
                        generation
                    );
                    return;
                }
                match outcome {
                    Ok(raw) => {
                        info!("Transcription completed ({} words)", raw.word_count());
                        self.state.lock().task = TaskState::Completed;
                        self.bus.publish(AppEvent::TranscriptionReady(Arc::new(raw)));
                    }
                    Err(reason) => {
                        warn!("Transcription failed: {}", reason);
                        self.state.lock().task = TaskState::Failed;
                        self.bus.publish(AppEvent::TranscriptionFailed(reason));
                    }
                }
            }
        }
    }

    /// Wired to the video change notification. Records the video and advances
    /// the generation so any in-flight result for the previous video is
    /// discarded on arrival.
    pub fn on_video_changed(&self, info: &VideoInfo) {
        let generation = self.generation.bump();
        let mut state = self.state.lock();
        state.video = Some(info.clone());
        state.task = TaskState::Idle;
        debug!(
            "Video changed to {}; transcription generation advanced to {}",
            info.path.display(),
            generation
        );
    }

    /// Starts a transcription for the current video. If the engine is still
    /// loading, the request queues and runs on readiness. Failures surface as
    /// `TranscriptionFailed` notifications; nothing retries automatically.
    pub fn request_transcription(&self) {
        let mut state = self.state.lock();
        let Some(video) = state.video.clone() else {
            drop(state);
            warn!("Transcription requested with no video loaded");
            self.bus.publish(AppEvent::TranscriptionFailed(
                TranscriptionFailure::NoVideo,
            ));
            return;
        };

        let generation = self.generation.bump();
        match state.engine.clone() {
            EngineStatus::Loading => {
                info!(
                    "Engine still loading; transcription queued (generation {})",
                    generation
                );
                state.task = TaskState::Queued;
            }
            EngineStatus::Failed(message) => {
                state.task = TaskState::Failed;
                drop(state);
                self.bus.publish(AppEvent::TranscriptionFailed(
                    TranscriptionFailure::EngineUnavailable(message),
                ));
            }
            EngineStatus::Ready(slot) => {
                state.task = TaskState::Running;
                drop(state);
                self.spawn_task(video, slot, generation);
            }
        }
    }

    /// Abandons the current task. The underlying engine call is not
    /// interrupted; its result arrives under a superseded generation and is
    /// dropped silently.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if !matches!(state.task, TaskState::Queued | TaskState::Running) {
            return;
        }
        let generation = self.generation.bump();
        state.task = TaskState::Cancelled;
        drop(state);

        info!(
            "Transcription cancelled (generation advanced to {})",
            generation
        );
        self.bus.publish(AppEvent::TranscriptionCancelled);
    }

    pub fn task_state(&self) -> TaskState {
        self.state.lock().task
    }

    pub fn engine_ready(&self) -> bool {
        matches!(self.state.lock().engine, EngineStatus::Ready(_))
    }

    pub fn engine_error(&self) -> Option<String> {
        match &self.state.lock().engine {
            EngineStatus::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub fn current_generation(&self) -> Generation {
        self.generation.current()
    }

    /// Runs a request that queued while the engine was loading. The request
    /// keeps its original generation: if the video changed in the meantime
    /// the queue slot was already reset and nothing starts.
    fn start_queued(&self) {
        let (video, slot) = {
            let mut state = self.state.lock();
            if state.task != TaskState::Queued {
                return;
            }
            let EngineStatus::Ready(slot) = state.engine.clone() else {
                return;
            };
            let Some(video) = state.video.clone() else {
                state.task = TaskState::Idle;
                return;
            };
            state.task = TaskState::Running;
            (video, slot)
        };
        self.spawn_task(video, slot, self.generation.current());
    }

    fn spawn_task(&self, video: VideoInfo, slot: Arc<EngineSlot>, generation: Generation) {
        info!(
            "Starting transcription for {} (generation {})",
            video.path.display(),
            generation
        );

        let media = Arc::clone(&self.media);
        let completions = self.completions.clone();
        let language = self.config.language.clone();
        let timeout_secs = self.config.timeout_secs;
        let audio_path = self
            .temp_dir
            .join(format!("transcribe_{}_{}.wav", generation, Uuid::new_v4()));

        tokio::spawn(async move {
            let outcome = run_transcription(
                media,
                slot,
                &video.path,
                &audio_path,
                language.as_deref(),
                timeout_secs,
            )
            .await;
            // Receiver gone means shutdown; nothing left to notify
            let _ = completions.send(Completion::TranscriptionFinished {
                generation,
                outcome,
            });
        });
    }
}

/// The background task body: extract audio, then run the engine under its
/// slot with a bounded wait. Runs entirely off the event thread.
async fn run_transcription(
    media: Arc<dyn MediaTool>,
    slot: Arc<EngineSlot>,
    video_path: &Path,
    audio_path: &Path,
    language: Option<&str>,
    timeout_secs: u64,
) -> std::result::Result<RawTranscript, TranscriptionFailure> {
    if let Err(e) = media.extract_audio(video_path, audio_path).await {
        return Err(TranscriptionFailure::AudioExtraction(e.to_string()));
    }

    let call = slot.transcribe(audio_path, language);
    let outcome = match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(result) => result.map_err(|e| TranscriptionFailure::Engine(e.to_string())),
        Err(_) => Err(TranscriptionFailure::Timeout(timeout_secs)),
    };

    let _ = tokio::fs::remove_file(audio_path).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::engine::scripted::ScriptedEngine;
    use crate::event::EventKind;
    use crate::media::MockMediaTool;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    fn engine_config(timeout_secs: u64) -> EngineConfig {
        EngineConfig {
            kind: EngineKind::Mock,
            binary_path: String::new(),
            model: String::new(),
            language: None,
            timeout_secs,
        }
    }

    fn extracting_media() -> Arc<dyn MediaTool> {
        let mut media = MockMediaTool::new();
        media.expect_extract_audio().returning(|_, _| Ok(()));
        Arc::new(media)
    }

    fn manager_with(
        media: Arc<dyn MediaTool>,
        timeout_secs: u64,
    ) -> (
        TranscriptionManager,
        EventBus,
        UnboundedReceiver<Completion>,
        tempfile::TempDir,
    ) {
        let temp = tempfile::TempDir::new().unwrap();
        let bus = EventBus::new();
        let (tx, rx) = unbounded_channel();
        let manager = TranscriptionManager::new(
            bus.clone(),
            media,
            engine_config(timeout_secs),
            temp.path().to_path_buf(),
            tx,
        );
        (manager, bus, rx, temp)
    }

    fn ready_slot() -> Arc<EngineSlot> {
        Arc::new(EngineSlot::new(Arc::new(ScriptedEngine::default())))
    }

    fn video(path: &str) -> VideoInfo {
        VideoInfo {
            path: PathBuf::from(path),
            duration: 10.0,
        }
    }

    fn collect(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<AppEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
        seen
    }

    async fn pump_one(manager: &TranscriptionManager, rx: &mut UnboundedReceiver<Completion>) {
        let completion = rx.recv().await.unwrap();
        manager.handle_completion(completion);
    }

    #[tokio::test]
    async fn test_requests_queue_until_the_engine_is_ready() {
        let (manager, bus, mut rx, _temp) = manager_with(extracting_media(), 30);
        let ready = collect(&bus, EventKind::EngineReady);
        let done = collect(&bus, EventKind::TranscriptionReady);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        assert_eq!(manager.task_state(), TaskState::Queued);
        assert!(done.lock().is_empty());

        manager.handle_completion(Completion::EngineLoaded(Ok(ready_slot())));
        assert_eq!(ready.lock().len(), 1);
        assert_eq!(manager.task_state(), TaskState::Running);

        pump_one(&manager, &mut rx).await;
        assert_eq!(manager.task_state(), TaskState::Completed);
        assert_eq!(done.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded_after_video_change() {
        let (manager, bus, mut rx, _temp) = manager_with(extracting_media(), 30);
        manager.handle_completion(Completion::EngineLoaded(Ok(ready_slot())));
        let done = collect(&bus, EventKind::TranscriptionReady);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        assert_eq!(manager.task_state(), TaskState::Running);

        // Video B arrives while A's task is in flight
        manager.on_video_changed(&video("b.mp4"));

        // A's result comes back under a superseded generation: dropped
        pump_one(&manager, &mut rx).await;
        assert!(done.lock().is_empty());

        // B's own run completes and is delivered
        manager.request_transcription();
        pump_one(&manager, &mut rx).await;
        assert_eq!(done.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_the_late_result() {
        let (manager, bus, mut rx, _temp) = manager_with(extracting_media(), 30);
        manager.handle_completion(Completion::EngineLoaded(Ok(ready_slot())));
        let done = collect(&bus, EventKind::TranscriptionReady);
        let cancelled = collect(&bus, EventKind::TranscriptionCancelled);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        manager.cancel();
        assert_eq!(manager.task_state(), TaskState::Cancelled);
        assert_eq!(cancelled.lock().len(), 1);

        pump_one(&manager, &mut rx).await;
        assert!(done.lock().is_empty());

        // Cancelling again with nothing running is a no-op
        manager.cancel();
        assert_eq!(cancelled.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_audio_extraction_failure_has_its_own_reason() {
        let mut media = MockMediaTool::new();
        media.expect_extract_audio().returning(|_, _| {
            Err(crate::error::JimakuError::Media("no audio stream".to_string()))
        });
        let (manager, bus, mut rx, _temp) = manager_with(Arc::new(media), 30);
        manager.handle_completion(Completion::EngineLoaded(Ok(ready_slot())));
        let failed = collect(&bus, EventKind::TranscriptionFailed);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        pump_one(&manager, &mut rx).await;

        let failures = failed.lock();
        assert!(matches!(
            failures[0],
            AppEvent::TranscriptionFailed(TranscriptionFailure::AudioExtraction(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_engine_times_out() {
        let slot = Arc::new(EngineSlot::new(Arc::new(
            ScriptedEngine::default().with_delay_ms(5_000),
        )));
        let (manager, bus, mut rx, _temp) = manager_with(extracting_media(), 0);
        manager.handle_completion(Completion::EngineLoaded(Ok(slot)));
        let failed = collect(&bus, EventKind::TranscriptionFailed);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        pump_one(&manager, &mut rx).await;

        let failures = failed.lock();
        assert!(matches!(
            failures[0],
            AppEvent::TranscriptionFailed(TranscriptionFailure::Timeout(0))
        ));
    }

    #[tokio::test]
    async fn test_request_without_video_fails_fast() {
        let (manager, bus, _rx, _temp) = manager_with(extracting_media(), 30);
        let failed = collect(&bus, EventKind::TranscriptionFailed);

        manager.request_transcription();
        let failures = failed.lock();
        assert!(matches!(
            failures[0],
            AppEvent::TranscriptionFailed(TranscriptionFailure::NoVideo)
        ));
    }

    #[tokio::test]
    async fn test_engine_load_failure_surfaces_as_unavailable() {
        let (manager, bus, _rx, _temp) = manager_with(extracting_media(), 30);
        let failed = collect(&bus, EventKind::TranscriptionFailed);

        manager.handle_completion(Completion::EngineLoaded(Err("missing binary".to_string())));
        assert_eq!(manager.engine_error(), Some("missing binary".to_string()));

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        let failures = failed.lock();
        assert!(matches!(
            failures[0],
            AppEvent::TranscriptionFailed(TranscriptionFailure::EngineUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_queued_request_dies_with_a_video_change() {
        let (manager, bus, mut rx, _temp) = manager_with(extracting_media(), 30);
        let done = collect(&bus, EventKind::TranscriptionReady);

        manager.on_video_changed(&video("a.mp4"));
        manager.request_transcription();
        assert_eq!(manager.task_state(), TaskState::Queued);

        // The import gesture resets the queue slot before the engine arrives
        manager.on_video_changed(&video("b.mp4"));
        manager.handle_completion(Completion::EngineLoaded(Ok(ready_slot())));
        assert_eq!(manager.task_state(), TaskState::Idle);
        assert!(rx.try_recv().is_err());
        assert!(done.lock().is_empty());
    }
}
