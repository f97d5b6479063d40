use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use crate::config::Config;
use crate::error::{JimakuError, ProjectFailure, Result, TranscriptionFailure};
use crate::event::{AppEvent, EventBus, EventKind};
use crate::managers::transcription::TaskState;
use crate::managers::{
    Completion, ProjectManager, StyleManager, SubtitlesManager, TranscriptionManager, VideoManager,
};
use crate::media::{MediaTool, MediaToolFactory};
use crate::preview::PreviewTracker;
use crate::setup::AppDirs;
use crate::subtitles::{ass, srt};

/// Failures the managers report through notifications, captured so the
/// blocking facade methods can hand them back as errors.
#[derive(Default)]
struct Outcomes {
    transcription: Mutex<Option<TranscriptionFailure>>,
    project: Mutex<Option<ProjectFailure>>,
}

/// Composition root: owns the notification bus, the managers and the
/// completion channel, and wires the subscriptions between them. All
/// notifications and completions are processed on the task that drives the
/// Studio; background work only ever reports back through the channel.
pub struct Studio {
    dirs: AppDirs,
    bus: EventBus,
    media: Arc<dyn MediaTool>,
    video: VideoManager,
    subtitles: SubtitlesManager,
    style: StyleManager,
    transcription: TranscriptionManager,
    project: ProjectManager,
    preview: PreviewTracker,
    completions: UnboundedReceiver<Completion>,
    outcomes: Arc<Outcomes>,
}

impl Studio {
    pub fn new(config: Config) -> Result<Self> {
        let dirs = AppDirs::resolve(&config.storage);
        dirs.ensure()?;

        let media = MediaToolFactory::create_tool(config.media.clone());
        media.check_availability()?;

        Ok(Self::assemble(config, dirs, media))
    }

    fn assemble(config: Config, dirs: AppDirs, media: Arc<dyn MediaTool>) -> Self {
        let bus = EventBus::new();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let video = VideoManager::new(bus.clone());
        let subtitles = SubtitlesManager::new(bus.clone(), config.editing.clone());
        let style = StyleManager::new(bus.clone(), dirs.presets.clone());
        let transcription = TranscriptionManager::new(
            bus.clone(),
            Arc::clone(&media),
            config.engine.clone(),
            dirs.temp.clone(),
            completions_tx,
        );
        let project = ProjectManager::new(
            bus.clone(),
            video.clone(),
            style.clone(),
            subtitles.clone(),
        );
        let preview = PreviewTracker::new(&config.preview, &dirs.temp);

        // A new video starts from nothing: in-flight work is superseded and
        // the committed track resets.
        {
            let transcription = transcription.clone();
            let subtitles = subtitles.clone();
            bus.subscribe(EventKind::VideoChanged, move |event| {
                if let AppEvent::VideoChanged(info) = event {
                    transcription.on_video_changed(info);
                    subtitles.clear();
                }
            });
        }
        // Fresh transcripts land in the editing surface.
        {
            let subtitles = subtitles.clone();
            bus.subscribe(EventKind::TranscriptionReady, move |event| {
                if let AppEvent::TranscriptionReady(raw) = event {
                    subtitles.apply_transcript(raw);
                }
            });
        }
        // The preview track follows the committed state.
        {
            let preview = preview.clone();
            bus.subscribe(EventKind::SubtitlesChanged, move |event| {
                if let AppEvent::SubtitlesChanged(snapshot) = event {
                    preview.on_subtitles_changed(Arc::clone(snapshot));
                }
            });
        }
        {
            let preview = preview.clone();
            bus.subscribe(EventKind::StyleChanged, move |event| {
                if let AppEvent::StyleChanged(snapshot) = event {
                    preview.on_style_changed(Arc::clone(snapshot));
                }
            });
        }

        let outcomes = Arc::new(Outcomes::default());
        {
            let outcomes = Arc::clone(&outcomes);
            bus.subscribe(EventKind::TranscriptionFailed, move |event| {
                if let AppEvent::TranscriptionFailed(reason) = event {
                    *outcomes.transcription.lock() = Some(reason.clone());
                }
            });
        }
        {
            let outcomes = Arc::clone(&outcomes);
            bus.subscribe(EventKind::ProjectSaveFailed, move |event| {
                if let AppEvent::ProjectSaveFailed(reason) = event {
                    *outcomes.project.lock() = Some(reason.clone());
                }
            });
        }
        {
            let outcomes = Arc::clone(&outcomes);
            bus.subscribe(EventKind::ProjectLoadFailed, move |event| {
                if let AppEvent::ProjectLoadFailed(reason) = event {
                    *outcomes.project.lock() = Some(reason.clone());
                }
            });
        }

        Self {
            dirs,
            bus,
            media,
            video,
            subtitles,
            style,
            transcription,
            project,
            preview,
            completions: completions_rx,
            outcomes,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    pub fn video(&self) -> &VideoManager {
        &self.video
    }

    pub fn subtitles(&self) -> &SubtitlesManager {
        &self.subtitles
    }

    pub fn style(&self) -> &StyleManager {
        &self.style
    }

    pub fn transcription(&self) -> &TranscriptionManager {
        &self.transcription
    }

    pub fn project(&self) -> &ProjectManager {
        &self.project
    }

    pub fn begin_engine_load(&self) {
        self.transcription.begin_engine_load(self.dirs.models.clone());
    }

    /// Feeds one background completion into the managers. The UI shell or CLI
    /// driver calls this from the task that owns the Studio.
    pub async fn pump_completion(&mut self) -> Result<()> {
        match self.completions.recv().await {
            Some(completion) => {
                self.transcription.handle_completion(completion);
                Ok(())
            }
            None => Err(JimakuError::Engine(
                "Completion channel closed".to_string(),
            )),
        }
    }

    /// Blocks until the engine load kicked off by `begin_engine_load`
    /// settles one way or the other.
    pub async fn wait_for_engine(&mut self) -> Result<()> {
        while !self.transcription.engine_ready() {
            if let Some(message) = self.transcription.engine_error() {
                return Err(JimakuError::Engine(message));
            }
            self.pump_completion().await?;
        }
        Ok(())
    }

    /// Probes the file and makes it the working video.
    pub async fn open_video<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(JimakuError::FileNotFound(path.display().to_string()));
        }
        let duration = self.media.probe_duration(path).await?;
        self.video.set_video(path.to_path_buf(), duration)?;
        Ok(())
    }

    /// Runs a transcription for the working video to completion, driving the
    /// completion channel until the task settles.
    pub async fn transcribe(&mut self) -> Result<()> {
        *self.outcomes.transcription.lock() = None;
        self.transcription.request_transcription();
        loop {
            if let Some(reason) = self.outcomes.transcription.lock().take() {
                return Err(match reason {
                    TranscriptionFailure::NoVideo => JimakuError::NoVideo,
                    other => JimakuError::Engine(other.to_string()),
                });
            }
            match self.transcription.task_state() {
                TaskState::Queued | TaskState::Running => self.pump_completion().await?,
                TaskState::Completed => return Ok(()),
                TaskState::Idle | TaskState::Cancelled | TaskState::Failed => {
                    return Err(JimakuError::Engine(
                        "Transcription did not complete".to_string(),
                    ));
                }
            }
        }
    }

    pub async fn export_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let subtitles = self.subtitles.snapshot();
        srt::generate_srt(&subtitles, path).await
    }

    pub async fn export_ass<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let subtitles = self.subtitles.snapshot();
        let style = self.style.style();
        ass::generate_ass(&subtitles, &style, path).await
    }

    pub async fn import_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let imported = srt::import_srt(path).await?;
        self.subtitles.set_subtitles(imported);
        Ok(())
    }

    pub async fn import_ass<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let imported = ass::import_ass(path).await?;
        self.subtitles.set_subtitles(imported);
        Ok(())
    }

    /// Renders the current track and burns it into a new video file.
    pub async fn burn<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let video = self.require_video()?;
        let track = self.preview.render_now().await?;
        info!("Burning subtitles into {}", output_path.as_ref().display());
        self.media
            .burn_subtitles(&video, &track, output_path.as_ref())
            .await
    }

    /// Renders the current track and captures one subtitled frame.
    pub async fn snapshot_frame<P: AsRef<Path>>(&self, timestamp: f64, output_path: P) -> Result<()> {
        let video = self.require_video()?;
        let track = self.preview.render_now().await?;
        self.media
            .snapshot_frame(&video, &track, timestamp, output_path.as_ref())
            .await
    }

    pub async fn save_project_as(&self, path: &Path) -> Result<()> {
        *self.outcomes.project.lock() = None;
        self.project.save_as(path).await;
        self.project_outcome()
    }

    pub async fn save_project(&self) -> Result<()> {
        *self.outcomes.project.lock() = None;
        self.project.save().await;
        self.project_outcome()
    }

    pub async fn open_project(&self, path: &Path) -> Result<()> {
        *self.outcomes.project.lock() = None;
        self.project.open(path).await;
        self.project_outcome()
    }

    pub fn close_project(&self) {
        self.project.close();
    }

    fn require_video(&self) -> Result<PathBuf> {
        self.video.video_path().ok_or(JimakuError::NoVideo)
    }

    fn project_outcome(&self) -> Result<()> {
        match self.outcomes.project.lock().take() {
            Some(reason) => Err(JimakuError::Persistence(reason.to_string())),
            None => Ok(()),
        }
    }
}
