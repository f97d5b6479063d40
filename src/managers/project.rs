use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ProjectFailure;
use crate::event::{AppEvent, EventBus};
use crate::managers::style::StyleManager;
use crate::managers::subtitles::SubtitlesManager;
use crate::managers::video::VideoManager;
use crate::style::Style;
use crate::subtitles::Subtitles;

/// Current archive schema. Bump when the record layout changes shape.
pub const SCHEMA_VERSION: u32 = 1;

/// Conventional archive extension.
pub const ARCHIVE_EXTENSION: &str = "jmk";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub schema_version: u32,
    pub name: String,
    pub saved_at: DateTime<Utc>,
}

/// The video is stored by reference; archives stay small and the original
/// file remains the single source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub path: PathBuf,
    pub duration: f64,
}

/// The whole persisted project: one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub meta: ProjectMeta,
    pub video: VideoRecord,
    pub subtitles: Subtitles,
    pub style: Style,
}

/// Reads and parses an archive without touching any live state.
pub async fn read_record(path: &Path) -> std::result::Result<ProjectRecord, ProjectFailure> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProjectFailure::Unreadable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ProjectFailure::Invalid(e.to_string()))
}

/// A fully validated record, ready to commit. Construction performs every
/// check; `commit` cannot fail, so a load either leaves the live managers
/// byte-for-byte untouched or replaces them completely.
pub struct ProjectStage {
    record: ProjectRecord,
}

impl ProjectStage {
    pub fn validate(record: ProjectRecord) -> std::result::Result<Self, ProjectFailure> {
        if record.meta.schema_version > SCHEMA_VERSION {
            return Err(ProjectFailure::SchemaVersion {
                found: record.meta.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        if !record.video.duration.is_finite() || record.video.duration < 0.0 {
            return Err(ProjectFailure::Invalid(format!(
                "video duration {} out of range",
                record.video.duration
            )));
        }
        if let Some(reason) = record.subtitles.invariant_violation() {
            return Err(ProjectFailure::Invalid(reason));
        }
        if !record.video.path.exists() {
            return Err(ProjectFailure::VideoMissing(
                record.video.path.display().to_string(),
            ));
        }
        Ok(Self { record })
    }

    /// Commits in fixed order: video first (downstream reset keys off it),
    /// then style, then subtitles.
    pub fn commit(
        self,
        video: &VideoManager,
        style: &StyleManager,
        subtitles: &SubtitlesManager,
    ) -> ProjectMeta {
        let ProjectRecord {
            meta,
            video: video_record,
            subtitles: tree,
            style: style_record,
        } = self.record;

        // The duration passed validation above; set_video cannot reject it.
        let _ = video.set_video(video_record.path, video_record.duration);
        style.restore_from_record(style_record);
        subtitles.set_subtitles(tree);
        meta
    }
}

/// Saves and restores the working state as a single JSON archive, sequencing
/// the other managers and aggregating their failures. Holds only the current
/// archive path itself; everything else is queried live.
#[derive(Clone)]
pub struct ProjectManager {
    current_path: Arc<Mutex<Option<PathBuf>>>,
    bus: EventBus,
    video: VideoManager,
    style: StyleManager,
    subtitles: SubtitlesManager,
}

impl ProjectManager {
    pub fn new(
        bus: EventBus,
        video: VideoManager,
        style: StyleManager,
        subtitles: SubtitlesManager,
    ) -> Self {
        Self {
            current_path: Arc::new(Mutex::new(None)),
            bus,
            video,
            style,
            subtitles,
        }
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_path.lock().clone()
    }

    /// Saves to the recorded archive path.
    pub async fn save(&self) {
        let Some(path) = self.current_path() else {
            self.bus
                .publish(AppEvent::ProjectSaveFailed(ProjectFailure::NoPath));
            return;
        };
        self.save_as(&path).await;
    }

    /// Saves the live state to the given path. The write goes to a temporary
    /// file in the destination directory first and replaces the target only
    /// once complete, so a failed save leaves any previous archive intact.
    pub async fn save_as(&self, path: &Path) {
        match self.write_archive(path).await {
            Ok(()) => {
                *self.current_path.lock() = Some(path.to_path_buf());
                info!("Project saved to {}", path.display());
                self.bus.publish(AppEvent::ProjectSaved(path.to_path_buf()));
            }
            Err(failure) => {
                warn!("Project save to {} failed: {}", path.display(), failure);
                self.bus.publish(AppEvent::ProjectSaveFailed(failure));
            }
        }
    }

    /// Loads an archive. Everything is parsed and validated into a stage
    /// first; the live managers are only touched after the stage holds a
    /// complete, valid project.
    pub async fn open(&self, path: &Path) {
        let staged = match read_record(path).await.and_then(ProjectStage::validate) {
            Ok(staged) => staged,
            Err(failure) => {
                warn!("Project load from {} failed: {}", path.display(), failure);
                self.bus.publish(AppEvent::ProjectLoadFailed(failure));
                return;
            }
        };

        let meta = staged.commit(&self.video, &self.style, &self.subtitles);
        *self.current_path.lock() = Some(path.to_path_buf());
        info!("Project '{}' opened from {}", meta.name, path.display());
        self.bus.publish(AppEvent::ProjectOpened(meta));
    }

    /// Forgets the recorded archive path. Manager state stays as it is; the
    /// caller decides what a fresh start looks like.
    pub fn close(&self) {
        let taken = self.current_path.lock().take();
        let Some(path) = taken else {
            return;
        };
        info!("Project {} closed", path.display());
        self.bus.publish(AppEvent::ProjectClosed);
    }

    async fn write_archive(&self, path: &Path) -> std::result::Result<(), ProjectFailure> {
        let Some(video) = self.video.current() else {
            return Err(ProjectFailure::NoVideo);
        };

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        let record = ProjectRecord {
            meta: ProjectMeta {
                schema_version: SCHEMA_VERSION,
                name,
                saved_at: Utc::now(),
            },
            video: VideoRecord {
                path: video.path,
                duration: video.duration,
            },
            subtitles: self.subtitles.snapshot(),
            style: self.style.style(),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| ProjectFailure::Write(e.to_string()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ProjectFailure::Write(e.to_string()))?;
        staged
            .write_all(json.as_bytes())
            .map_err(|e| ProjectFailure::Write(e.to_string()))?;
        staged
            .persist(path)
            .map_err(|e| ProjectFailure::Write(e.to_string()))?;
        Ok(())
    }
}
