use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::ValidationError;
use crate::event::{AppEvent, EventBus};

/// The active video. Duration comes from the media tool probe, not from the
/// file itself.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub duration: f64,
}

/// Owns the answer to "what are we working on". Everything downstream keys
/// off its change notification.
#[derive(Clone)]
pub struct VideoManager {
    state: Arc<Mutex<Option<VideoInfo>>>,
    bus: EventBus,
}

impl VideoManager {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            bus,
        }
    }

    /// Records the video and notifies. The notification fires even when the
    /// path is unchanged: every import gesture has reload semantics, and
    /// downstream managers must discard stale task state on each one.
    pub fn set_video(&self, path: PathBuf, duration: f64) -> Result<(), ValidationError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ValidationError::InvalidDuration(duration));
        }

        let info = Arc::new(VideoInfo { path, duration });
        *self.state.lock() = Some(info.as_ref().clone());
        info!(
            "Video set to: {} ({:.2}s)",
            info.path.display(),
            info.duration
        );

        self.bus.publish(AppEvent::VideoChanged(info));
        Ok(())
    }

    pub fn current(&self) -> Option<VideoInfo> {
        self.state.lock().clone()
    }

    pub fn video_path(&self) -> Option<PathBuf> {
        self.state.lock().as_ref().map(|v| v.path.clone())
    }

    pub fn duration(&self) -> Option<f64> {
        self.state.lock().as_ref().map(|v| v.duration)
    }
}
