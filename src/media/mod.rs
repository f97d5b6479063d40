// Media tool layer over the ffmpeg/ffprobe pair:
// - Commands: argument builders and process execution
// - Processor: the ffmpeg-backed implementation

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media tool operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Extract mono 16 kHz PCM audio for the recognition engine
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Burn a subtitle track into the video
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        track_path: &Path,
        output_path: &Path,
    ) -> Result<()>;

    /// Capture a single subtitled frame at the given timestamp
    async fn snapshot_frame(
        &self,
        video_path: &Path,
        track_path: &Path,
        timestamp: f64,
        output_path: &Path,
    ) -> Result<()>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, video_path: &Path) -> Result<f64>;

    /// Get media tool version information
    async fn version_info(&self) -> Result<String>;

    /// Check if the media tool is available
    fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media tool instances
pub struct MediaToolFactory;

impl MediaToolFactory {
    /// Create the default media tool implementation (FFmpeg-based)
    pub fn create_tool(config: MediaConfig) -> Arc<dyn MediaTool> {
        Arc::new(processor::FfmpegTool::new(config))
    }
}
