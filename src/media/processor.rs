use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaTool};
use crate::config::MediaConfig;
use crate::error::{JimakuError, Result};

/// Concrete media tool implementation (FFmpeg-based)
pub struct FfmpegTool {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegTool {
    /// Create a new ffmpeg-backed media tool
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    /// Extract audio from video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!(
            "Extracting audio from {} to {}",
            video_path.display(),
            audio_path.display()
        );

        let command = self
            .command_builder
            .extract_audio(video_path, audio_path)
            .timeout_secs(self.config.timeout_secs);
        command.execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    /// Burn a subtitle track into the video
    async fn burn_subtitles(
        &self,
        video_path: &Path,
        track_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        info!(
            "Burning subtitles from {} into {} -> {}",
            track_path.display(),
            video_path.display(),
            output_path.display()
        );

        let (workdir, track_filter) = filter_workdir(track_path)?;
        let command = self
            .command_builder
            .burn_subtitles(
                &std::path::absolute(video_path)?,
                &track_filter,
                &std::path::absolute(output_path)?,
                &self.config.burn_options,
            )
            .working_dir(&workdir)
            .timeout_secs(self.config.timeout_secs);
        command.execute().await?;

        info!("Subtitle burn completed successfully");
        Ok(())
    }

    /// Capture a single subtitled frame at the given timestamp
    async fn snapshot_frame(
        &self,
        video_path: &Path,
        track_path: &Path,
        timestamp: f64,
        output_path: &Path,
    ) -> Result<()> {
        info!(
            "Capturing frame at {}s from {} -> {}",
            timestamp,
            video_path.display(),
            output_path.display()
        );

        let (workdir, track_filter) = filter_workdir(track_path)?;
        let command = self
            .command_builder
            .snapshot_frame(
                &std::path::absolute(video_path)?,
                &track_filter,
                timestamp,
                &std::path::absolute(output_path)?,
            )
            .working_dir(&workdir)
            .timeout_secs(self.config.timeout_secs);
        command.execute().await?;

        info!("Frame snapshot completed");
        Ok(())
    }

    /// Duration of a media file in seconds
    async fn probe_duration(&self, video_path: &Path) -> Result<f64> {
        debug!("Probing duration of {}", video_path.display());

        let command = crate::media::MediaCommand::new(
            &self.config.probe_binary_path,
            "Duration probe",
        )
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .output(video_path)
        .timeout_secs(self.config.timeout_secs);

        let stdout = command.execute_capture().await?;
        parse_probe_duration(&stdout)
    }

    /// Get media tool version information
    async fn version_info(&self) -> Result<String> {
        debug!("Getting media tool version information");

        let stdout = self.command_builder.version_check().execute_capture().await?;
        // The first line carries the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }

    /// Check if the media tool is available
    fn check_availability(&self) -> Result<()> {
        let output = StdCommand::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| JimakuError::Media(format!("Media tool not found: {}", e)))?;

        if output.status.success() {
            info!("Media tool is available");
            Ok(())
        } else {
            Err(JimakuError::Media(
                "Media tool version check failed".to_string(),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: String,
}

fn parse_probe_duration(stdout: &str) -> Result<f64> {
    let probe: ProbeOutput = serde_json::from_str(stdout)
        .map_err(|e| JimakuError::Media(format!("Failed to parse duration probe output: {}", e)))?;
    probe
        .format
        .duration
        .parse::<f64>()
        .map_err(|e| JimakuError::Media(format!("Unusable probe duration: {}", e)))
}

/// The ass filter parses its own argument, so the track path is handed over
/// relative to the command's working directory with forward slashes.
fn filter_workdir(track_path: &Path) -> Result<(PathBuf, String)> {
    let track = std::path::absolute(track_path)?;
    let workdir = track
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let relative = pathdiff::diff_paths(&track, &workdir).unwrap_or_else(|| track.clone());
    Ok((workdir, relative.to_string_lossy().replace('\\', "/")))
}
