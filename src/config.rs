use crate::error::{JimakuError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Defaults for fields added after the first config format shipped
fn default_probe_binary() -> String {
    "ffprobe".to_string()
}

fn default_preview_debounce_ms() -> u64 {
    300
}

fn default_track_file_name() -> String {
    "preview.ass".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub media: MediaConfig,
    pub storage: StorageConfig,
    pub editing: EditingConfig,
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which recognition engine implementation to run
    pub kind: EngineKind,
    /// Path to the engine binary (e.g., whisper-cli or whisper)
    pub binary_path: String,
    /// Model name (tiny, base, small, medium, large) or path to a model file
    pub model: String,
    /// Language hint passed to the engine; None lets the engine detect
    pub language: Option<String>,
    /// Upper bound for a single transcription run, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// whisper.cpp CLI with full JSON output
    WhisperCpp,
    /// OpenAI whisper Python CLI with word timestamps
    OpenAiWhisper,
    /// Scripted engine that replays fixed transcripts; development and tests
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    #[serde(default = "default_probe_binary")]
    pub probe_binary_path: String,
    /// Additional encoding options for subtitle burn-in
    /// Common options: ["-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"]
    pub burn_options: Vec<String>,
    /// Upper bound for a single codec tool invocation, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for models, presets, projects and temp files.
    /// None resolves to the per-user data directory, falling back to ./.jimaku
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditingConfig {
    /// Validation applied by merge_segments
    pub merge_policy: MergePolicy,
    /// Smallest duration a word may be squeezed to when resizing a segment,
    /// in seconds
    pub min_word_duration: f64,
    /// How raw transcripts are grouped into segments
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Any two segments may merge regardless of the gap between them
    Unrestricted,
    /// Segments must touch or overlap in time to merge
    AdjacentOrOverlapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub policy: SegmentationPolicy,
    /// Character budget per segment for the CharBudget policy
    pub max_chars: usize,
    /// A segment may also end right after a word ending in one of these
    pub break_chars: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationPolicy {
    /// One segment per engine segment, empty groups dropped
    EnginePassThrough,
    /// Regroup words under a character budget, breaking at punctuation
    CharBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Quiet window before the preview track is regenerated, in milliseconds
    #[serde(default = "default_preview_debounce_ms")]
    pub debounce_ms: u64,
    /// File name of the regenerated track inside the temp directory
    #[serde(default = "default_track_file_name")]
    pub track_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                kind: EngineKind::WhisperCpp,
                binary_path: "whisper-cli".to_string(),
                model: "base".to_string(),
                language: None,
                timeout_secs: 1800,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_binary_path: "ffprobe".to_string(),
                burn_options: vec![
                    // Example encoding options users can customize:
                    // "-preset".to_string(), "medium".to_string(),
                    // "-crf".to_string(), "23".to_string(),
                ],
                timeout_secs: 3600,
            },
            storage: StorageConfig { data_dir: None },
            editing: EditingConfig {
                merge_policy: MergePolicy::Unrestricted,
                min_word_duration: 0.05,
                segmentation: SegmentationConfig {
                    policy: SegmentationPolicy::EnginePassThrough,
                    max_chars: 10,
                    break_chars: ".,!?".to_string(),
                },
            },
            preview: PreviewConfig {
                debounce_ms: 300,
                track_file_name: "preview.ass".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JimakuError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| JimakuError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JimakuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| JimakuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.engine.model, "base");
        assert_eq!(back.editing.segmentation.max_chars, 10);
        assert_eq!(back.preview.debounce_ms, 300);
    }

    #[test]
    fn test_missing_newer_fields_fall_back() {
        // A config written before probe_binary_path and [preview] existed
        let text = r#"
[engine]
kind = "WhisperCpp"
binary_path = "whisper-cli"
model = "tiny"
timeout_secs = 600

[media]
binary_path = "ffmpeg"
burn_options = []
timeout_secs = 600

[storage]

[editing]
merge_policy = "Unrestricted"
min_word_duration = 0.05

[editing.segmentation]
policy = "EnginePassThrough"
max_chars = 10
break_chars = ".,!?"

[preview]
"#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.media.probe_binary_path, "ffprobe");
        assert_eq!(config.preview.track_file_name, "preview.ass");
    }
}
