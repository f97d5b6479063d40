// whisper.cpp CLI engine: runs the binary with full JSON output and maps
// token offsets to word timing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use super::{RawSegment, RawTranscript, RecognitionEngine};
use crate::config::EngineConfig;
use crate::error::{JimakuError, Result};
use crate::subtitles::Word;
use crate::subtitles::segmenter::interpolate_words;

/// whisper.cpp full JSON output format (--output-json-full)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: WhisperCppResult,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
    #[serde(default)]
    pub tokens: Vec<WhisperCppToken>,
}

/// Millisecond offsets from the start of the audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppToken {
    pub text: String,
    pub offsets: WhisperCppOffsets,
    pub p: Option<f64>,
}

impl WhisperCppOffsets {
    fn start_secs(&self) -> f64 {
        self.from as f64 / 1000.0
    }

    fn end_secs(&self) -> f64 {
        self.to as f64 / 1000.0
    }
}

fn to_raw_transcript(output: WhisperCppOutput) -> RawTranscript {
    let segments = output
        .transcription
        .into_iter()
        .map(|seg| {
            let start = seg.offsets.start_secs();
            let end = seg.offsets.end_secs();
            let mut words = words_from_tokens(&seg.tokens);
            if words.is_empty() {
                // Token data absent or all control tokens
                words = interpolate_words(seg.text.trim(), start, end);
            }
            RawSegment {
                text: seg.text.trim().to_string(),
                start,
                end,
                words,
            }
        })
        .collect();

    RawTranscript {
        language: output.result.language,
        segments,
    }
}

/// Whisper tokens are sub-word pieces: a piece starting with a space opens a
/// new word, anything else extends the previous one. Control tokens such as
/// [_BEG_] carry no speech.
fn words_from_tokens(tokens: &[WhisperCppToken]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    for token in tokens {
        if token.text.starts_with("[_") {
            continue;
        }
        let starts_new = token.text.starts_with(' ') || words.is_empty();
        let piece = token.text.trim();
        if piece.is_empty() {
            continue;
        }
        let start = token.offsets.start_secs();
        let end = token.offsets.end_secs();
        if starts_new {
            words.push(Word::new(piece, start, end));
        } else if let Some(last) = words.last_mut() {
            last.text.push_str(piece);
            if end > last.end {
                last.end = end;
            }
        }
    }
    words
}

/// whisper.cpp implementation driving the whisper-cli binary.
pub struct WhisperCppEngine {
    config: EngineConfig,
    model_path: PathBuf,
}

impl WhisperCppEngine {
    pub fn new(config: EngineConfig, model_path: PathBuf) -> Self {
        Self { config, model_path }
    }

    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| {
                JimakuError::Engine(format!("{} not found: {}", self.config.binary_path, e))
            })?;

        if output.status.success() {
            info!("whisper.cpp binary is available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(JimakuError::Engine(format!(
                "{} not usable: {}",
                self.config.binary_path, stderr
            )))
        }
    }
}

#[async_trait]
impl RecognitionEngine for WhisperCppEngine {
    async fn transcribe<'a>(
        &self,
        audio_path: &Path,
        language: Option<&'a str>,
    ) -> Result<RawTranscript> {
        debug!("Transcribing {} with whisper.cpp", audio_path.display());

        let temp_dir = tempfile::tempdir()
            .map_err(|e| JimakuError::Engine(format!("Failed to create temp directory: {}", e)))?;
        let output_prefix = temp_dir.path().join("transcript");

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("--output-json-full")
            .arg("--output-file")
            .arg(&output_prefix);

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }

        // A timed-out transcription drops this future; the child dies with it
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            JimakuError::Engine(format!(
                "Failed to execute {}: {}",
                self.config.binary_path, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Engine(format!(
                "whisper.cpp failed: {}",
                stderr
            )));
        }

        let json_file = output_prefix.with_extension("json");
        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| JimakuError::Engine(format!("Failed to read engine output: {}", e)))?;

        let parsed: WhisperCppOutput = serde_json::from_str(&json_content)
            .map_err(|e| JimakuError::Engine(format!("Failed to parse engine JSON: {}", e)))?;

        Ok(to_raw_transcript(parsed))
    }

    fn describe(&self) -> String {
        format!("whisper.cpp ({})", self.model_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, from: i64, to: i64) -> WhisperCppToken {
        WhisperCppToken {
            text: text.to_string(),
            offsets: WhisperCppOffsets { from, to },
            p: Some(0.9),
        }
    }

    #[test]
    fn test_tokens_merge_into_words() {
        let tokens = vec![
            token("[_BEG_]", 0, 0),
            token(" Hel", 0, 200),
            token("lo", 200, 350),
            token(" world", 400, 900),
            token(".", 900, 950),
        ];
        let words = words_from_tokens(&tokens);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Hello");
        assert_eq!(words[0].start, 0.0);
        assert_eq!(words[0].end, 0.35);
        assert_eq!(words[1].text, "world.");
        assert_eq!(words[1].end, 0.95);
    }

    #[test]
    fn test_full_json_maps_to_raw_transcript() {
        let json = r#"{
            "result": { "language": "en" },
            "transcription": [
                {
                    "timestamps": { "from": "00:00:00,000", "to": "00:00:01,000" },
                    "offsets": { "from": 0, "to": 1000 },
                    "text": " Hello world",
                    "tokens": [
                        { "text": " Hello", "offsets": { "from": 0, "to": 500 }, "p": 0.98 },
                        { "text": " world", "offsets": { "from": 600, "to": 1000 }, "p": 0.97 }
                    ]
                }
            ]
        }"#;
        let parsed: WhisperCppOutput = serde_json::from_str(json).unwrap();
        let raw = to_raw_transcript(parsed);
        assert_eq!(raw.language.as_deref(), Some("en"));
        assert_eq!(raw.segments.len(), 1);
        assert_eq!(raw.segments[0].text, "Hello world");
        assert_eq!(raw.segments[0].words[1].start, 0.6);
    }

    #[test]
    fn test_segment_without_tokens_falls_back_to_interpolation() {
        let json = r#"{
            "result": { "language": null },
            "transcription": [
                {
                    "offsets": { "from": 1000, "to": 3000 },
                    "text": " two words"
                }
            ]
        }"#;
        let parsed: WhisperCppOutput = serde_json::from_str(json).unwrap();
        let raw = to_raw_transcript(parsed);
        let words = &raw.segments[0].words;
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].start, 1.0);
        assert_eq!(words[0].end, 2.0);
        assert_eq!(words[1].end, 3.0);
    }
}
