// OpenAI Whisper Python CLI engine. Supports word-level timestamps through
// --word_timestamps True.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{RawSegment, RawTranscript, RecognitionEngine};
use crate::config::EngineConfig;
use crate::error::{JimakuError, Result};
use crate::subtitles::Word;
use crate::subtitles::segmenter::interpolate_words;

/// OpenAI Whisper JSON output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiWhisperOutput {
    pub text: String,
    pub segments: Vec<OpenAiWhisperSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiWhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<OpenAiWhisperWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiWhisperWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub probability: Option<f64>,
}

fn to_raw_transcript(output: OpenAiWhisperOutput) -> RawTranscript {
    let segments = output
        .segments
        .into_iter()
        .map(|seg| {
            let words: Vec<Word> = if seg.words.is_empty() {
                // Word timestamps disabled or unavailable for this segment
                interpolate_words(seg.text.trim(), seg.start, seg.end)
            } else {
                seg.words
                    .iter()
                    .map(|w| Word::new(w.word.trim(), w.start, w.end))
                    .collect()
            };
            RawSegment {
                text: seg.text.trim().to_string(),
                start: seg.start,
                end: seg.end,
                words,
            }
        })
        .collect();

    RawTranscript {
        language: output.language,
        segments,
    }
}

/// OpenAI Whisper implementation driving the `whisper` command-line tool.
pub struct OpenAiWhisperEngine {
    config: EngineConfig,
}

impl OpenAiWhisperEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| {
                JimakuError::Engine(format!(
                    "{} command not found: {}",
                    self.config.binary_path, e
                ))
            })?;

        if output.status.success() {
            info!("OpenAI Whisper command-line tool is available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(JimakuError::Engine(format!(
                "OpenAI Whisper not available. Install with: pip install openai-whisper\nError: {}",
                stderr
            )))
        }
    }
}

#[async_trait]
impl RecognitionEngine for OpenAiWhisperEngine {
    async fn transcribe<'a>(
        &self,
        audio_path: &Path,
        language: Option<&'a str>,
    ) -> Result<RawTranscript> {
        debug!(
            "Executing OpenAI Whisper transcription with model: {}",
            self.config.model
        );

        let temp_dir = tempfile::tempdir()
            .map_err(|e| JimakuError::Engine(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--word_timestamps")
            .arg("True");

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }

        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            JimakuError::Engine(format!(
                "Failed to execute {}: {}",
                self.config.binary_path, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Engine(format!("Whisper failed: {}", stderr)));
        }

        // Whisper writes {stem}.json into the output directory
        let audio_filename = audio_path
            .file_stem()
            .ok_or_else(|| JimakuError::Engine("Invalid audio filename".to_string()))?;
        let json_file = output_dir.join(format!("{}.json", audio_filename.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| JimakuError::Engine(format!("Failed to read engine output: {}", e)))?;

        let parsed: OpenAiWhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| JimakuError::Engine(format!("Failed to parse engine JSON: {}", e)))?;

        Ok(to_raw_transcript(parsed))
    }

    fn describe(&self) -> String {
        format!("OpenAI Whisper ({})", self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_timestamps_map_to_words() {
        let json = r#"{
            "text": " Hello world",
            "language": "en",
            "segments": [
                {
                    "id": 0,
                    "start": 0.0,
                    "end": 1.0,
                    "text": " Hello world",
                    "words": [
                        { "word": " Hello", "start": 0.0, "end": 0.5, "probability": 0.99 },
                        { "word": " world", "start": 0.6, "end": 1.0, "probability": 0.98 }
                    ]
                }
            ]
        }"#;
        let parsed: OpenAiWhisperOutput = serde_json::from_str(json).unwrap();
        let raw = to_raw_transcript(parsed);
        assert_eq!(raw.segments[0].words.len(), 2);
        assert_eq!(raw.segments[0].words[0].text, "Hello");
        assert_eq!(raw.segments[0].words[1].start, 0.6);
    }

    #[test]
    fn test_missing_word_array_interpolates() {
        let json = r#"{
            "text": " no words here",
            "language": null,
            "segments": [
                { "start": 0.0, "end": 3.0, "text": " no words here" }
            ]
        }"#;
        let parsed: OpenAiWhisperOutput = serde_json::from_str(json).unwrap();
        let raw = to_raw_transcript(parsed);
        assert_eq!(raw.segments[0].words.len(), 3);
        assert_eq!(raw.segments[0].words[2].end, 3.0);
    }
}
