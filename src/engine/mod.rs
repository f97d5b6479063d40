// Recognition engine implementations behind a factory:
// - WhisperCpp: whisper.cpp CLI with full JSON output (token-level timing)
// - OpenAiWhisper: OpenAI Whisper Python CLI with word timestamps
// - Scripted: replays fixed transcripts for development and tests
//
// To add a new engine:
// 1. Create service-specific data structures for parsing its output
// 2. Map them to RawTranscript
// 3. Add the service to EngineKind and the factory match

pub mod openai;
pub mod scripted;
pub mod whisper_cpp;

use crate::config::{EngineConfig, EngineKind};
use crate::error::Result;
use crate::subtitles::Word;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Engine-agnostic transcription result: engine-chosen segment boundaries
/// with word-level timing inside each segment. Unlike the committed subtitle
/// tree, raw segments may be empty or unordered; grouping policies clean
/// that up.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTranscript {
    pub language: Option<String>,
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub words: Vec<Word>,
}

impl RawTranscript {
    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}

/// Speech-to-text boundary. Implementations wrap external tools; they hold no
/// mutable state and may be shared across tasks behind an EngineSlot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Transcribe an audio file into word-timed segments.
    async fn transcribe<'a>(
        &self,
        audio_path: &Path,
        language: Option<&'a str>,
    ) -> Result<RawTranscript>;

    /// Short human-readable identification for logs.
    fn describe(&self) -> String;
}

/// Serializes access to the resident engine: one transcription at a time.
pub struct EngineSlot {
    gate: tokio::sync::Mutex<()>,
    engine: Arc<dyn RecognitionEngine>,
}

impl EngineSlot {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            engine,
        }
    }

    pub async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<RawTranscript> {
        let _slot = self.gate.lock().await;
        self.engine.transcribe(audio_path, language).await
    }

    pub fn describe(&self) -> String {
        self.engine.describe()
    }
}

/// Factory for loading engine instances. Loading verifies the external tool
/// and resolves the model, so it can take a while and runs as a background
/// task at startup.
pub struct EngineFactory;

impl EngineFactory {
    pub async fn load(config: &EngineConfig, models_dir: &Path) -> Result<Arc<dyn RecognitionEngine>> {
        match config.kind {
            EngineKind::WhisperCpp => {
                let model_path = crate::setup::resolve_model(models_dir, &config.model).await?;
                let engine = whisper_cpp::WhisperCppEngine::new(config.clone(), model_path);
                engine.check_availability().await?;
                Ok(Arc::new(engine))
            }
            EngineKind::OpenAiWhisper => {
                let engine = openai::OpenAiWhisperEngine::new(config.clone());
                engine.check_availability().await?;
                Ok(Arc::new(engine))
            }
            EngineKind::Mock => Ok(Arc::new(scripted::ScriptedEngine::default())),
        }
    }
}
