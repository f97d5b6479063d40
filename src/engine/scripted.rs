/*!
 * Scripted engine for development and tests.
 *
 * Behaviors:
 * - `ScriptedEngine::speaking(...)` - succeeds with a fixed transcript
 * - `ScriptedEngine::failing(...)` - always fails with an engine error
 * - `.with_delay_ms(...)` - sleeps before answering (timeout and
 *   cancellation testing)
 */

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{RawSegment, RawTranscript, RecognitionEngine};
use crate::error::{JimakuError, Result};
use crate::subtitles::Word;

pub struct ScriptedEngine {
    transcript: RawTranscript,
    fail_with: Option<String>,
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::speaking(&[("Hello", 0.0, 0.5), ("world", 0.6, 1.0)])
    }
}

impl ScriptedEngine {
    /// One-segment transcript built from (text, start, end) triples.
    pub fn speaking(words: &[(&str, f64, f64)]) -> Self {
        let words: Vec<Word> = words
            .iter()
            .map(|(text, start, end)| Word::new(*text, *start, *end))
            .collect();
        let segment = RawSegment {
            text: words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            start: words.first().map_or(0.0, |w| w.start),
            end: words.last().map_or(0.0, |w| w.end),
            words,
        };
        Self::replaying(RawTranscript {
            language: Some("en".to_string()),
            segments: vec![segment],
        })
    }

    pub fn replaying(transcript: RawTranscript) -> Self {
        Self {
            transcript,
            fail_with: None,
            delay_ms: 0,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let mut engine = Self::default();
        engine.fail_with = Some(message.into());
        engine
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Shared counter of transcribe calls observed.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn transcribe<'a>(
        &self,
        _audio_path: &Path,
        _language: Option<&'a str>,
    ) -> Result<RawTranscript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        match &self.fail_with {
            Some(message) => Err(JimakuError::Engine(message.clone())),
            None => Ok(self.transcript.clone()),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
