//! Jimaku - Subtitle Studio
//!
//! The orchestration core of a subtitle studio: typed notifications, a
//! word-timed subtitle model, whisper-cpp transcription, per-word styling,
//! preview rendering and project persistence, glued together over ffmpeg.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod jobs;
pub mod managers;
pub mod media;
pub mod preview;
pub mod setup;
pub mod studio;
pub mod style;
pub mod subtitles;
