//! Subtitle data model and the SRT/ASS codecs built on top of it.

pub mod ass;
pub mod model;
pub mod segmenter;
pub mod srt;

pub use model::{Segment, Subtitles, Word};
