use thiserror::Error;

#[derive(Error, Debug)]
pub enum JimakuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Recognition engine error: {0}")]
    Engine(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Unsupported project schema version {found} (supported up to {supported})")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("Style preset not found: {0}")]
    PresetNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No video loaded")]
    NoVideo,
}

pub type Result<T> = std::result::Result<T, JimakuError>;

/// Synchronous editing failures. Mutations that fail validation return these
/// directly and leave the subtitle tree untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Index out of range: segment {segment}, word {word:?}")]
    IndexOutOfRange { segment: usize, word: Option<usize> },

    #[error("Invalid time range: {start}..{end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid split point {word} for segment of {len} words")]
    InvalidSplitPoint { word: usize, len: usize },

    #[error("Segments {first} and {second} are not adjacent or overlapping")]
    NotAdjacentOrOverlapping { first: usize, second: usize },

    #[error("Invalid video duration: {0}")]
    InvalidDuration(f64),
}

/// Why a transcription attempt failed. Carried by the failure notification so
/// subscribers can present a specific message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionFailure {
    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Recognition engine failed: {0}")]
    Engine(String),

    #[error("Recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Transcription timed out after {0}s")]
    Timeout(u64),

    #[error("No video loaded")]
    NoVideo,
}

/// Why a project save or load failed. Carried by the failure notification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectFailure {
    #[error("No video loaded, nothing to save")]
    NoVideo,

    #[error("No project path recorded, use save-as first")]
    NoPath,

    #[error("Archive unreadable: {0}")]
    Unreadable(String),

    #[error("Archive invalid: {0}")]
    Invalid(String),

    #[error("Unsupported schema version {found} (supported up to {supported})")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("Referenced video missing: {0}")]
    VideoMissing(String),

    #[error("Write failed: {0}")]
    Write(String),
}
