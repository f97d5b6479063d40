// Stateful managers owning the domain data:
// - Video: active video path and duration
// - Transcription: resident engine and the cancellable transcription task
// - Subtitles: the live subtitle tree and its editing surface
// - Style: active style and named presets
// - Project: archive save/load across the other four
//
// Managers are cheap cloneable handles over shared state. They mutate under
// their own lock, take a snapshot, release the lock, and only then publish.
// Cross-manager reactions are wired over the bus at composition time; no
// manager reaches into another's state.

pub mod project;
pub mod style;
pub mod subtitles;
pub mod transcription;
pub mod video;

pub use project::ProjectManager;
pub use style::StyleManager;
pub use subtitles::SubtitlesManager;
pub use transcription::{Completion, TranscriptionManager};
pub use video::VideoManager;
