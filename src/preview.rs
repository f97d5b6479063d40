//! Keeps a rendered ASS track on disk in sync with the live subtitles and
//! style for the player overlay and the burn/snapshot commands.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::warn;

use crate::config::PreviewConfig;
use crate::error::Result;
use crate::jobs::GenerationCounter;
use crate::style::Style;
use crate::subtitles::Subtitles;
use crate::subtitles::ass::generate_ass;

/// Edits arrive in bursts (drag retiming, spinner clicks), so a change only
/// schedules a render; the render runs once the configured quiet period has
/// passed without another change superseding it.
#[derive(Clone)]
pub struct PreviewTracker {
    state: Arc<Mutex<PreviewState>>,
    generation: GenerationCounter,
    track_path: PathBuf,
    debounce: Duration,
}

struct PreviewState {
    subtitles: Arc<Subtitles>,
    style: Arc<Style>,
}

impl PreviewTracker {
    pub fn new(config: &PreviewConfig, temp_dir: &Path) -> Self {
        Self {
            state: Arc::new(Mutex::new(PreviewState {
                subtitles: Arc::new(Subtitles::default()),
                style: Arc::new(Style::default()),
            })),
            generation: GenerationCounter::new(),
            track_path: temp_dir.join(&config.track_file_name),
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }

    pub fn track_path(&self) -> &Path {
        &self.track_path
    }

    pub fn on_subtitles_changed(&self, snapshot: Arc<Subtitles>) {
        self.state.lock().subtitles = snapshot;
        self.schedule();
    }

    pub fn on_style_changed(&self, snapshot: Arc<Style>) {
        self.state.lock().style = snapshot;
        self.schedule();
    }

    /// Renders immediately from the latest snapshots and returns the track
    /// path. Burn and snapshot go through here so they never read a track
    /// that a pending debounce hasn't written yet.
    pub async fn render_now(&self) -> Result<PathBuf> {
        self.generation.bump();
        self.render().await?;
        Ok(self.track_path.clone())
    }

    fn schedule(&self) {
        let generation = self.generation.bump();
        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(tracker.debounce).await;
            if !tracker.generation.is_current(generation) {
                return;
            }
            if let Err(e) = tracker.render().await {
                warn!("Preview track render failed: {}", e);
            }
        });
    }

    async fn render(&self) -> Result<()> {
        let (subtitles, style) = {
            let state = self.state.lock();
            (Arc::clone(&state.subtitles), Arc::clone(&state.style))
        };
        generate_ass(&subtitles, &style, &self.track_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::{Segment, Word};
    use tempfile::TempDir;

    fn config(debounce_ms: u64) -> PreviewConfig {
        PreviewConfig {
            debounce_ms,
            track_file_name: "preview.ass".to_string(),
        }
    }

    fn one_liner(text: &str) -> Arc<Subtitles> {
        Arc::new(Subtitles::new(vec![Segment::new(vec![Word::new(
            text, 0.0, 1.0,
        )])]))
    }

    #[tokio::test]
    async fn test_render_now_reflects_latest_snapshots() {
        let dir = TempDir::new().unwrap();
        let tracker = PreviewTracker::new(&config(10_000), dir.path());

        let mut style = Style::default();
        style.font = "Courier New".to_string();
        tracker.on_subtitles_changed(one_liner("rendered"));
        tracker.on_style_changed(Arc::new(style));

        let path = tracker.render_now().await.unwrap();
        assert_eq!(path, dir.path().join("preview.ass"));

        let track = std::fs::read_to_string(&path).unwrap();
        assert!(track.contains("Courier New"));
        assert!(track.contains("rendered"));
    }

    #[tokio::test]
    async fn test_burst_renders_once_with_the_final_state() {
        let dir = TempDir::new().unwrap();
        let tracker = PreviewTracker::new(&config(25), dir.path());

        // All three land before any debounce elapses; only the last
        // generation survives the wake-up check.
        tracker.on_subtitles_changed(one_liner("one"));
        tracker.on_subtitles_changed(one_liner("two"));
        tracker.on_subtitles_changed(one_liner("three"));

        let path = tracker.track_path().to_path_buf();
        for _ in 0..100 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let track = std::fs::read_to_string(&path).unwrap();
        assert!(track.contains("three"));
        assert!(!track.contains("one"));
    }

    #[tokio::test]
    async fn test_render_now_supersedes_a_pending_render() {
        let dir = TempDir::new().unwrap();
        let tracker = PreviewTracker::new(&config(50), dir.path());

        tracker.on_subtitles_changed(one_liner("pending"));
        let path = tracker.render_now().await.unwrap();

        // The scheduled render wakes after 50ms, sees itself superseded and
        // leaves the removed file alone.
        std::fs::remove_file(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
    }
}
