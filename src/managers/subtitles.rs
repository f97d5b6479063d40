use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EditingConfig;
use crate::engine::RawTranscript;
use crate::error::ValidationError;
use crate::event::{AppEvent, EventBus};
use crate::subtitles::segmenter::group_transcript;
use crate::subtitles::{Subtitles, Word};

/// Owns the live subtitle tree. Every mutation goes through the editing
/// surface here: validate, mutate under the lock, snapshot, release, publish.
/// Failed validations leave the tree untouched and publish nothing.
#[derive(Clone)]
pub struct SubtitlesManager {
    state: Arc<Mutex<Subtitles>>,
    config: EditingConfig,
    bus: EventBus,
}

impl SubtitlesManager {
    pub fn new(bus: EventBus, config: EditingConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(Subtitles::default())),
            config,
            bus,
        }
    }

    /// Deep copy of the current tree. Callers never see later mutation.
    pub fn snapshot(&self) -> Subtitles {
        self.state.lock().clone()
    }

    /// Wholesale replacement, used by project load and imports.
    pub fn set_subtitles(&self, subtitles: Subtitles) {
        info!("Subtitles replaced ({} segments)", subtitles.segments.len());
        let snapshot = {
            let mut state = self.state.lock();
            *state = subtitles;
            state.normalize();
            Arc::new(state.clone())
        };
        self.bus.publish(AppEvent::SubtitlesChanged(snapshot));
    }

    /// Rebuilds the tree from a recognition result using the configured
    /// grouping policy.
    pub fn apply_transcript(&self, raw: &RawTranscript) {
        let subtitles = group_transcript(raw, &self.config.segmentation);
        info!(
            "Applying transcript: {} raw segments -> {} segments",
            raw.segments.len(),
            subtitles.segments.len()
        );
        self.set_subtitles(subtitles);
    }

    /// Resets to an empty tree. Wired to the video change notification: a new
    /// import always starts from nothing.
    pub fn clear(&self) {
        debug!("Clearing subtitles for new video");
        self.set_subtitles(Subtitles::default());
    }

    pub fn edit_word_text(
        &self,
        segment: usize,
        word: usize,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.edit_word_text(segment, word, text))
    }

    pub fn retime_word(
        &self,
        segment: usize,
        word: usize,
        start: f64,
        end: f64,
    ) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.retime_word(segment, word, start, end))
    }

    pub fn merge_segments(&self, first: usize, second: usize) -> Result<(), ValidationError> {
        let policy = self.config.merge_policy;
        self.mutate(|tree| tree.merge_segments(first, second, policy))
    }

    pub fn split_segment(&self, segment: usize, at_word: usize) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.split_segment(segment, at_word))
    }

    pub fn delete_word(&self, segment: usize, word: usize) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.delete_word(segment, word))
    }

    pub fn delete_segments(&self, indices: &[usize]) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.delete_segments(indices))
    }

    pub fn add_word(&self, segment: usize, word: Word) -> Result<(), ValidationError> {
        self.mutate(|tree| tree.add_word(segment, word))
    }

    pub fn resize_segment(
        &self,
        segment: usize,
        new_start: f64,
        new_end: f64,
    ) -> Result<(), ValidationError> {
        let min_word_duration = self.config.min_word_duration;
        self.mutate(|tree| tree.resize_segment(segment, new_start, new_end, min_word_duration))
    }

    /// One successful mutation, one notification. The snapshot is taken while
    /// the lock is held; the publish happens after it is released so handlers
    /// can call back into this manager.
    fn mutate<F>(&self, op: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut Subtitles) -> Result<(), ValidationError>,
    {
        let snapshot = {
            let mut state = self.state.lock();
            op(&mut state)?;
            Arc::new(state.clone())
        };
        self.bus.publish(AppEvent::SubtitlesChanged(snapshot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MergePolicy, SegmentationConfig, SegmentationPolicy};
    use crate::engine::RawSegment;
    use crate::event::EventKind;
    use crate::subtitles::Segment;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn editing_config() -> EditingConfig {
        EditingConfig {
            merge_policy: MergePolicy::Unrestricted,
            min_word_duration: 0.05,
            segmentation: SegmentationConfig {
                policy: SegmentationPolicy::EnginePassThrough,
                max_chars: 10,
                break_chars: ".,!?".to_string(),
            },
        }
    }

    fn manager_with_track() -> (SubtitlesManager, EventBus, Arc<AtomicUsize>) {
        let bus = EventBus::new();
        let manager = SubtitlesManager::new(bus.clone(), editing_config());
        manager.set_subtitles(Subtitles::new(vec![
            Segment::new(vec![
                Word::new("Hello", 0.0, 0.5),
                Word::new("world", 0.6, 1.0),
            ]),
            Segment::new(vec![Word::new("Test", 1.5, 2.0)]),
        ]));

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            bus.subscribe(EventKind::SubtitlesChanged, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        (manager, bus, count)
    }

    #[test]
    fn test_each_successful_mutation_notifies_exactly_once() {
        let (manager, _bus, count) = manager_with_track();

        manager.edit_word_text(0, 0, "Goodbye").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        manager.retime_word(0, 1, 0.7, 1.2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        manager.split_segment(0, 1).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_mutations_neither_change_nor_notify() {
        let (manager, _bus, count) = manager_with_track();
        let before = manager.snapshot();

        assert!(manager.edit_word_text(7, 0, "x").is_err());
        assert!(manager.retime_word(0, 0, 2.0, 1.0).is_err());
        assert!(manager.split_segment(0, 0).is_err());
        assert!(manager.delete_word(0, 9).is_err());

        assert_eq!(manager.snapshot(), before);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_edits() {
        let (manager, _bus, _count) = manager_with_track();

        let before = manager.snapshot();
        manager.edit_word_text(0, 0, "changed").unwrap();

        assert_eq!(before.segments[0].words[0].text, "Hello");
        assert_eq!(manager.snapshot().segments[0].words[0].text, "changed");
    }

    #[test]
    fn test_event_snapshot_does_not_mutate_after_publish() {
        let bus = EventBus::new();
        let manager = SubtitlesManager::new(bus.clone(), editing_config());

        let seen: Arc<Mutex<Vec<Arc<Subtitles>>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            bus.subscribe(EventKind::SubtitlesChanged, move |event| {
                if let AppEvent::SubtitlesChanged(snapshot) = event {
                    seen.lock().push(Arc::clone(snapshot));
                }
            });
        }

        manager.set_subtitles(Subtitles::new(vec![Segment::new(vec![Word::new(
            "one", 0.0, 1.0,
        )])]));
        manager.edit_word_text(0, 0, "two").unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0].segments[0].words[0].text, "one");
        assert_eq!(seen[1].segments[0].words[0].text, "two");
    }

    #[test]
    fn test_apply_transcript_groups_by_engine_segments() {
        let bus = EventBus::new();
        let manager = SubtitlesManager::new(bus, editing_config());

        let raw = RawTranscript {
            language: Some("en".to_string()),
            segments: vec![
                RawSegment {
                    text: "Hello world".to_string(),
                    start: 0.0,
                    end: 1.0,
                    words: vec![
                        Word::new("Hello", 0.0, 0.5),
                        Word::new("world", 0.6, 1.0),
                    ],
                },
                RawSegment {
                    text: String::new(),
                    start: 1.0,
                    end: 1.0,
                    words: vec![],
                },
            ],
        };
        manager.apply_transcript(&raw);

        let tree = manager.snapshot();
        assert_eq!(tree.segments.len(), 1);
        assert_eq!(tree.segments[0].text(), "Hello world");
    }

    #[test]
    fn test_clear_leaves_an_empty_tree_and_notifies() {
        let (manager, _bus, count) = manager_with_track();
        manager.clear();
        assert!(manager.snapshot().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_policy_comes_from_config() {
        let bus = EventBus::new();
        let mut config = editing_config();
        config.merge_policy = MergePolicy::AdjacentOrOverlapping;
        let manager = SubtitlesManager::new(bus, config);
        manager.set_subtitles(Subtitles::new(vec![
            Segment::new(vec![Word::new("far", 0.0, 1.0)]),
            Segment::new(vec![Word::new("apart", 5.0, 6.0)]),
        ]));

        assert!(matches!(
            manager.merge_segments(0, 1),
            Err(ValidationError::NotAdjacentOrOverlapping { .. })
        ));
    }
}
