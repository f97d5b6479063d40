use crate::config::MergePolicy;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Two spans whose gap is below this are considered touching.
const ADJACENCY_EPSILON: f64 = 1e-6;

/// Smallest addressable subtitle unit, timed in seconds from video start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Display group of words. Start and end are derived from the words, never
/// stored; a segment with zero words is invalid and never survives a
/// committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub words: Vec<Word>,
}

impl Segment {
    pub fn new(words: Vec<Word>) -> Self {
        let mut segment = Self { words };
        segment.sort_words();
        segment
    }

    /// Minimum start among the words, 0.0 for the (transient) empty segment.
    pub fn start(&self) -> f64 {
        self.words.iter().map(|w| w.start).reduce(f64::min).unwrap_or(0.0)
    }

    /// Maximum end among the words, 0.0 for the (transient) empty segment.
    pub fn end(&self) -> f64 {
        self.words.iter().map(|w| w.end).reduce(f64::max).unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn sort_words(&mut self) {
        self.words
            .sort_by(|a, b| a.start.total_cmp(&b.start).then_with(|| a.end.total_cmp(&b.end)));
    }
}

/// The whole track: segments kept ordered by (start, end). All mutations
/// re-establish ordering and drop emptied segments before returning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subtitles {
    pub segments: Vec<Segment>,
}

impl Subtitles {
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut subtitles = Self { segments };
        subtitles.normalize();
        subtitles
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Drops empty segments, sorts words within each segment and segments by
    /// (start, end).
    pub fn normalize(&mut self) {
        self.segments.retain(|s| !s.is_empty());
        for segment in &mut self.segments {
            segment.sort_words();
        }
        self.segments.sort_by(|a, b| {
            a.start()
                .total_cmp(&b.start())
                .then_with(|| a.end().total_cmp(&b.end()))
        });
    }

    /// Soundness check for trees that arrive from outside the editing surface
    /// (project archives). Returns a human-readable reason on the first
    /// violation.
    pub fn invariant_violation(&self) -> Option<String> {
        for (si, segment) in self.segments.iter().enumerate() {
            if segment.is_empty() {
                return Some(format!("segment {} has no words", si));
            }
            for (wi, word) in segment.words.iter().enumerate() {
                if !word.start.is_finite() || !word.end.is_finite() {
                    return Some(format!("segment {} word {} has a non-finite time", si, wi));
                }
                if word.start < 0.0 || word.end < word.start {
                    return Some(format!(
                        "segment {} word {} has invalid range {}..{}",
                        si, wi, word.start, word.end
                    ));
                }
            }
        }
        None
    }

    /// Replaces a word's text in place. Text edits never disturb timing or
    /// ordering.
    pub fn edit_word_text(
        &mut self,
        segment: usize,
        word: usize,
        text: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.word_mut(segment, word)?.text = text.into();
        Ok(())
    }

    /// Moves a word's span. The owning segment's derived bounds follow, and
    /// ordering is re-established.
    pub fn retime_word(
        &mut self,
        segment: usize,
        word: usize,
        start: f64,
        end: f64,
    ) -> Result<(), ValidationError> {
        validate_range(start, end)?;
        let w = self.word_mut(segment, word)?;
        w.start = start;
        w.end = end;
        self.normalize();
        Ok(())
    }

    /// Merges two segments into one; words are concatenated in time order,
    /// not index order. Under MergePolicy::AdjacentOrOverlapping the spans
    /// must touch or overlap. Merging a segment with itself is a no-op.
    pub fn merge_segments(
        &mut self,
        first: usize,
        second: usize,
        policy: MergePolicy,
    ) -> Result<(), ValidationError> {
        self.check_segment(first)?;
        self.check_segment(second)?;
        if first == second {
            return Ok(());
        }

        if policy == MergePolicy::AdjacentOrOverlapping {
            let (a, b) = (&self.segments[first], &self.segments[second]);
            let (lo, hi) = if a.start() <= b.start() { (a, b) } else { (b, a) };
            if hi.start() - lo.end() > ADJACENCY_EPSILON {
                return Err(ValidationError::NotAdjacentOrOverlapping { first, second });
            }
        }

        let donor = self.segments.remove(first.max(second));
        let target = first.min(second);
        self.segments[target].words.extend(donor.words);
        self.segments[target].sort_words();
        self.normalize();
        Ok(())
    }

    /// Splits a segment before the given word index. Both halves must end up
    /// non-empty, so index 0 and the word count are invalid split points.
    pub fn split_segment(&mut self, segment: usize, at_word: usize) -> Result<(), ValidationError> {
        self.check_segment(segment)?;
        let len = self.segments[segment].words.len();
        if at_word == 0 || at_word >= len {
            return Err(ValidationError::InvalidSplitPoint { word: at_word, len });
        }

        let tail = self.segments[segment].words.split_off(at_word);
        self.segments.insert(segment + 1, Segment::new(tail));
        self.normalize();
        Ok(())
    }

    /// Removes a word; a segment emptied by the removal is removed with it.
    pub fn delete_word(&mut self, segment: usize, word: usize) -> Result<(), ValidationError> {
        self.check_word(segment, word)?;
        self.segments[segment].words.remove(word);
        self.normalize();
        Ok(())
    }

    /// Removes whole segments. All indices are validated before anything is
    /// touched, then removed from the highest down so the lower indices stay
    /// valid.
    pub fn delete_segments(&mut self, indices: &[usize]) -> Result<(), ValidationError> {
        for &index in indices {
            self.check_segment(index)?;
        }
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_unstable();
        order.dedup();
        for index in order.into_iter().rev() {
            self.segments.remove(index);
        }
        Ok(())
    }

    /// Adds a word to an existing segment, keeping the segment's words in
    /// time order.
    pub fn add_word(&mut self, segment: usize, word: Word) -> Result<(), ValidationError> {
        validate_range(word.start, word.end)?;
        self.check_segment(segment)?;
        self.segments[segment].words.push(word);
        self.segments[segment].sort_words();
        self.normalize();
        Ok(())
    }

    /// Re-times a whole segment to the given span, scaling each word
    /// proportionally. The span must leave at least min_word_duration per
    /// word.
    pub fn resize_segment(
        &mut self,
        segment: usize,
        new_start: f64,
        new_end: f64,
        min_word_duration: f64,
    ) -> Result<(), ValidationError> {
        validate_range(new_start, new_end)?;
        self.check_segment(segment)?;

        let words = self.segments[segment].words.len() as f64;
        if new_end - new_start < min_word_duration * words {
            return Err(ValidationError::InvalidRange {
                start: new_start,
                end: new_end,
            });
        }

        let old_start = self.segments[segment].start();
        let old_span = self.segments[segment].end() - old_start;
        let target = &mut self.segments[segment];
        if old_span <= 0.0 {
            // Zero-length source span: spread the words evenly instead
            let per = (new_end - new_start) / words;
            for (i, w) in target.words.iter_mut().enumerate() {
                w.start = new_start + per * i as f64;
                w.end = new_start + per * (i + 1) as f64;
            }
        } else {
            let scale = (new_end - new_start) / old_span;
            for w in &mut target.words {
                w.start = new_start + (w.start - old_start) * scale;
                w.end = new_start + (w.end - old_start) * scale;
            }
        }
        self.normalize();
        Ok(())
    }

    fn check_segment(&self, segment: usize) -> Result<(), ValidationError> {
        if segment >= self.segments.len() {
            return Err(ValidationError::IndexOutOfRange {
                segment,
                word: None,
            });
        }
        Ok(())
    }

    fn check_word(&self, segment: usize, word: usize) -> Result<(), ValidationError> {
        self.check_segment(segment)?;
        if word >= self.segments[segment].words.len() {
            return Err(ValidationError::IndexOutOfRange {
                segment,
                word: Some(word),
            });
        }
        Ok(())
    }

    fn word_mut(&mut self, segment: usize, word: usize) -> Result<&mut Word, ValidationError> {
        self.check_word(segment, word)?;
        Ok(&mut self.segments[segment].words[word])
    }
}

fn validate_range(start: f64, end: f64) -> Result<(), ValidationError> {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end < start {
        return Err(ValidationError::InvalidRange { start, end });
    }
    Ok(())
}
