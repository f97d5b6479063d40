use super::model::{Segment, Subtitles, Word};
use crate::config::{SegmentationConfig, SegmentationPolicy};
use crate::engine::RawTranscript;

/// Evenly spaced word timings for text whose source carries only a span
/// (SRT cues, engine segments without word data).
pub fn interpolate_words(text: &str, start: f64, end: f64) -> Vec<Word> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    let span = (end - start).max(0.0);
    let per = span / tokens.len() as f64;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| Word::new(*token, start + per * i as f64, start + per * (i + 1) as f64))
        .collect()
}

/// Builds a committed tree from a raw transcript under the configured
/// grouping policy. Empty groups are dropped, never constructed.
pub fn group_transcript(raw: &RawTranscript, config: &SegmentationConfig) -> Subtitles {
    match config.policy {
        SegmentationPolicy::EnginePassThrough => pass_through(raw),
        SegmentationPolicy::CharBudget => {
            char_budget(raw, config.max_chars, &config.break_chars)
        }
    }
}

/// One segment per engine segment.
fn pass_through(raw: &RawTranscript) -> Subtitles {
    let segments = raw
        .segments
        .iter()
        .map(|s| Segment::new(clean_words(&s.words)))
        .collect();
    Subtitles::new(segments)
}

/// Regroups the flattened word stream under a character budget; a group also
/// closes right after a word ending in break punctuation.
fn char_budget(raw: &RawTranscript, max_chars: usize, break_chars: &str) -> Subtitles {
    let words: Vec<Word> = raw
        .segments
        .iter()
        .flat_map(|s| clean_words(&s.words))
        .collect();

    let mut segments: Vec<Segment> = Vec::new();
    let mut buffer: Vec<Word> = Vec::new();
    let mut combined_len = 0usize;

    for word in words {
        let word_len = word.text.chars().count();
        combined_len += if buffer.is_empty() { word_len } else { word_len + 1 };
        let breaks_here = word
            .text
            .chars()
            .last()
            .is_some_and(|c| break_chars.contains(c));
        buffer.push(word);

        if combined_len >= max_chars || breaks_here {
            segments.push(Segment::new(std::mem::take(&mut buffer)));
            combined_len = 0;
        }
    }
    if !buffer.is_empty() {
        segments.push(Segment::new(buffer));
    }

    Subtitles::new(segments)
}

fn clean_words(words: &[Word]) -> Vec<Word> {
    words
        .iter()
        .filter(|w| !w.text.trim().is_empty())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawSegment;

    fn raw(segments: Vec<RawSegment>) -> RawTranscript {
        RawTranscript {
            language: Some("en".to_string()),
            segments,
        }
    }

    fn raw_segment(words: &[(&str, f64, f64)]) -> RawSegment {
        let words: Vec<Word> = words
            .iter()
            .map(|(t, s, e)| Word::new(*t, *s, *e))
            .collect();
        RawSegment {
            text: words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            start: words.first().map_or(0.0, |w| w.start),
            end: words.last().map_or(0.0, |w| w.end),
            words,
        }
    }

    fn char_config(max_chars: usize) -> SegmentationConfig {
        SegmentationConfig {
            policy: SegmentationPolicy::CharBudget,
            max_chars,
            break_chars: ".,!?".to_string(),
        }
    }

    #[test]
    fn test_interpolation_spreads_words_evenly() {
        let words = interpolate_words("one two three", 0.0, 3.0);
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].start, 0.0);
        assert_eq!(words[0].end, 1.0);
        assert_eq!(words[2].start, 2.0);
        assert_eq!(words[2].end, 3.0);
    }

    #[test]
    fn test_interpolation_of_empty_text_yields_nothing() {
        assert!(interpolate_words("   ", 0.0, 2.0).is_empty());
    }

    #[test]
    fn test_pass_through_drops_empty_groups() {
        let transcript = raw(vec![
            raw_segment(&[("Hello", 0.0, 0.5), ("world", 0.6, 1.0)]),
            raw_segment(&[]),
            raw_segment(&[("Test", 1.5, 2.0)]),
        ]);
        let config = SegmentationConfig {
            policy: SegmentationPolicy::EnginePassThrough,
            max_chars: 10,
            break_chars: ".,!?".to_string(),
        };

        let subtitles = group_transcript(&transcript, &config);
        assert_eq!(subtitles.segments.len(), 2);
        assert_eq!(subtitles.segments[0].text(), "Hello world");
        assert!(subtitles.invariant_violation().is_none());
    }

    #[test]
    fn test_char_budget_closes_group_at_budget() {
        let transcript = raw(vec![raw_segment(&[
            ("Hello", 0.0, 0.5),
            ("world", 0.6, 1.0),
            ("again", 1.1, 1.5),
        ])]);

        let subtitles = group_transcript(&transcript, &char_config(10));
        // "Hello world" hits the 10-char budget, "again" starts a new group
        assert_eq!(subtitles.segments.len(), 2);
        assert_eq!(subtitles.segments[0].text(), "Hello world");
        assert_eq!(subtitles.segments[1].text(), "again");
    }

    #[test]
    fn test_char_budget_breaks_after_punctuation() {
        let transcript = raw(vec![raw_segment(&[
            ("Hi,", 0.0, 0.3),
            ("you", 0.4, 0.7),
            ("there", 0.8, 1.2),
        ])]);

        let subtitles = group_transcript(&transcript, &char_config(40));
        assert_eq!(subtitles.segments.len(), 2);
        assert_eq!(subtitles.segments[0].text(), "Hi,");
        assert_eq!(subtitles.segments[1].text(), "you there");
    }

    #[test]
    fn test_char_budget_flattens_across_engine_segments() {
        let transcript = raw(vec![
            raw_segment(&[("a", 0.0, 0.2)]),
            raw_segment(&[("b", 0.3, 0.5)]),
        ]);

        let subtitles = group_transcript(&transcript, &char_config(40));
        assert_eq!(subtitles.segments.len(), 1);
        assert_eq!(subtitles.segments[0].text(), "a b");
    }

    #[test]
    fn test_whitespace_words_are_skipped() {
        let transcript = raw(vec![raw_segment(&[
            ("  ", 0.0, 0.1),
            ("real", 0.2, 0.5),
        ])]);

        let subtitles = group_transcript(&transcript, &char_config(40));
        assert_eq!(subtitles.word_count(), 1);
    }
}
