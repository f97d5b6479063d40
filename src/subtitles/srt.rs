use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::info;

use super::model::{Segment, Subtitles};
use super::segmenter::interpolate_words;
use crate::error::{JimakuError, Result};

static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})")
        .expect("valid timestamp pattern")
});

/// Generate an SRT file from the subtitle tree, one cue per segment.
pub async fn generate_srt<P: AsRef<Path>>(subtitles: &Subtitles, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, render_srt(subtitles))
        .await
        .map_err(JimakuError::Io)?;

    info!("SRT file generated successfully");
    Ok(())
}

pub fn render_srt(subtitles: &Subtitles) -> String {
    let mut srt_content = String::new();

    for (index, segment) in subtitles.segments.iter().enumerate() {
        let start_time = format_srt_time(segment.start());
        let end_time = format_srt_time(segment.end());

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            start_time,
            end_time,
            segment.text().trim()
        ));
    }

    srt_content
}

/// Read an SRT file back into a subtitle tree. Cue-level timing is exact;
/// word timing inside a cue is evenly interpolated since plain SRT does not
/// carry it.
pub async fn import_srt<P: AsRef<Path>>(path: P) -> Result<Subtitles> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| JimakuError::Persistence(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_srt(&content)
}

pub fn parse_srt(content: &str) -> Result<Subtitles> {
    let normalized = content.replace("\r\n", "\n");
    let mut segments: Vec<Segment> = Vec::new();

    for block in normalized.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut start = None;
        let mut end = None;
        let mut text_lines: Vec<&str> = Vec::new();
        for line in block.lines() {
            if start.is_none() {
                if let Some(caps) = TIMESTAMP_REGEX.captures(line) {
                    start = Some(timestamp_to_secs(&caps, 1));
                    end = Some(timestamp_to_secs(&caps, 5));
                    continue;
                }
                // Sequence number or garbage before the timestamp line
                continue;
            }
            text_lines.push(line.trim());
        }

        let (Some(start), Some(end)) = (start, end) else {
            return Err(JimakuError::UnsupportedFormat(format!(
                "SRT cue without timestamp: {:?}",
                block.lines().next().unwrap_or_default()
            )));
        };

        let text = text_lines.join(" ");
        let words = interpolate_words(&text, start, end);
        if !words.is_empty() {
            segments.push(Segment::new(words));
        }
    }

    Ok(Subtitles::new(segments))
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn timestamp_to_secs(caps: &regex::Captures, start_idx: usize) -> f64 {
    let group = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    let ms = group(0) * 3_600_000 + group(1) * 60_000 + group(2) * 1_000 + group(3);
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::Word;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_render_cue_layout() {
        let subtitles = Subtitles::new(vec![Segment::new(vec![
            Word::new("Hello", 0.0, 0.5),
            Word::new("world", 0.6, 1.0),
        ])]);
        let srt = render_srt(&subtitles);
        assert_eq!(srt, "1\n00:00:00,000 --> 00:00:01,000\nHello world\n\n");
    }

    #[test]
    fn test_parse_handles_crlf_and_multiline_text() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,500\r\nHello\r\nworld\r\n\r\n";
        let subtitles = parse_srt(srt).unwrap();
        assert_eq!(subtitles.segments.len(), 1);
        assert_eq!(subtitles.segments[0].text(), "Hello world");
        assert_eq!(subtitles.segments[0].start(), 1.0);
        assert_eq!(subtitles.segments[0].end(), 2.5);
    }

    #[test]
    fn test_parse_rejects_cue_without_timestamp() {
        let srt = "1\nno timestamps here\n\n";
        assert!(parse_srt(srt).is_err());
    }

    #[test]
    fn test_round_trip_preserves_cue_text_and_times() {
        let subtitles = Subtitles::new(vec![
            Segment::new(vec![
                Word::new("Hello", 0.0, 0.5),
                Word::new("world", 0.6, 1.0),
            ]),
            Segment::new(vec![Word::new("Test", 1.5, 2.0)]),
        ]);

        let reimported = parse_srt(&render_srt(&subtitles)).unwrap();
        assert_eq!(reimported.segments.len(), 2);
        for (orig, back) in subtitles.segments.iter().zip(reimported.segments.iter()) {
            assert_eq!(orig.text(), back.text());
            assert_eq!(orig.start(), back.start());
            assert_eq!(orig.end(), back.end());
        }
    }
}
