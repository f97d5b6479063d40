use std::path::Path;
use tokio::fs;
use tracing::info;

use super::model::{Segment, Subtitles, Word};
use super::segmenter::interpolate_words;
use crate::error::{JimakuError, Result};
use crate::style::Style;

const HIGHLIGHT_END: &str = "{\\r}";

/// Generate an ASS file: full V4+ header from the style, then one dialogue
/// line per segment, or one per word when a highlight style is set.
pub async fn generate_ass<P: AsRef<Path>>(
    subtitles: &Subtitles,
    style: &Style,
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating ASS file: {}", output_path.display());

    fs::write(output_path, render_ass(subtitles, style))
        .await
        .map_err(JimakuError::Io)?;

    info!("ASS file generated successfully");
    Ok(())
}

pub fn render_ass(subtitles: &Subtitles, style: &Style) -> String {
    let mut lines = vec![render_header(style)];

    match &style.highlight {
        Some(highlight) => {
            let tag = highlight.override_tag();
            for segment in &subtitles.segments {
                for (h_index, highlighted_word) in segment.words.iter().enumerate() {
                    let start = format_ass_time(highlighted_word.start);
                    let end = format_ass_time(highlighted_word.end);

                    let text: Vec<String> = segment
                        .words
                        .iter()
                        .enumerate()
                        .map(|(o_index, other_word)| {
                            if h_index == o_index {
                                format!("{}{}{}", tag, highlighted_word.text, HIGHLIGHT_END)
                            } else {
                                other_word.text.clone()
                            }
                        })
                        .collect();

                    lines.push(format!(
                        "Dialogue: 0,{},{},Default,,0,0,0,,{}",
                        start,
                        end,
                        text.join(" ")
                    ));
                }
            }
        }
        None => {
            for segment in &subtitles.segments {
                let start = format_ass_time(segment.start());
                let end = format_ass_time(segment.end());
                lines.push(format!(
                    "Dialogue: 0,{},{},Default,,0,0,0,,{}",
                    start,
                    end,
                    segment.text()
                ));
            }
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

fn render_header(style: &Style) -> String {
    format!(
        "[Script Info]\n\
         Title: {}\n\
         ScriptType: v4.00+\n\
         Collisions: Normal\n\
         PlayResX: {}\n\
         PlayResY: {}\n\
         WrapStyle: {}\n\
         ScaledBorderAndShadow: {}\n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Default,{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text",
        style.title,
        style.play_res_x,
        style.play_res_y,
        style.wrap_style,
        if style.scaled_border_and_shadow { "yes" } else { "no" },
        style.font,
        style.font_size,
        style.primary_colour,
        style.secondary_colour,
        style.outline_colour,
        style.back_colour,
        style.bold,
        style.italic,
        style.underline,
        style.strikeout,
        style.scale_x,
        style.scale_y,
        style.spacing,
        style.angle,
        style.border_style,
        style.outline,
        style.shadow,
        style.alignment,
        style.margin_l,
        style.margin_r,
        style.margin_v,
        style.encoding,
    )
}

/// Format time in seconds to ASS time format (h:mm:ss.cs)
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6_000;
    let secs = (total_cs % 6_000) / 100;
    let cs = total_cs % 100;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
}

/// Read an ASS track back into a subtitle tree. Dialogue lines written in the
/// per-word highlight shape reconstruct exact word timing (at centisecond
/// resolution); plain segment lines get evenly interpolated word timing.
pub async fn import_ass<P: AsRef<Path>>(path: P) -> Result<Subtitles> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| JimakuError::Persistence(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_ass(&content)
}

struct DialogueLine {
    start: f64,
    end: f64,
    /// Visible text tokens, override blocks stripped
    tokens: Vec<String>,
    /// Token index carrying a highlight override, if any
    highlighted: Option<usize>,
}

pub fn parse_ass(content: &str) -> Result<Subtitles> {
    let mut segments: Vec<Segment> = Vec::new();
    // Run of per-word dialogue lines belonging to one segment
    let mut run: Vec<DialogueLine> = Vec::new();

    for raw_line in content.lines() {
        let Some(rest) = raw_line.trim().strip_prefix("Dialogue:") else {
            continue;
        };
        let line = parse_dialogue(rest.trim())?;

        let continues_run = line.highlighted == Some(run.len())
            && run.first().is_none_or(|first| first.tokens == line.tokens);
        if !continues_run {
            flush_run(&mut run, &mut segments);
        }

        if line.highlighted == Some(run.len())
            && run.first().is_none_or(|first| first.tokens == line.tokens)
        {
            run.push(line);
            if run.len() == run[0].tokens.len() {
                flush_run(&mut run, &mut segments);
            }
        } else {
            push_span_segment(&line, &mut segments);
        }
    }
    flush_run(&mut run, &mut segments);

    Ok(Subtitles::new(segments))
}

fn flush_run(run: &mut Vec<DialogueLine>, segments: &mut Vec<Segment>) {
    if run.is_empty() {
        return;
    }
    let lines = std::mem::take(run);

    let complete = lines.len() == lines[0].tokens.len()
        && lines
            .iter()
            .enumerate()
            .all(|(i, l)| l.highlighted == Some(i));
    if complete {
        // Each line's span times the word it highlights
        let words = lines[0]
            .tokens
            .iter()
            .zip(lines.iter())
            .map(|(token, line)| Word::new(token.clone(), line.start, line.end))
            .collect();
        segments.push(Segment::new(words));
    } else {
        for line in &lines {
            push_span_segment(line, segments);
        }
    }
}

fn push_span_segment(line: &DialogueLine, segments: &mut Vec<Segment>) {
    let text = line.tokens.join(" ");
    let words = interpolate_words(&text, line.start, line.end);
    if !words.is_empty() {
        segments.push(Segment::new(words));
    }
}

fn parse_dialogue(rest: &str) -> Result<DialogueLine> {
    // Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
    let fields: Vec<&str> = rest.splitn(10, ',').collect();
    if fields.len() != 10 {
        return Err(JimakuError::UnsupportedFormat(format!(
            "Malformed dialogue line: {}",
            rest
        )));
    }

    let start = parse_ass_time(fields[1])?;
    let end = parse_ass_time(fields[2])?;

    let mut tokens = Vec::new();
    let mut highlighted = None;
    for raw_token in fields[9].split(' ') {
        let visible = strip_override_blocks(raw_token);
        if visible.is_empty() && !has_highlight_override(raw_token) {
            continue;
        }
        if has_highlight_override(raw_token) {
            highlighted = Some(tokens.len());
        }
        tokens.push(visible);
    }

    Ok(DialogueLine {
        start,
        end,
        tokens,
        highlighted,
    })
}

fn parse_ass_time(text: &str) -> Result<f64> {
    let bad = || JimakuError::UnsupportedFormat(format!("Invalid ASS timestamp: {}", text));
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(bad());
    }
    let hours: f64 = parts[0].parse().map_err(|_| bad())?;
    let minutes: f64 = parts[1].parse().map_err(|_| bad())?;
    let seconds: f64 = parts[2].parse().map_err(|_| bad())?;
    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn strip_override_blocks(token: &str) -> String {
    let mut out = String::new();
    let mut depth = 0u32;
    for c in token.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Any override block other than the {\r} reset marks the active word.
fn has_highlight_override(token: &str) -> bool {
    let mut rest = token;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            return false;
        };
        if &rest[open + 1..open + close] != "\\r" {
            return true;
        }
        rest = &rest[open + close + 1..];
    }
    false
}
