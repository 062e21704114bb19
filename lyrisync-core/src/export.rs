//! Serialize a timeline back to LRC, ASS or SRT text.

use crate::model::{Format, LyricLine};
use crate::time::{format_ass_timestamp, format_lrc_timestamp, format_srt_timestamp, SecondsExt};
use std::fmt::Write;

/// Display duration given to the last line when nothing bounds it
const DEFAULT_LAST_LINE_SECS: f64 = 5.0;

const ASS_STYLE_ORIGINAL: &str = "Original";
const ASS_STYLE_TRANSLATION: &str = "Translation";

const ASS_HEADER: &str = "[Script Info]
ScriptType: v4.00+
WrapStyle: 0
ScaledBorderAndShadow: yes
PlayResX: 1920
PlayResY: 1080

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Original,Arial,64,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,0,2,20,20,80,1
Style: Translation,Arial,44,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,0,2,20,20,30,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

/// Serialize lines into the given format. `Auto` writes LRC.
#[must_use]
pub fn stringify(lines: &[LyricLine], format: Format) -> String {
    match format {
        Format::Ass => stringify_ass(lines),
        Format::Srt => stringify_srt(lines),
        Format::Lrc | Format::Auto => stringify_lrc(lines),
    }
}

/// End of a line: the next later line start, else the last word end or a
/// default duration
fn line_end(lines: &[LyricLine], idx: usize) -> f64 {
    let line = &lines[idx];
    let words_end = line.words.last().map_or(line.time, |w| w.end);
    lines[idx + 1..]
        .iter()
        .map(|l| l.time)
        .find(|&t| t > line.time)
        .unwrap_or(line.time + DEFAULT_LAST_LINE_SECS)
        .max(words_end)
}

fn stringify_lrc(lines: &[LyricLine]) -> String {
    let mut output = String::with_capacity(lines.len() * 32);

    for line in lines {
        let timestamp = format_lrc_timestamp(line.time);

        // Segment boundaries after the line start, from either karaoke form
        let segment_times: Vec<f64> = match (&line.karaoke, line.words.len()) {
            (Some(karaoke), _) => karaoke.timings.iter().map(|t| t.time).collect(),
            (None, n) if n > 1 => line.words[1..].iter().map(|w| w.start).collect(),
            _ => Vec::new(),
        };
        let karaoke_text = line
            .karaoke
            .as_ref()
            .map_or_else(|| line.primary(), |k| k.full_text.as_str());

        let mut wrote_segments = segment_times.is_empty();
        for text in &line.texts {
            if !wrote_segments && text == karaoke_text {
                let _ = write!(output, "[{timestamp}]");
                for time in &segment_times {
                    let _ = write!(output, "[{}]", format_lrc_timestamp(*time));
                }
                let _ = writeln!(output, "{text}");
                wrote_segments = true;
            } else {
                let _ = writeln!(output, "[{timestamp}]{text}");
            }
        }
    }

    output
}

fn stringify_ass(lines: &[LyricLine]) -> String {
    let mut output = String::from(ASS_HEADER);

    for (idx, line) in lines.iter().enumerate() {
        let start = format_ass_timestamp(line.time);
        let end = format_ass_timestamp(line_end(lines, idx));

        let primary = if line.words.is_empty() {
            line.primary().to_string()
        } else {
            karaoke_tagged_text(line)
        };
        let _ = writeln!(
            output,
            "Dialogue: 0,{start},{end},{ASS_STYLE_ORIGINAL},,0,0,0,,{primary}"
        );
        for translation in line.texts.iter().skip(1) {
            let _ = writeln!(
                output,
                "Dialogue: 0,{start},{end},{ASS_STYLE_TRANSLATION},,0,0,0,,{translation}"
            );
        }
    }

    output
}

/// Render words as `{\k<cs>}` tagged text, measured from the line start so
/// rounding never accumulates
fn karaoke_tagged_text(line: &LyricLine) -> String {
    let mut text = String::new();
    let mut cursor = 0_u64;

    for word in &line.words {
        let start = (word.start - line.time).as_centis_u64();
        let end = (word.end - line.time).as_centis_u64().max(start);
        if start > cursor {
            let _ = write!(text, "{{\\k{}}}", start - cursor);
        }
        let _ = write!(text, "{{\\k{}}}{}", end.saturating_sub(start.max(cursor)), word.text);
        cursor = end.max(cursor);
    }

    text
}

fn stringify_srt(lines: &[LyricLine]) -> String {
    let mut output = String::with_capacity(lines.len() * 48);

    for (idx, line) in lines.iter().enumerate() {
        let _ = writeln!(output, "{}", idx + 1);
        let _ = writeln!(
            output,
            "{} --> {}",
            format_srt_timestamp(line.time),
            format_srt_timestamp(line_end(lines, idx))
        );
        for text in &line.texts {
            let _ = writeln!(output, "{text}");
        }
        output.push('\n');
    }

    output
}
