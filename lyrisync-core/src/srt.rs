//! SRT subtitle parser.
//!
//! Each cue becomes one line. The first text row is the primary text and any
//! further rows are treated as translations, the usual bilingual SRT layout.

use crate::model::{sort_timeline, LyricLine};
use crate::parser::LineParser;
use crate::time::SecondsExt;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Cue timing row, `HH:MM:SS,mmm --> HH:MM:SS,mmm`
static SRT_TIMING_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})",
        r"\s*-->\s*",
        r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})"
    ))
    .ok()
});

/// Sequence number immediately followed by a timing row, anywhere in a file
static SRT_HEADER_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\d+\s*\r?\n\s*\d{1,2}:\d{2}:\d{2},\d{3}\s*-->\s*\d{1,2}:\d{2}:\d{2},\d{3}")
        .ok()
});

/// Inline markup such as `<i>` or `<font color="...">`
static SRT_MARKUP_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());

/// Whether the text contains an SRT cue header
pub(crate) fn has_srt_header(text: &str) -> bool {
    SRT_HEADER_REGEX
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

/// Parse a cue timing row into `(start, end)` seconds
#[must_use]
pub fn parse_timing_row(row: &str) -> Option<(f64, f64)> {
    let caps = SRT_TIMING_REGEX.as_ref()?.captures(row.trim())?;
    let mut values = [0_u32; 8];
    for (i, value) in values.iter_mut().enumerate() {
        *value = caps[i + 1].parse().ok()?;
    }
    let to_secs = |h: u32, m: u32, s: u32, ms: u32| -> Option<f64> {
        if m >= 60 || s >= 60 {
            return None;
        }
        Some(f64::from(h * 3600 + m * 60 + s) + f64::from(ms) / 1000.0)
    };

    let start = to_secs(values[0], values[1], values[2], values[3])?;
    let end = to_secs(values[4], values[5], values[6], values[7])?;
    Some((start, end.max(start)))
}

#[derive(Debug)]
struct Cue {
    start: f64,
    end: f64,
    rows: Vec<String>,
}

/// Incremental SRT parser
#[derive(Debug, Default)]
pub struct SrtParser {
    current: Option<Cue>,
    lines: Vec<LyricLine>,
    /// `(start_ms, end_ms)` -> index into `lines`
    by_timing: HashMap<(u64, u64), usize>,
}

impl SrtParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            self.flush();
            return;
        }

        if let Some((start, end)) = parse_timing_row(line) {
            self.flush();
            self.current = Some(Cue {
                start,
                end,
                rows: Vec::new(),
            });
            return;
        }

        // Sequence numbers and stray text outside a cue are ignored
        if let Some(ref mut cue) = self.current {
            let row = strip_markup(line);
            if !row.is_empty() {
                cue.rows.push(row);
            }
        }
    }

    fn flush(&mut self) {
        let Some(cue) = self.current.take() else {
            return;
        };
        if cue.rows.is_empty() {
            return;
        }

        let key = (cue.start.as_millis_u64(), cue.end.as_millis_u64());
        if let Some(&idx) = self.by_timing.get(&key) {
            self.lines[idx].texts.extend(cue.rows);
            return;
        }

        self.by_timing.insert(key, self.lines.len());
        self.lines.push(LyricLine {
            time: cue.start,
            texts: cue.rows,
            karaoke: None,
            words: Vec::new(),
        });
    }
}

impl LineParser for SrtParser {
    fn feed_line(&mut self, line: &str) {
        self.push_line(line);
    }

    fn finish(mut self: Box<Self>) -> Vec<LyricLine> {
        self.flush();
        let mut lines = std::mem::take(&mut self.lines);
        sort_timeline(&mut lines);
        debug!("Parsed {} SRT cues", lines.len());
        lines
    }
}

fn strip_markup(row: &str) -> String {
    SRT_MARKUP_REGEX
        .as_ref()
        .map_or_else(|| row.to_string(), |re| re.replace_all(row, "").into_owned())
        .trim()
        .to_string()
}
