//! Normalized timeline model shared by every parser and the sync pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timed-text formats understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Lrc,
    Ass,
    Srt,
    /// Sniff the content (or trust the file extension) before parsing
    #[default]
    Auto,
}

impl Format {
    /// Stable lowercase identifier, also used as the file extension on export
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lrc => "lrc",
            Self::Ass => "ass",
            Self::Srt => "srt",
            Self::Auto => "auto",
        }
    }

    /// Map an authoritative file extension to a concrete format.
    ///
    /// `.ssa` shares the ASS event grammar and is treated as ASS.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "lrc" => Some(Self::Lrc),
            "ass" | "ssa" => Some(Self::Ass),
            "srt" => Some(Self::Srt),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            other => Self::from_extension(other).ok_or_else(|| format!("unknown lyric format: {s}")),
        }
    }
}

/// One word (or syllable) of a karaoke line decoded from ASS `\k` tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaraokeWord {
    pub text: String,
    /// Highlight start in seconds
    pub start: f64,
    /// Highlight end in seconds, never before `start`
    pub end: f64,
}

/// A single segment boundary of an LRC multi-timestamp line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KaraokeTiming {
    pub time: f64,
    /// 1-based index of the timestamp after the line start
    pub position: usize,
}

/// LRC karaoke convention: `[start][t1][t2]...text`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrcKaraoke {
    pub full_text: String,
    pub timings: Vec<KaraokeTiming>,
}

/// A single line of the normalized timeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LyricLine {
    /// Line start in seconds
    pub time: f64,
    /// Primary text first, then translations in file order
    pub texts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karaoke: Option<LrcKaraoke>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<KaraokeWord>,
}

impl LyricLine {
    /// Create a plain line with a single text
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            texts: vec![text.into()],
            karaoke: None,
            words: Vec::new(),
        }
    }

    /// Add a translation text
    #[must_use]
    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.texts.push(text.into());
        self
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        self.texts.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        self.texts.get(1).map(String::as_str)
    }

    /// Whether the line carries word-level timing in either karaoke form
    #[must_use]
    pub fn is_karaoke(&self) -> bool {
        !self.words.is_empty() || self.karaoke.is_some()
    }
}

/// Sort a timeline by start time, keeping file order for equal times
pub(crate) fn sort_timeline(lines: &mut [LyricLine]) {
    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
}
