use crate::model::{sort_timeline, KaraokeTiming, KaraokeWord, LrcKaraoke, LyricLine};
use crate::parser::{strip_bom, LineParser};
use crate::time::{millis_to_secs, signed_millis_to_secs};
use std::collections::HashMap;
use tracing::trace;

/// Parsed LRC file containing metadata and synchronized lines
#[derive(Debug, Clone, Default)]
pub struct LrcFile {
    pub metadata: LrcMetadata,
    pub lines: Vec<LyricLine>,
}

/// LRC metadata from ID tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    /// Track length in seconds
    pub length: Option<f64>,
    pub offset: i64, // milliseconds, can be negative
}

impl LrcFile {
    /// Parse an LRC string into an `LrcFile`
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut parser = LrcParser::new();
        for line in strip_bom(input).lines() {
            parser.feed_line(line);
        }
        parser.into_file()
    }
}

/// Incremental LRC parser.
///
/// Lines sharing a start time merge into one [`LyricLine`], which is how
/// bilingual LRC pairs a translation with the line it follows.
#[derive(Debug, Default)]
pub struct LrcParser {
    metadata: LrcMetadata,
    lines: Vec<LyricLine>,
    /// Start time in milliseconds -> index into `lines`
    by_start: HashMap<u64, usize>,
}

impl LrcParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        // Try to parse as ID tag first
        if let Some((tag, value)) = parse_id_tag(line) {
            match tag.to_lowercase().as_str() {
                "ti" => self.metadata.title = Some(value),
                "ar" => self.metadata.artist = Some(value),
                "al" => self.metadata.album = Some(value),
                "au" => self.metadata.author = Some(value),
                "length" => self.metadata.length = parse_duration_tag(&value),
                "offset" => {
                    if let Ok(offset) = value.trim_start_matches('+').parse::<i64>() {
                        self.metadata.offset = offset;
                    }
                }
                _ => {} // Ignore unknown tags
            }
            return;
        }

        let Some((stamps, text)) = split_timestamps(line) else {
            trace!("Skipping LRC line without timestamps: {line}");
            return;
        };
        let start_ms = stamps[0];
        let (text, words) = decode_word_stamps(&text, start_ms);
        if text.is_empty() {
            trace!("Dropping LRC line with empty text: {line}");
            return;
        }

        let idx = *self.by_start.entry(start_ms).or_insert_with(|| {
            self.lines.push(LyricLine {
                time: millis_to_secs(start_ms),
                ..LyricLine::default()
            });
            self.lines.len() - 1
        });

        let entry = &mut self.lines[idx];
        entry.texts.push(text.clone());
        if entry.words.is_empty() {
            entry.words = words;
        }

        if stamps.len() > 1 && entry.karaoke.is_none() {
            let timings = stamps[1..]
                .iter()
                .enumerate()
                .map(|(i, &ms)| KaraokeTiming {
                    time: millis_to_secs(ms),
                    position: i + 1,
                })
                .collect();
            entry.karaoke = Some(LrcKaraoke {
                full_text: text,
                timings,
            });
        }
    }

    fn into_file(mut self) -> LrcFile {
        // Apply offset to all lines
        if self.metadata.offset != 0 {
            let offset = signed_millis_to_secs(self.metadata.offset);
            for line in &mut self.lines {
                line.time = (line.time + offset).max(0.0);
                if let Some(ref mut karaoke) = line.karaoke {
                    for timing in &mut karaoke.timings {
                        timing.time = (timing.time + offset).max(0.0);
                    }
                }
                for word in &mut line.words {
                    word.start = (word.start + offset).max(0.0);
                    word.end = (word.end + offset).max(0.0);
                }
            }
        }

        sort_timeline(&mut self.lines);
        close_last_words(&mut self.lines);

        LrcFile {
            metadata: self.metadata,
            lines: self.lines,
        }
    }
}

impl LineParser for LrcParser {
    fn feed_line(&mut self, line: &str) {
        self.push_line(line);
    }

    fn finish(self: Box<Self>) -> Vec<LyricLine> {
        self.into_file().lines
    }
}

/// Parse an ID tag like [ti:Title] or [ar:Artist]
fn parse_id_tag(line: &str) -> Option<(String, String)> {
    if !line.starts_with('[') || !line.ends_with(']') {
        return None;
    }

    let content = &line[1..line.len() - 1];
    if content.contains(['[', ']']) {
        return None;
    }

    let first_colon = content.find(':')?;
    let tag = &content[..first_colon];

    // A tag must start with a letter; digits mean a timestamp
    if !tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let value = content[first_colon + 1..].trim().to_string();
    Some((tag.to_string(), value))
}

/// Parse a duration string like "mm:ss" or "mm:ss.xx" into seconds
fn parse_duration_tag(s: &str) -> Option<f64> {
    let (minutes, seconds) = s.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;

    Some(f64::from(minutes) * 60.0 + seconds)
}

/// Extract every timestamp tag from a line, leading or embedded.
///
/// Returns the timestamps in order of appearance (milliseconds) and the
/// remaining text with the tags removed. Bracketed content that is not a
/// timestamp stays in the text.
fn split_timestamps(line: &str) -> Option<(Vec<u64>, String)> {
    let mut stamps = Vec::new();
    let mut text = String::with_capacity(line.len());
    let mut remaining = line;

    while let Some(open) = remaining.find('[') {
        let Some(close) = remaining[open..].find(']').map(|c| open + c) else {
            break;
        };

        if let Some(ms) = parse_timestamp(&remaining[open + 1..close]) {
            stamps.push(ms);
            text.push_str(&remaining[..open]);
        } else {
            text.push_str(&remaining[..=close]);
        }
        remaining = &remaining[close + 1..];
    }
    text.push_str(remaining);

    if stamps.is_empty() {
        return None;
    }

    Some((stamps, text.trim().to_string()))
}

/// Piece of an enhanced LRC text
enum WordPiece<'a> {
    Text(&'a str),
    Stamp(u64),
}

/// Split text on `<mm:ss.xx>` word stamps. Angle-bracketed content that is not
/// a timestamp stays text.
fn word_pieces(text: &str) -> Vec<WordPiece<'_>> {
    let mut pieces = Vec::new();
    let mut remaining = text;

    while let Some(open) = remaining.find('<') {
        let Some(close) = remaining[open..].find('>').map(|c| open + c) else {
            break;
        };

        if let Some(ms) = parse_timestamp(&remaining[open + 1..close]) {
            pieces.push(WordPiece::Text(&remaining[..open]));
            pieces.push(WordPiece::Stamp(ms));
        } else {
            pieces.push(WordPiece::Text(&remaining[..=close]));
        }
        remaining = &remaining[close + 1..];
    }
    pieces.push(WordPiece::Text(remaining));
    pieces
}

/// Decode enhanced LRC word stamps (`<mm:ss.xx>word`).
///
/// Returns the display text without stamps and one word per stamped span.
/// Each word ends at the next stamp; text before the first stamp starts at
/// the line start. A last word with no closing stamp is zero-length until
/// [`close_last_words`] extends it.
fn decode_word_stamps(text: &str, line_start_ms: u64) -> (String, Vec<KaraokeWord>) {
    let mut plain = String::with_capacity(text.len());
    // (start_ms, text) of every stamped span, in order
    let mut spans: Vec<(u64, String)> = Vec::new();
    let mut stamped = false;

    for piece in word_pieces(text) {
        match piece {
            WordPiece::Text(s) => {
                plain.push_str(s);
                match spans.last_mut() {
                    Some((_, word)) => word.push_str(s),
                    None if !s.trim().is_empty() => spans.push((line_start_ms, s.to_string())),
                    None => {}
                }
            }
            WordPiece::Stamp(ms) => {
                stamped = true;
                spans.push((ms, String::new()));
            }
        }
    }

    let plain = plain.trim().to_string();
    if !stamped {
        return (plain, Vec::new());
    }

    let words = spans
        .iter()
        .enumerate()
        .filter(|(_, (_, word))| !word.trim().is_empty())
        .map(|(i, (start, word))| {
            let end = spans.get(i + 1).map_or(*start, |(next, _)| (*next).max(*start));
            KaraokeWord {
                text: word.clone(),
                start: millis_to_secs(*start),
                end: millis_to_secs(end),
            }
        })
        .collect();
    (plain, words)
}

/// Run each line's zero-length last word until the next later line starts
fn close_last_words(lines: &mut [LyricLine]) {
    let next_starts: Vec<Option<f64>> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            lines[i + 1..]
                .iter()
                .map(|l| l.time)
                .find(|&t| t > line.time)
        })
        .collect();

    for (line, next) in lines.iter_mut().zip(next_starts) {
        if let (Some(next), Some(last)) = (next, line.words.last_mut()) {
            if last.end <= last.start {
                last.end = next.max(last.start);
            }
        }
    }
}

/// Parse a timestamp body into milliseconds.
///
/// Accepted forms: `mm:ss`, `mm:ss.c`, `mm:ss.cc` (centiseconds), `mm:ss.ccc`
/// (milliseconds) and `hh:mm:ss`.
fn parse_timestamp(s: &str) -> Option<u64> {
    let s = s.trim();
    let parts: Vec<&str> = s.split(':').collect();

    match parts.as_slice() {
        [minutes, rest] => {
            let minutes = parse_digits(minutes, 1, 3)?;
            let (seconds, fraction) = match rest.split_once('.') {
                Some((seconds, fraction)) => (seconds, Some(fraction)),
                None => (*rest, None),
            };
            let seconds = parse_digits(seconds, 1, 2)?;
            if seconds >= 60 {
                return None;
            }
            let millis = match fraction {
                None => 0,
                Some(f) => match f.len() {
                    1 => parse_digits(f, 1, 1)? * 100,
                    2 => parse_digits(f, 2, 2)? * 10,
                    3 => parse_digits(f, 3, 3)?,
                    _ => return None,
                },
            };
            Some((minutes * 60 + seconds) * 1000 + millis)
        }
        [hours, minutes, seconds] => {
            let hours = parse_digits(hours, 1, 2)?;
            let minutes = parse_digits(minutes, 2, 2)?;
            let seconds = parse_digits(seconds, 2, 2)?;
            if minutes >= 60 || seconds >= 60 {
                return None;
            }
            Some(((hours * 60 + minutes) * 60 + seconds) * 1000)
        }
        _ => None,
    }
}

/// Parse an all-ASCII-digit string with a bounded length
fn parse_digits(s: &str, min_len: usize, max_len: usize) -> Option<u64> {
    if s.len() < min_len || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
