//! ASS/SSA event parser.
//!
//! Dialogues authored with identical `(start, end)` timing are merged into one
//! line so an original cue and its translation cue end up together. Which of
//! the two is the original is decided from the style name, which is a
//! best-effort heuristic; callers that know better pass explicit overrides in
//! [`AssOptions`].

use crate::model::{sort_timeline, KaraokeWord, LyricLine};
use crate::parser::LineParser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// `H:MM:SS.cc`, nothing more, nothing less
static ASS_TIME_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})\.(\d{2})$").ok());

/// A complete override block such as `{\k50}` or `{\b1\kf20}`
static OVERRIDE_BLOCK_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").ok());

/// Karaoke duration tag inside an override block, in centiseconds
static KARAOKE_TAG_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\\(?:kf|ko|K|k)(\d+)").ok());

/// Number of comma-separated fields before the free-form Text field
const FIXED_FIELDS: usize = 9;

const TRANSLATION_STYLE_KEYWORDS: &[&str] = &[
    "ts",
    "translation",
    "trans",
    "cn",
    "zh",
    "chs",
    "cht",
    "chinese",
    "romaji",
    "roma",
    "chn",
    "翻译",
    "中文",
];

const ORIGINAL_STYLE_KEYWORDS: &[&str] = &[
    "orig", "original", "en", "english", "jp", "ja", "japanese", "main", "default", "lyric",
    "原文", "日文", "英文",
];

/// Language role of a dialogue style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleRole {
    Original,
    Translation,
}

/// Per-file ASS parsing options
#[derive(Debug, Clone, Default)]
pub struct AssOptions {
    /// Lowercased style name -> role, consulted before the keyword heuristic
    role_overrides: HashMap<String, StyleRole>,
}

impl AssOptions {
    /// Force a style to a role regardless of its name
    #[must_use]
    pub fn with_role(mut self, style: &str, role: StyleRole) -> Self {
        self.role_overrides.insert(style.trim().to_lowercase(), role);
        self
    }

    /// Build options from lists of style names
    #[must_use]
    pub fn from_style_lists(original: &[String], translation: &[String]) -> Self {
        let mut options = Self::default();
        for style in original {
            options = options.with_role(style, StyleRole::Original);
        }
        for style in translation {
            options = options.with_role(style, StyleRole::Translation);
        }
        options
    }

    /// Explicit role for a style, if one was configured
    #[must_use]
    pub fn role_override(&self, style: &str) -> Option<StyleRole> {
        self.role_overrides.get(&style.to_lowercase()).copied()
    }
}

/// Classify a style name by keyword. Translation keywords win.
#[must_use]
pub fn classify_style(style: &str) -> Option<StyleRole> {
    let style = style.to_lowercase();
    if TRANSLATION_STYLE_KEYWORDS.iter().any(|k| style.contains(k)) {
        Some(StyleRole::Translation)
    } else if ORIGINAL_STYLE_KEYWORDS.iter().any(|k| style.contains(k)) {
        Some(StyleRole::Original)
    } else {
        None
    }
}

/// One dialogue awaiting role assignment
#[derive(Debug)]
struct Dialogue {
    style: String,
    text: String,
    /// Role from an override or a style keyword
    role: Option<StyleRole>,
}

/// Dialogues sharing one `(start, end)` key
#[derive(Debug)]
struct DialogueGroup {
    start: f64,
    dialogues: Vec<Dialogue>,
}

impl DialogueGroup {
    /// Resolve every dialogue's role.
    ///
    /// Unclassified styles fill whichever role is still open: if some style is
    /// known to be the original they are translations, otherwise the first
    /// unclassified style is the original and any other style a translation.
    fn roles(&self) -> Vec<StyleRole> {
        let has_original = self
            .dialogues
            .iter()
            .any(|d| d.role == Some(StyleRole::Original));
        let first_unknown = self
            .dialogues
            .iter()
            .find(|d| d.role.is_none())
            .map(|d| d.style.as_str());

        self.dialogues
            .iter()
            .map(|d| {
                d.role.unwrap_or(if !has_original && first_unknown == Some(d.style.as_str()) {
                    StyleRole::Original
                } else {
                    StyleRole::Translation
                })
            })
            .collect()
    }
}

/// Incremental ASS parser
#[derive(Debug, Default)]
pub struct AssParser {
    options: AssOptions,
    in_events: bool,
    groups: Vec<DialogueGroup>,
    by_key: HashMap<String, usize>,
    dropped: usize,
}

impl AssParser {
    #[must_use]
    pub fn new(options: AssOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.starts_with('[') && line.ends_with(']') {
            self.in_events = line.eq_ignore_ascii_case("[Events]");
            return;
        }
        if !self.in_events {
            return;
        }
        let Some(body) = line.strip_prefix("Dialogue:") else {
            return;
        };

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() <= FIXED_FIELDS {
            trace!("Dropping dialogue with too few fields: {line}");
            self.dropped += 1;
            return;
        }

        let (Some(start), Some(end)) = (parse_ass_time(fields[1]), parse_ass_time(fields[2]))
        else {
            trace!("Dropping dialogue with malformed time: {line}");
            self.dropped += 1;
            return;
        };
        let style = fields[3].trim();
        let text = fields[FIXED_FIELDS..].join(",");

        let key = format!("{start:.3}-{end:.3}");
        let role = self
            .options
            .role_override(style)
            .or_else(|| classify_style(style));

        let idx = *self.by_key.entry(key).or_insert_with(|| {
            self.groups.push(DialogueGroup {
                start,
                dialogues: Vec::new(),
            });
            self.groups.len() - 1
        });
        self.groups[idx].dialogues.push(Dialogue {
            style: style.to_string(),
            text,
            role,
        });
    }

    fn into_lines(self) -> Vec<LyricLine> {
        if self.dropped > 0 {
            debug!("Dropped {} malformed ASS dialogues", self.dropped);
        }

        let mut lines: Vec<LyricLine> = self
            .groups
            .iter()
            .filter_map(build_line)
            .collect();
        sort_timeline(&mut lines);
        lines
    }
}

impl LineParser for AssParser {
    fn feed_line(&mut self, line: &str) {
        self.push_line(line);
    }

    fn finish(self: Box<Self>) -> Vec<LyricLine> {
        self.into_lines()
    }
}

fn build_line(group: &DialogueGroup) -> Option<LyricLine> {
    let roles = group.roles();
    let mut texts: Vec<String> = Vec::new();
    let mut words = Vec::new();
    let mut decoded_original = false;

    // Originals first, in file order, then translations
    for (dialogue, _) in group
        .dialogues
        .iter()
        .zip(&roles)
        .filter(|(_, role)| **role == StyleRole::Original)
    {
        if decoded_original {
            push_unique(&mut texts, strip_overrides(&dialogue.text));
        } else {
            let decoded = decode_karaoke(&dialogue.text, group.start);
            words = decoded.words;
            push_unique(&mut texts, decoded.text);
            decoded_original = true;
        }
    }
    for (dialogue, _) in group
        .dialogues
        .iter()
        .zip(&roles)
        .filter(|(_, role)| **role == StyleRole::Translation)
    {
        push_unique(&mut texts, strip_overrides(&dialogue.text));
    }

    if texts.is_empty() {
        return None;
    }

    Some(LyricLine {
        time: group.start,
        texts,
        karaoke: None,
        words,
    })
}

fn push_unique(texts: &mut Vec<String>, text: String) {
    if !text.is_empty() && !texts.contains(&text) {
        texts.push(text);
    }
}

/// Parse an ASS timestamp (`H:MM:SS.cc`) into seconds
#[must_use]
pub fn parse_ass_time(s: &str) -> Option<f64> {
    let caps = ASS_TIME_REGEX.as_ref()?.captures(s.trim())?;
    let h: u32 = caps[1].parse().ok()?;
    let m: u32 = caps[2].parse().ok()?;
    let sec: u32 = caps[3].parse().ok()?;
    let cs: u32 = caps[4].parse().ok()?;
    if m >= 60 || sec >= 60 {
        return None;
    }

    Some(f64::from(h * 3600 + m * 60 + sec) + f64::from(cs) / 100.0)
}

/// Display text and karaoke words decoded from one dialogue text
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    pub words: Vec<KaraokeWord>,
}

/// Decode `{\k<n>}` / `{\kf<n>}` karaoke tags starting at `line_start`.
///
/// Each tag opens a word made of the text up to the next tag; durations are
/// centiseconds for every tag variant. All override blocks are removed from
/// the display text.
#[must_use]
pub fn decode_karaoke(raw: &str, line_start: f64) -> DecodedText {
    let (Some(block_re), Some(tag_re)) = (OVERRIDE_BLOCK_REGEX.as_ref(), KARAOKE_TAG_REGEX.as_ref())
    else {
        return DecodedText {
            text: raw.trim().to_string(),
            words: Vec::new(),
        };
    };

    let mut text = String::with_capacity(raw.len());
    let mut words = Vec::new();
    let mut cursor = line_start;
    let mut current: Option<(u32, String)> = None;
    let mut last = 0;

    for block in block_re.find_iter(raw) {
        let literal = unescape(&raw[last..block.start()]);
        text.push_str(&literal);
        if let Some((_, ref mut word)) = current {
            word.push_str(&literal);
        }
        last = block.end();

        if let Some(caps) = tag_re.captures(block.as_str()) {
            let centis = caps[1].parse::<u32>().unwrap_or(0);
            if let Some((duration, word)) = current.take() {
                cursor = push_word(&mut words, word, cursor, duration);
            }
            current = Some((centis, String::new()));
        }
    }

    let literal = unescape(&raw[last..]);
    text.push_str(&literal);
    if let Some((duration, mut word)) = current.take() {
        word.push_str(&literal);
        push_word(&mut words, word, cursor, duration);
    }

    DecodedText {
        text: text.trim().to_string(),
        words,
    }
}

fn push_word(words: &mut Vec<KaraokeWord>, text: String, start: f64, centis: u32) -> f64 {
    let end = start + f64::from(centis) / 100.0;
    words.push(KaraokeWord { text, start, end });
    end
}

/// Remove every `{...}` override block
#[must_use]
pub fn strip_overrides(raw: &str) -> String {
    let stripped = OVERRIDE_BLOCK_REGEX
        .as_ref()
        .map_or_else(|| raw.to_string(), |re| re.replace_all(raw, "").into_owned());
    unescape(&stripped).trim().to_string()
}

/// Translate ASS hard line breaks and hard spaces to plain spaces
fn unescape(s: &str) -> String {
    s.replace("\\N", " ").replace("\\n", " ").replace("\\h", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "[Script Info]\nTitle: Test\n\n[V4+ Styles]\nFormat: Name, Fontname\nStyle: Default,Arial\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n";

    fn parse(events: &str) -> Vec<LyricLine> {
        parse_with(events, AssOptions::default())
    }

    fn parse_with(events: &str, options: AssOptions) -> Vec<LyricLine> {
        let mut parser = Box::new(AssParser::new(options));
        for line in HEADER.lines().chain(events.lines()) {
            parser.feed_line(line);
        }
        parser.finish()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_ass_time() {
        assert!(approx(parse_ass_time("0:00:12.50").unwrap_or_default(), 12.5));
        assert!(approx(parse_ass_time("1:02:03.04").unwrap_or_default(), 3723.04));
        assert_eq!(parse_ass_time("0:00:12.5"), None);
        assert_eq!(parse_ass_time("00:12.50"), None);
        assert_eq!(parse_ass_time("0:00:12,50"), None);
    }

    #[test]
    fn test_karaoke_duration_decode() {
        let decoded = decode_karaoke(r"{\k50}hello", 12.0);
        assert_eq!(decoded.text, "hello");
        assert_eq!(decoded.words.len(), 1);
        assert_eq!(decoded.words[0].text, "hello");
        assert!(approx(decoded.words[0].start, 12.0));
        assert!(approx(decoded.words[0].end, 12.5));
    }

    #[test]
    fn test_k_and_kf_share_centisecond_scale() {
        let decoded = decode_karaoke(r"{\k20}a{\kf30}b{\K10}c", 0.0);
        let spans: Vec<(f64, f64)> = decoded.words.iter().map(|w| (w.start, w.end)).collect();
        assert!(approx(spans[0].1, 0.2));
        assert!(approx(spans[1].0, 0.2) && approx(spans[1].1, 0.5));
        assert!(approx(spans[2].1, 0.6));
        assert_eq!(decoded.text, "abc");
    }

    #[test]
    fn test_karaoke_words_are_monotonic() {
        let decoded = decode_karaoke(r"{\k0}{\k25}one {\k40}two {\k15}three", 3.0);
        assert!(approx(decoded.words[0].start, 3.0));
        for w in &decoded.words {
            assert!(w.start <= w.end);
        }
        for pair in decoded.words.windows(2) {
            assert!(pair[0].end <= pair[1].start + 1e-9);
        }
    }

    #[test]
    fn test_other_overrides_stripped() {
        let decoded = decode_karaoke(r"{\b1}{\k30}Bold{\b0} text\Nnext", 1.0);
        assert_eq!(decoded.text, "Bold text next");
        assert_eq!(decoded.words[0].text, "Bold text next");
    }

    #[test]
    fn test_plain_line_has_no_words() {
        let decoded = decode_karaoke(r"{\i1}Plain{\i0}", 1.0);
        assert_eq!(decoded.text, "Plain");
        assert!(decoded.words.is_empty());
    }

    #[test]
    fn test_text_with_commas_is_rejoined() {
        let lines = parse("Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Well, hello, there\n");
        assert_eq!(lines[0].primary(), "Well, hello, there");
    }

    #[test]
    fn test_bilingual_grouping_by_keyword() {
        let events = "\
Dialogue: 0,0:00:05.00,0:00:07.00,TS,,0,0,0,,你好
Dialogue: 0,0:00:05.00,0:00:07.00,Orig,,0,0,0,,{\\k50}Hel{\\k50}lo
Dialogue: 0,0:00:01.00,0:00:03.00,Orig,,0,0,0,,First
";
        let lines = parse(events);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].primary(), "First");
        assert_eq!(lines[1].texts, vec!["Hello", "你好"]);
        assert_eq!(lines[1].words.len(), 2);
        assert!(approx(lines[1].words[1].end, 6.0));
    }

    #[test]
    fn test_unknown_styles_first_is_original() {
        let events = "\
Dialogue: 0,0:00:05.00,0:00:07.00,Alpha,,0,0,0,,Bonjour
Dialogue: 0,0:00:05.00,0:00:07.00,Beta,,0,0,0,,Hallo
";
        let lines = parse(events);
        assert_eq!(lines[0].texts, vec!["Bonjour", "Hallo"]);
    }

    #[test]
    fn test_role_override_beats_heuristic() {
        let events = "\
Dialogue: 0,0:00:05.00,0:00:07.00,Alpha,,0,0,0,,Bonjour
Dialogue: 0,0:00:05.00,0:00:07.00,Beta,,0,0,0,,{\\k100}Hallo
";
        let options = AssOptions::default().with_role("beta", StyleRole::Original);
        let lines = parse_with(events, options);
        assert_eq!(lines[0].texts, vec!["Hallo", "Bonjour"]);
        assert_eq!(lines[0].words.len(), 1);
    }

    #[test]
    fn test_same_start_different_end_not_merged() {
        let events = "\
Dialogue: 0,0:00:05.00,0:00:07.00,Default,,0,0,0,,One
Dialogue: 0,0:00:05.00,0:00:08.00,Default,,0,0,0,,Two
";
        assert_eq!(parse(events).len(), 2);
    }

    #[test]
    fn test_malformed_dialogues_dropped() {
        let events = "\
Dialogue: 0,0:00:5.00,0:00:07.00,Default,,0,0,0,,Bad time
Dialogue: 0,0:00:05.00
Comment: 0,0:00:05.00,0:00:07.00,Default,,0,0,0,,Comment
Dialogue: 0,0:00:09.00,0:00:10.00,Default,,0,0,0,,Good
";
        let lines = parse(events);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].primary(), "Good");
    }

    #[test]
    fn test_dialogue_outside_events_ignored() {
        let mut parser = Box::new(AssParser::new(AssOptions::default()));
        parser.feed_line("[Script Info]");
        parser.feed_line("Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Nope");
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_classify_style() {
        assert_eq!(classify_style("Translation"), Some(StyleRole::Translation));
        assert_eq!(classify_style("JP-Main"), Some(StyleRole::Original));
        assert_eq!(classify_style("中文"), Some(StyleRole::Translation));
        assert_eq!(classify_style("Alpha"), None);
    }
}
