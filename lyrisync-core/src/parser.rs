//! Format dispatch and the line-fed parser seam shared by the synchronous and
//! chunked parse paths.

use crate::ass::{AssOptions, AssParser};
use crate::detect::resolve_format;
use crate::lrc::LrcParser;
use crate::model::{Format, LyricLine};
use crate::srt::SrtParser;
use tracing::debug;

/// A parser that consumes a lyric file one physical line at a time.
///
/// Both [`parse`] and the chunked scheduler drive the same implementation, so
/// yielding between chunks can never change the result.
pub trait LineParser: Send {
    /// Feed the next physical line (without its terminator)
    fn feed_line(&mut self, line: &str);

    /// Finish parsing and return the timeline sorted by start time
    fn finish(self: Box<Self>) -> Vec<LyricLine>;
}

/// Options that influence parsing beyond the raw text
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Authoritative file extension, consulted when the format is `Auto`
    pub extension: Option<String>,
    /// ASS style role overrides
    pub ass: AssOptions,
}

impl ParseOptions {
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    #[must_use]
    pub fn with_ass_options(mut self, ass: AssOptions) -> Self {
        self.ass = ass;
        self
    }
}

/// Create the line parser for a concrete format.
///
/// `Auto` falls back to LRC; callers resolve the format first.
#[must_use]
pub fn line_parser_for(format: Format, options: &ParseOptions) -> Box<dyn LineParser> {
    match format {
        Format::Ass => Box::new(AssParser::new(options.ass.clone())),
        Format::Srt => Box::new(SrtParser::new()),
        Format::Lrc | Format::Auto => Box::new(LrcParser::new()),
    }
}

/// Strip a leading byte order mark
pub(crate) fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Parse lyric text synchronously. Suited to small files.
///
/// Never fails: unparseable content yields an empty timeline.
#[must_use]
pub fn parse(text: &str, format: Format) -> Vec<LyricLine> {
    parse_with_options(text, format, &ParseOptions::default())
}

/// Parse lyric text synchronously with explicit options
#[must_use]
pub fn parse_with_options(text: &str, format: Format, options: &ParseOptions) -> Vec<LyricLine> {
    let text = strip_bom(text);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let format = resolve_format(text, format, options.extension.as_deref());
    let mut parser = line_parser_for(format, options);
    for line in text.lines() {
        parser.feed_line(line);
    }
    let lines = parser.finish();
    debug!("Parsed {} lyric lines as {}", lines.len(), format);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_returns_empty() {
        assert!(parse("", Format::Auto).is_empty());
        assert!(parse("   \n\n", Format::Lrc).is_empty());
    }

    #[test]
    fn test_auto_dispatches_to_ass() {
        let input = "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hi\n";
        let lines = parse(input, Format::Auto);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].primary(), "Hi");
    }

    #[test]
    fn test_bom_is_ignored() {
        let lines = parse("\u{feff}[00:01.00]Hello", Format::Auto);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].primary(), "Hello");
    }

    #[test]
    fn test_extension_overrides_sniffing() {
        // Valid LRC content parsed as SRT yields nothing
        let options = ParseOptions::default().with_extension("srt");
        assert!(parse_with_options("[00:01.00]Hello", Format::Auto, &options).is_empty());
    }

    #[test]
    fn test_unknown_content_yields_no_lines() {
        assert!(parse("just some prose\nwithout timing", Format::Auto).is_empty());
    }
}
