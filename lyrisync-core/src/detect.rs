//! Lyric format sniffing.

use crate::model::Format;
use crate::srt::has_srt_header;

/// Section headers that only appear in ASS/SSA scripts
const ASS_MARKERS: &[&str] = &["[Script Info]", "[V4+ Styles]", "[V4 Styles]", "[Events]"];

/// Sniff raw text into a concrete format. Never returns [`Format::Auto`].
///
/// Content that matches nothing defaults to LRC; parsing it then simply
/// yields no lines.
#[must_use]
pub fn detect_format(text: &str) -> Format {
    if ASS_MARKERS.iter().any(|marker| text.contains(marker)) {
        Format::Ass
    } else if has_srt_header(text) {
        Format::Srt
    } else {
        Format::Lrc
    }
}

/// Pick the format to parse with.
///
/// An explicit request wins, then an authoritative file extension, then
/// content sniffing.
#[must_use]
pub fn resolve_format(text: &str, requested: Format, extension: Option<&str>) -> Format {
    if requested != Format::Auto {
        return requested;
    }
    extension
        .and_then(Format::from_extension)
        .unwrap_or_else(|| detect_format(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ass() {
        assert_eq!(detect_format("[Script Info]\nTitle: x"), Format::Ass);
        assert_eq!(detect_format("junk\n[Events]\n"), Format::Ass);
        assert_eq!(detect_format("[V4+ Styles]"), Format::Ass);
    }

    #[test]
    fn test_detect_srt() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHello\r\n";
        assert_eq!(detect_format(srt), Format::Srt);
    }

    #[test]
    fn test_detect_defaults_to_lrc() {
        assert_eq!(detect_format("[00:01.00]Hello"), Format::Lrc);
        assert_eq!(detect_format("not lyrics at all"), Format::Lrc);
        assert_eq!(detect_format(""), Format::Lrc);
    }

    #[test]
    fn test_resolve_format_precedence() {
        let ass = "[Events]";
        assert_eq!(resolve_format(ass, Format::Lrc, Some("srt")), Format::Lrc);
        assert_eq!(resolve_format(ass, Format::Auto, Some("srt")), Format::Srt);
        assert_eq!(resolve_format(ass, Format::Auto, Some("txt")), Format::Ass);
        assert_eq!(resolve_format(ass, Format::Auto, None), Format::Ass);
    }
}
