//! Time conversion and timestamp formatting utilities.
//!
//! Timelines carry times as `f64` seconds. These helpers convert to integer
//! units with explicit saturation, and render the timestamp grammars used by
//! the exporters.

/// Extension trait for safe conversion of `f64` seconds to integer units.
pub trait SecondsExt {
    /// Round to whole milliseconds. Negative and non-finite values saturate at 0.
    fn as_millis_u64(self) -> u64;

    /// Round to whole centiseconds. Negative and non-finite values saturate at 0.
    fn as_centis_u64(self) -> u64;
}

impl SecondsExt for f64 {
    fn as_millis_u64(self) -> u64 {
        scaled_round(self, 1000.0)
    }

    fn as_centis_u64(self) -> u64 {
        scaled_round(self, 100.0)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_round(secs: f64, scale: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX for out-of-range floats
    (secs * scale).round() as u64
}

/// Convert whole milliseconds to seconds.
///
/// Precision loss only starts beyond 2^53 ms (~285,000 years).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Convert a signed millisecond offset to seconds
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn signed_millis_to_secs(millis: i64) -> f64 {
    millis as f64 / 1000.0
}

/// Format seconds as an LRC timestamp body (`mm:ss.cc`)
#[must_use]
pub fn format_lrc_timestamp(secs: f64) -> String {
    let centis = secs.as_centis_u64();
    let minutes = centis / 6000;
    let seconds = (centis / 100) % 60;
    let hundredths = centis % 100;

    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// Format seconds as an ASS timestamp (`H:MM:SS.cc`)
#[must_use]
pub fn format_ass_timestamp(secs: f64) -> String {
    let centis = secs.as_centis_u64();
    let hours = centis / 360_000;
    let minutes = (centis / 6000) % 60;
    let seconds = (centis / 100) % 60;
    let hundredths = centis % 100;

    format!("{hours}:{minutes:02}:{seconds:02}.{hundredths:02}")
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`)
#[must_use]
pub fn format_srt_timestamp(secs: f64) -> String {
    let millis = secs.as_millis_u64();
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    let ms = millis % 1000;

    format!("{hours:02}:{minutes:02}:{seconds:02},{ms:03}")
}
