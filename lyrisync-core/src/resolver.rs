//! Active line lookup for a playback time.

use crate::model::LyricLine;

/// How far ahead of the playback position a line becomes active, in seconds
pub const LOOKAHEAD_SECS: f64 = 0.2;

/// Index of the line active at `time`, using the default lookahead.
///
/// `lines` must be sorted ascending by start time.
#[must_use]
pub fn resolve_active_index(lines: &[LyricLine], time: f64) -> Option<usize> {
    resolve_with_lookahead(lines, time, LOOKAHEAD_SECS)
}

/// Index of the last line whose start is at or before `time + lookahead`.
///
/// Returns `None` before the first line, and in the gap policy case where the
/// biased time already reached the next line's start.
#[must_use]
pub fn resolve_with_lookahead(lines: &[LyricLine], time: f64, lookahead: f64) -> Option<usize> {
    let biased = time + lookahead;
    let count = lines.partition_point(|line| line.time <= biased);
    let idx = count.checked_sub(1)?;

    match lines.get(idx + 1) {
        Some(next) if biased >= next.time => None,
        _ => Some(idx),
    }
}
