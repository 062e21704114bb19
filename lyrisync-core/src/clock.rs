//! Frame-driven visual clock.
//!
//! Playback positions arrive coarsely and jitter. The visual clock advances
//! smoothly by frame deltas and is steered back towards playback: small drift
//! is corrected by speeding up or slowing down, large drift and seeks snap.

use crate::config::ClockConfig;
use crate::model::{KaraokeWord, LyricLine};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct VisualClock {
    config: ClockConfig,
    visual: f64,
    /// Playback time seen on the previous tick; `None` right after a reset
    last_real: Option<f64>,
}

impl Default for VisualClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

impl VisualClock {
    #[must_use]
    pub const fn new(config: ClockConfig) -> Self {
        Self {
            config,
            visual: 0.0,
            last_real: None,
        }
    }

    /// Current visual time in seconds
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.visual
    }

    /// Snap to `real` and forget previous samples, e.g. on track change
    pub fn reset(&mut self, real: f64) {
        self.visual = real;
        self.last_real = Some(real);
    }

    /// Advance by one frame of `delta` seconds towards playback time `real`
    pub fn tick(&mut self, delta: f64, real: f64, is_playing: bool) -> f64 {
        let last_real = self.last_real.replace(real);

        if !is_playing {
            self.visual = real;
            return self.visual;
        }

        let Some(last_real) = last_real else {
            self.visual = real;
            return self.visual;
        };

        let jump = real - last_real;
        if jump.abs() > self.config.seek_threshold_secs || jump < -self.config.backward_epsilon_secs
        {
            trace!("Visual clock resync after seek: {last_real:.3} -> {real:.3}");
            self.visual = real;
            return self.visual;
        }

        let diff = self.visual - real;
        if diff.abs() > self.config.hard_resync_secs {
            trace!("Visual clock drifted {diff:.3}s, snapping");
            self.visual = real;
        } else if diff.abs() > self.config.soft_sync_secs {
            let speed = (1.0 - self.config.gain * diff)
                .max(self.config.min_speed)
                .min(self.config.max_speed);
            self.visual += delta * speed;
        } else {
            self.visual += delta;
        }

        self.visual
    }
}

/// Linear progress of `t` through `[start, end]`, clamped to `[0, 1]`
fn span_progress(start: f64, end: f64, t: f64) -> f64 {
    if t < start {
        0.0
    } else if t >= end {
        1.0
    } else {
        (t - start) / (end - start)
    }
}

/// Fill fraction of a karaoke word at visual time `visual`
#[must_use]
pub fn word_progress(word: &KaraokeWord, visual: f64, lyrics_offset: f64) -> f64 {
    span_progress(word.start, word.end, visual - lyrics_offset)
}

/// Fill fraction of each LRC karaoke segment of `line`.
///
/// Segment `k` ends at `timings[k]` and starts where the previous one ended,
/// the first starting at the line time. Empty for lines without LRC karaoke.
#[must_use]
pub fn lrc_segment_progress(line: &LyricLine, visual: f64, lyrics_offset: f64) -> Vec<f64> {
    let Some(ref karaoke) = line.karaoke else {
        return Vec::new();
    };

    let t = visual - lyrics_offset;
    let mut start = line.time;
    karaoke
        .timings
        .iter()
        .map(|timing| {
            let progress = span_progress(start, timing.time, t);
            start = timing.time;
            progress
        })
        .collect()
}

/// Progress of every karaoke unit of `line`: ASS words first, LRC segments otherwise
#[must_use]
pub fn line_progress(line: &LyricLine, visual: f64, lyrics_offset: f64) -> Vec<f64> {
    if line.words.is_empty() {
        lrc_segment_progress(line, visual, lyrics_offset)
    } else {
        line.words
            .iter()
            .map(|word| word_progress(word, visual, lyrics_offset))
            .collect()
    }
}
