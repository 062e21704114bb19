//! Anticipatory auto-scroll for the lyric list.
//!
//! Offsets are in the same unit as the layout boxes (pixels for a renderer).
//! Time is passed in explicitly so hosts and tests control it.

use crate::config::ScrollConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Vertical placement of one line, relative to the top of the content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineBox {
    pub offset_top: f64,
    pub height: f64,
}

/// Scroll container dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub container_height: f64,
    pub scroll_height: f64,
}

impl Viewport {
    /// Largest reachable scroll offset, 0 when the content fits
    #[must_use]
    pub fn max_offset(&self) -> f64 {
        (self.scroll_height - self.container_height).max(0.0)
    }

    #[must_use]
    pub fn clamp(&self, offset: f64) -> f64 {
        offset.max(0.0).min(self.max_offset())
    }
}

/// Cubic ease-in-out over `t` in `[0, 1]`
#[must_use]
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// An eased scroll from one offset to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    pub from: f64,
    pub to: f64,
    pub started_at: Instant,
    pub duration: Duration,
}

impl ScrollAnimation {
    /// Offset at `now`
    #[must_use]
    pub fn sample(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return self.to;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.from + (self.to - self.from) * ease_in_out_cubic(t)
    }

    #[must_use]
    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }
}

/// What the renderer should do with its scroll position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    /// Set the offset immediately
    Jump { offset: f64 },
    /// Follow the animation, sampling it every frame
    Animate(ScrollAnimation),
}

impl ScrollCommand {
    /// Final offset once the command completes
    #[must_use]
    pub const fn target(&self) -> f64 {
        match self {
            Self::Jump { offset } => *offset,
            Self::Animate(animation) => animation.to,
        }
    }
}

/// Decides when and where the lyric list scrolls
#[derive(Debug, Clone)]
pub struct ScrollSynchronizer {
    config: ScrollConfig,
    offset: f64,
    last_index: Option<usize>,
    suppressed_until: Option<Instant>,
    animation: Option<ScrollAnimation>,
}

impl Default for ScrollSynchronizer {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

impl ScrollSynchronizer {
    #[must_use]
    pub const fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            offset: 0.0,
            last_index: None,
            suppressed_until: None,
            animation: None,
        }
    }

    /// Scroll offset at `now`, advancing any running animation
    pub fn offset_at(&mut self, now: Instant) -> f64 {
        if let Some(animation) = self.animation {
            self.offset = animation.sample(now);
            if animation.is_finished(now) {
                self.animation = None;
            }
        }
        self.offset
    }

    #[must_use]
    pub const fn animation(&self) -> Option<&ScrollAnimation> {
        self.animation.as_ref()
    }

    #[must_use]
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// The user clicked a line: center it instantly and hold off auto-scroll
    pub fn jump_to(
        &mut self,
        index: usize,
        line: LineBox,
        viewport: Viewport,
        now: Instant,
    ) -> ScrollCommand {
        let offset = viewport
            .clamp(line.offset_top - viewport.container_height / 2.1 + line.height / 2.0);

        self.animation = None;
        self.offset = offset;
        self.last_index = Some(index);
        self.suppressed_until = Some(now + Duration::from_millis(self.config.suppress_ms));

        ScrollCommand::Jump { offset }
    }

    /// The active line changed to `index`.
    ///
    /// Positions the line about a quarter down the viewport. Returns `None`
    /// when the index did not change or auto-scroll is suppressed, unless
    /// `immediate` is set (initial load, resize), which always scrolls and
    /// skips the animation.
    pub fn on_active_index(
        &mut self,
        index: usize,
        line: LineBox,
        viewport: Viewport,
        immediate: bool,
        now: Instant,
    ) -> Option<ScrollCommand> {
        if !immediate && self.last_index == Some(index) {
            return None;
        }
        self.last_index = Some(index);
        if !immediate && self.is_suppressed(now) {
            return None;
        }

        let target = viewport
            .clamp(line.offset_top - viewport.container_height / 4.0 + line.height / 3.6);

        if immediate || self.config.animation_ms == 0 {
            self.animation = None;
            self.offset = target;
            return Some(ScrollCommand::Jump { offset: target });
        }

        let animation = ScrollAnimation {
            from: self.offset_at(now),
            to: target,
            started_at: now,
            duration: Duration::from_millis(self.config.animation_ms),
        };
        self.animation = Some(animation);
        Some(ScrollCommand::Animate(animation))
    }

    /// Drop all scroll state, e.g. on track change
    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.last_index = None;
        self.suppressed_until = None;
        self.animation = None;
    }
}
