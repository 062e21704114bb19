use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the track being played, e.g. the audio file path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One observation of the external playback clock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSample {
    /// Track being played (None if nothing is loaded)
    pub track: Option<TrackId>,
    /// Playback position in seconds
    pub current_time: f64,
    /// Whether the transport is running
    pub is_playing: bool,
}

impl PlaybackSample {
    #[must_use]
    pub const fn new(track: Option<TrackId>, current_time: f64, is_playing: bool) -> Self {
        Self {
            track,
            current_time,
            is_playing,
        }
    }

    /// Check if the track has changed
    #[must_use]
    pub fn track_changed(&self, other: &Self) -> bool {
        self.track != other.track
    }

    /// Check if playback state changed (playing <-> paused)
    #[must_use]
    pub const fn playback_state_changed(&self, other: &Self) -> bool {
        self.is_playing != other.is_playing
    }

    /// Check if the position jumped within the same track.
    ///
    /// Forward jumps beyond `threshold` and backward jumps beyond
    /// `backward_epsilon` count as seeks.
    #[must_use]
    pub fn seek_occurred(&self, other: &Self, threshold: f64, backward_epsilon: f64) -> bool {
        if self.track_changed(other) {
            return false;
        }

        let jump = other.current_time - self.current_time;
        jump.abs() > threshold || jump < -backward_epsilon
    }
}
