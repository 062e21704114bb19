use crate::clock::{line_progress, VisualClock};
use crate::config::{ClockConfig, LyrisyncConfig, SyncConfig};
use crate::error::Result;
use crate::model::LyricLine;
use crate::playback::{PlaybackSample, TrackId};
use crate::resolver::resolve_with_lookahead;
use crate::schedule::{LoadTicket, ParseGeneration};
use crate::scroll::{LineBox, ScrollCommand, ScrollSynchronizer, Viewport};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Events emitted by the sync engine
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A different track is now loaded
    TrackChanged { track: TrackId, position: f64 },
    /// Playback stopped (no track loaded)
    PlaybackStopped,
    /// Playback was paused
    PlaybackPaused { position: f64 },
    /// Playback was resumed
    PlaybackResumed { position: f64 },
    /// A seek occurred within the current track
    SeekOccurred { position: f64 },
    /// Regular position sync update
    PositionSync { position: f64 },
    /// A timeline was published for the current track
    LyricsLoaded { lines: Arc<[LyricLine]> },
    /// The current track has no usable lyrics
    LyricsNotFound,
    /// The resolved active line changed
    ActiveLineChanged {
        previous: Option<usize>,
        current: Option<usize>,
    },
    /// The lyric list should scroll
    ScrollRequested { index: usize, command: ScrollCommand },
}

/// Rendered geometry of the lyric list, one box per timeline line
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub lines: Vec<LineBox>,
    pub viewport: Viewport,
}

/// Engine that keeps a lyric timeline in step with playback.
///
/// Each input runs the whole pipeline synchronously: a playback sample
/// resolves the active line, and a changed line requests a scroll. Outputs
/// are broadcast as [`SyncEvent`]s.
pub struct SyncEngine {
    sync: SyncConfig,
    clock_config: ClockConfig,
    sample: PlaybackSample,
    timeline: Option<Arc<[LyricLine]>>,
    active: Option<usize>,
    clock: VisualClock,
    scroll: ScrollSynchronizer,
    layout: Option<Layout>,
    generations: ParseGeneration,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    #[must_use]
    pub fn new(config: &LyrisyncConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            sync: config.sync.clone(),
            clock_config: config.clock.clone(),
            sample: PlaybackSample::default(),
            timeline: None,
            active: None,
            clock: VisualClock::new(config.clock.clone()),
            scroll: ScrollSynchronizer::new(config.scroll.clone()),
            layout: None,
            generations: ParseGeneration::new(),
            event_tx,
        }
    }

    /// Subscribe to sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Feed a playback sample and emit appropriate events
    pub fn on_playback(&mut self, sample: PlaybackSample) {
        let old = &self.sample;
        let track_changed = old.track_changed(&sample);
        let playback_changed = old.playback_state_changed(&sample);
        let seek_occurred = old.seek_occurred(
            &sample,
            self.clock_config.seek_threshold_secs,
            self.clock_config.backward_epsilon_secs,
        );
        let position = sample.current_time;

        if track_changed {
            self.discard_track(position);

            if let Some(ref track) = sample.track {
                info!("Track changed: {track}");
                self.emit(SyncEvent::TrackChanged {
                    track: track.clone(),
                    position,
                });
                // Also emit play state so listeners know if track is playing or paused
                if sample.is_playing {
                    self.emit(SyncEvent::PlaybackResumed { position });
                } else {
                    self.emit(SyncEvent::PlaybackPaused { position });
                }
            } else {
                self.emit(SyncEvent::PlaybackStopped);
            }
        } else if playback_changed {
            if sample.is_playing {
                self.emit(SyncEvent::PlaybackResumed { position });
            } else {
                self.emit(SyncEvent::PlaybackPaused { position });
            }
        } else if seek_occurred {
            self.emit(SyncEvent::SeekOccurred { position });
        } else {
            self.emit(SyncEvent::PositionSync { position });
        }

        self.sample = sample;
        self.recompute(false);
    }

    /// Drop everything tied to the previous track
    fn discard_track(&mut self, position: f64) {
        self.generations.invalidate();
        self.timeline = None;
        self.layout = None;
        self.scroll.reset();
        self.clock.reset(position);
    }

    /// Claim a load for the current track, cancelling any load in flight
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generations.begin(self.sample.track.clone())
    }

    /// Publish the result of a load.
    ///
    /// An empty timeline reports [`SyncEvent::LyricsNotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::StaleParse`] if a newer load or a track
    /// change superseded `ticket`; the lines are discarded.
    pub fn finish_load(&mut self, ticket: &LoadTicket, lines: Vec<LyricLine>) -> Result<()> {
        self.generations.check(ticket)?;

        self.scroll.reset();
        if lines.is_empty() {
            info!("No lyrics for {}", describe_track(ticket.track.as_ref()));
            self.timeline = None;
            self.emit(SyncEvent::LyricsNotFound);
            self.recompute(false);
            return Ok(());
        }

        info!(
            "Loaded {} lyric lines for {}",
            lines.len(),
            describe_track(ticket.track.as_ref())
        );
        let lines: Arc<[LyricLine]> = lines.into();
        self.timeline = Some(Arc::clone(&lines));
        self.active = None;
        self.emit(SyncEvent::LyricsLoaded { lines });
        self.recompute(true);
        Ok(())
    }

    /// Replace the rendered geometry, e.g. after a resize. Scrolls to the
    /// active line without animation.
    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = Some(layout);
        self.recompute(true);
    }

    /// Advance the visual clock by one frame and return the visual time
    pub fn tick_frame(&mut self, delta: f64) -> f64 {
        self.clock
            .tick(delta, self.sample.current_time, self.sample.is_playing)
    }

    /// The user picked line `index`: scroll to it now and return the playback
    /// position the host should seek to
    pub fn on_user_jump(&mut self, index: usize) -> Option<f64> {
        let line = self.timeline.as_deref()?.get(index)?;
        let target = (line.time + self.sync.lyrics_offset_secs).max(0.0);

        if let Some(ref layout) = self.layout {
            if let Some(&line_box) = layout.lines.get(index) {
                let command = self
                    .scroll
                    .jump_to(index, line_box, layout.viewport, Instant::now());
                self.emit(SyncEvent::ScrollRequested { index, command });
            }
        }

        Some(target)
    }

    /// Resolve the active line and scroll when it changed
    fn recompute(&mut self, immediate: bool) {
        let time = self.sample.current_time - self.sync.lyrics_offset_secs;
        let index = self
            .timeline
            .as_deref()
            .and_then(|lines| resolve_with_lookahead(lines, time, self.sync.lookahead_secs));

        let changed = index != self.active;
        if changed {
            let previous = std::mem::replace(&mut self.active, index);
            debug!("Active line {previous:?} -> {index:?}");
            self.emit(SyncEvent::ActiveLineChanged {
                previous,
                current: index,
            });
        }

        if changed || immediate {
            if let Some(index) = index {
                self.request_scroll(index, immediate);
            }
        }
    }

    fn request_scroll(&mut self, index: usize, immediate: bool) {
        let Some(ref layout) = self.layout else {
            return;
        };
        let Some(&line_box) = layout.lines.get(index) else {
            return;
        };
        if let Some(command) =
            self.scroll
                .on_active_index(index, line_box, layout.viewport, immediate, Instant::now())
        {
            self.emit(SyncEvent::ScrollRequested { index, command });
        }
    }

    /// Karaoke fill of the active line's words or segments
    #[must_use]
    pub fn active_progress(&self) -> Vec<f64> {
        self.active_line().map_or_else(Vec::new, |line| {
            line_progress(line, self.clock.time(), self.sync.lyrics_offset_secs)
        })
    }

    /// Current scroll offset, advancing any running animation
    pub fn scroll_offset(&mut self) -> f64 {
        self.scroll.offset_at(Instant::now())
    }

    #[must_use]
    pub const fn sample(&self) -> &PlaybackSample {
        &self.sample
    }

    #[must_use]
    pub const fn timeline(&self) -> Option<&Arc<[LyricLine]>> {
        self.timeline.as_ref()
    }

    #[must_use]
    pub const fn active_index(&self) -> Option<usize> {
        self.active
    }

    #[must_use]
    pub fn active_line(&self) -> Option<&LyricLine> {
        self.timeline.as_deref()?.get(self.active?)
    }

    #[must_use]
    pub const fn visual_time(&self) -> f64 {
        self.clock.time()
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.sample.is_playing
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(&LyrisyncConfig::default())
    }
}

fn describe_track(track: Option<&TrackId>) -> String {
    track.map_or_else(|| "<no track>".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn sample(track: &str, time: f64, playing: bool) -> PlaybackSample {
        PlaybackSample::new(Some(TrackId::from(track)), time, playing)
    }

    fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn active_changes(events: &[SyncEvent]) -> Vec<(Option<usize>, Option<usize>)> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::ActiveLineChanged { previous, current } => Some((*previous, *current)),
                _ => None,
            })
            .collect()
    }

    fn timeline() -> Vec<LyricLine> {
        vec![LyricLine::new(10.0, "first"), LyricLine::new(20.0, "second")]
    }

    fn loaded_engine() -> SyncEngine {
        let mut engine = SyncEngine::default();
        engine.on_playback(sample("a", 0.0, true));
        let ticket = engine.begin_load();
        engine.finish_load(&ticket, timeline()).unwrap();
        engine
    }

    fn layout() -> Layout {
        Layout {
            lines: vec![
                LineBox {
                    offset_top: 0.0,
                    height: 40.0,
                },
                LineBox {
                    offset_top: 400.0,
                    height: 40.0,
                },
            ],
            viewport: Viewport {
                container_height: 200.0,
                scroll_height: 1000.0,
            },
        }
    }

    #[test]
    fn test_track_change_events() {
        let mut engine = SyncEngine::default();
        let mut rx = engine.subscribe();

        engine.on_playback(sample("a", 0.0, true));
        let events = drain(&mut rx);
        assert!(matches!(events[0], SyncEvent::TrackChanged { ref track, .. } if track.as_str() == "a"));
        assert!(matches!(events[1], SyncEvent::PlaybackResumed { .. }));

        engine.on_playback(PlaybackSample::default());
        let events = drain(&mut rx);
        assert!(matches!(events[0], SyncEvent::PlaybackStopped));
    }

    #[test]
    fn test_pause_seek_and_position_events() {
        let mut engine = SyncEngine::default();
        engine.on_playback(sample("a", 5.0, true));
        let mut rx = engine.subscribe();

        engine.on_playback(sample("a", 5.25, true));
        engine.on_playback(sample("a", 5.25, false));
        engine.on_playback(sample("a", 60.0, false));

        let events = drain(&mut rx);
        assert!(matches!(events[0], SyncEvent::PositionSync { .. }));
        assert!(matches!(events[1], SyncEvent::PlaybackPaused { .. }));
        assert!(matches!(events[2], SyncEvent::SeekOccurred { position } if (position - 60.0).abs() < 1e-9));
    }

    #[test]
    fn test_active_line_follows_playback() {
        let mut engine = loaded_engine();
        let mut rx = engine.subscribe();

        for time in [9.0, 10.1, 11.0, 19.7, 19.9] {
            engine.on_playback(sample("a", time, true));
        }

        let events = drain(&mut rx);
        assert_eq!(
            active_changes(&events),
            vec![(None, Some(0)), (Some(0), Some(1))]
        );
        assert_eq!(engine.active_index(), Some(1));
        assert_eq!(engine.active_line().map(LyricLine::primary), Some("second"));
    }

    #[test]
    fn test_lyrics_offset_delays_lines() {
        let mut config = LyrisyncConfig::default();
        config.sync.lyrics_offset_secs = 1.0;
        let mut engine = SyncEngine::new(&config);
        engine.on_playback(sample("a", 0.0, true));
        let ticket = engine.begin_load();
        engine.finish_load(&ticket, timeline()).unwrap();

        engine.on_playback(sample("a", 10.5, true));
        assert_eq!(engine.active_index(), None);
        engine.on_playback(sample("a", 11.0, true));
        assert_eq!(engine.active_index(), Some(0));
    }

    #[test]
    fn test_track_change_discards_timeline_and_stale_load() {
        let mut engine = loaded_engine();
        engine.on_playback(sample("a", 12.0, true));
        let pending = engine.begin_load();
        let mut rx = engine.subscribe();

        engine.on_playback(sample("b", 0.0, true));
        assert!(engine.timeline().is_none());
        assert!(pending.cancel.is_cancelled());
        assert_eq!(active_changes(&drain(&mut rx)), vec![(Some(0), None)]);

        let err = engine.finish_load(&pending, timeline()).unwrap_err();
        assert!(matches!(err, CoreError::StaleParse { .. }));
        assert!(engine.timeline().is_none());
    }

    #[test]
    fn test_empty_load_reports_not_found() {
        let mut engine = SyncEngine::default();
        engine.on_playback(sample("a", 0.0, true));
        let mut rx = engine.subscribe();

        let ticket = engine.begin_load();
        engine.finish_load(&ticket, Vec::new()).unwrap();
        assert!(matches!(drain(&mut rx)[..], [SyncEvent::LyricsNotFound]));
    }

    #[test]
    fn test_scroll_requested_on_change_and_layout() {
        let mut engine = loaded_engine();
        let mut rx = engine.subscribe();

        engine.set_layout(layout());
        // Nothing active yet, nothing to scroll to
        assert!(drain(&mut rx).is_empty());

        engine.on_playback(sample("a", 10.0, true));
        let events = drain(&mut rx);
        let scrolls: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::ScrollRequested { index, command } => Some((*index, *command)),
                _ => None,
            })
            .collect();
        assert_eq!(scrolls.len(), 1);
        assert_eq!(scrolls[0].0, 0);
        assert!(matches!(scrolls[0].1, ScrollCommand::Animate(_)));

        // A resize scrolls immediately even though the index is unchanged
        engine.set_layout(layout());
        let events = drain(&mut rx);
        assert!(matches!(
            events[..],
            [SyncEvent::ScrollRequested {
                index: 0,
                command: ScrollCommand::Jump { .. }
            }]
        ));
    }

    #[test]
    fn test_user_jump_returns_seek_target() {
        let mut engine = loaded_engine();
        engine.set_layout(layout());
        let mut rx = engine.subscribe();

        assert_eq!(engine.on_user_jump(1), Some(20.0));
        assert!(matches!(
            drain(&mut rx)[..],
            [SyncEvent::ScrollRequested {
                index: 1,
                command: ScrollCommand::Jump { .. }
            }]
        ));
        assert_eq!(engine.on_user_jump(7), None);
    }

    #[test]
    fn test_track_change_resets_visual_clock() {
        let mut engine = SyncEngine::default();
        engine.on_playback(sample("a", 10.0, true));
        // Without fresh samples the visual clock runs ahead of playback
        for _ in 0..20 {
            engine.tick_frame(1.0 / 60.0);
        }
        assert!(engine.visual_time() > 10.1);

        // Below both the seek and the hard resync thresholds
        engine.on_playback(sample("b", 10.1, true));
        let visual = engine.tick_frame(1.0 / 60.0);
        assert!((visual - (10.1 + 1.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tick_frame_and_progress() {
        let mut engine = SyncEngine::default();
        engine.on_playback(sample("a", 0.0, true));
        let ticket = engine.begin_load();
        let mut line = LyricLine::new(10.0, "hey");
        line.words = vec![crate::model::KaraokeWord {
            text: "hey".to_string(),
            start: 10.0,
            end: 11.0,
        }];
        engine.finish_load(&ticket, vec![line]).unwrap();

        engine.on_playback(sample("a", 10.5, true));
        let visual = engine.tick_frame(1.0 / 60.0);
        // 0 -> 10.5 is a seek, so the clock snaps
        assert!((visual - 10.5).abs() < 1e-9);

        let progress = engine.active_progress();
        assert_eq!(progress.len(), 1);
        assert!((progress[0] - 0.5).abs() < 1e-9);
    }
}
